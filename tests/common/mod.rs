#![allow(dead_code)]

use dcpu16_rs::cpu::RunSummary;
use dcpu16_rs::exec::IntExecutor;
use dcpu16_rs::isa::dcpu17::Dcpu17Decoder;
use dcpu16_rs::{assemble, Cpu, CpuConfig, StepOutcome};

pub fn boot(src: &str) -> Cpu {
    boot_with(src, CpuConfig::default())
}

pub fn boot_with(src: &str, cfg: CpuConfig) -> Cpu {
    let out = assemble(src).expect("assemble");
    let mut cpu = Cpu::new(cfg);
    cpu.load(&out.words);
    cpu
}

pub fn run(cpu: &mut Cpu, limit: u64) -> RunSummary {
    cpu.run(&Dcpu17Decoder::new(), &IntExecutor, Some(limit))
}

pub fn step(cpu: &mut Cpu) -> StepOutcome {
    cpu.step(&Dcpu17Decoder::new(), &IntExecutor)
}
