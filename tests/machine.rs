mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::{boot, run};
use dcpu16_rs::decoder::Register::{A, B};
use dcpu16_rs::disasm::disassemble;
use dcpu16_rs::isa::dcpu17::Dcpu17Decoder;
use dcpu16_rs::{assemble, Cpu, CpuConfig, Memory, StepObserver};
use pretty_assertions::assert_eq;

#[test]
fn reset_is_idempotent() {
    let mut cpu = boot("SET A, 5\nSET PUSH, 0x1234\nIAS 0x40\nINT 1\nSET B, 2");
    run(&mut cpu, 3);
    cpu.reset();
    let once = cpu.memory().clone();
    cpu.reset();
    assert!(*cpu.memory() == once);
    assert!(once == Memory::new());
    assert_eq!(cpu.cycles(), 0);
    assert!(!cpu.halted());
    assert!(cpu.interrupts().is_empty());
}

#[test]
fn disassembly_reassembles_to_the_same_words() {
    let src = "\
:top SET A, 0x1234
SET [B+4], [0x8000]
ADD PUSH, POP
IFE PEEK, PICK 3
SHL EX, -1
JSR top
SET PC, top
INT 30
IAQ [C]
STI [I], [J]
";
    let words = assemble(src).unwrap().words;
    let listing = disassemble(&Dcpu17Decoder::new(), &words);
    let text: Vec<String> = listing.iter().map(|l| l.text.clone()).collect();
    assert_eq!(text[1], "SET [B+0x0004], [0x8000]");
    assert_eq!(text[4], "SHL EX, -1");
    let again = assemble(&text.join("\n")).unwrap().words;
    assert_eq!(again, words);
}

#[test]
fn byte_images_follow_configured_order() {
    let mut big = Cpu::new(CpuConfig::default());
    big.load_bytes(&[0x88, 0x01, 0xff]);
    assert_eq!(big.peek(0), 0x8801);
    assert_eq!(big.peek(1), 0);

    let mut little = Cpu::new(CpuConfig { little_endian: true, ..CpuConfig::default() });
    little.load_bytes(&[0x01, 0x88]);
    assert_eq!(little.peek(0), 0x8801);
}

#[test]
fn config_round_trips_through_json() {
    let cfg: CpuConfig = serde_json::from_str(r#"{ "queue_depth": 8 }"#).unwrap();
    assert_eq!(cfg.queue_depth, 8);
    assert!(!cfg.little_endian);
}

#[derive(Default)]
struct Trace {
    before: Vec<u16>,
    after: Vec<(u16, u16)>,
}

struct Recorder(Rc<RefCell<Trace>>);

impl StepObserver for Recorder {
    fn before_step(&mut self, addr: u16, _mem: &Memory) {
        self.0.borrow_mut().before.push(addr);
    }

    fn after_step(&mut self, addr: u16, mem: &Memory) {
        self.0.borrow_mut().after.push((addr, mem.reg(A)));
    }
}

#[test]
fn observer_sees_executed_instructions_only() {
    let trace = Rc::new(RefCell::new(Trace::default()));
    let mut cpu = boot("SET A, 1\nIFE A, 2\nSET A, 0x100\nSET A, 3\nHCF 0");
    cpu.set_observer(Some(Box::new(Recorder(Rc::clone(&trace)))));
    run(&mut cpu, 100);
    let t = trace.borrow();
    assert_eq!(t.before, vec![0, 1, 4, 5]);
    assert_eq!(t.after, vec![(0, 1), (1, 1), (4, 3), (5, 3)]);
}

#[test]
fn peek_and_poke_bypass_execution() {
    let mut cpu = Cpu::new(CpuConfig::default());
    cpu.poke(0xffff, 0xbeef);
    assert_eq!(cpu.peek(0xffff), 0xbeef);
    cpu.set_reg(B, 4);
    assert_eq!(cpu.memory().reg(B), 4);
}

#[test]
fn machines_are_independent() {
    let mut one = boot("SET A, 1\nHCF 0");
    let mut two = boot("SET A, 2\nHCF 0");
    run(&mut one, 10);
    run(&mut two, 10);
    assert_eq!((one.reg(A), two.reg(A)), (1, 2));
}
