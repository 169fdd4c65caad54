pub mod asm;
pub mod bus;
pub mod cpu;
pub mod decoder;
pub mod devices;
pub mod disasm;
pub mod exec;
pub mod instructions;
pub mod interrupt;
pub mod memory;

pub mod isa {
    pub mod dcpu17; // DCPU-16 revision 1.7 numbering
}

pub use asm::{assemble, AsmError, Assembled};
pub use bus::{BusError, DeviceCtx, DeviceId, Line, Peripheral};
pub use cpu::{Cpu, CpuConfig, HaltReason, StepObserver, StepOutcome};
pub use memory::Memory;
