use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::bus::{BusError, DeviceCtx, DeviceId, Line, Peripheral, PeripheralBus};
use crate::decoder::{Decoder, Op, Register, Slot};
use crate::exec::{Executor, Flow};
use crate::instructions::describe;
use crate::interrupt::InterruptController;
use crate::isa::dcpu17 as isa;
use crate::memory::{self, const_loc, is_ram, reg_loc, Loc, Memory};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuConfig {
    pub queue_depth: usize, // pending interrupts before the machine catches fire
    pub little_endian: bool, // byte order of images handed to `load_bytes`
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            queue_depth: 256,
            little_endian: false,
        }
    }
}

bitflags! {
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuFlags: u8 {
const HALTED = 1 << 0;
const RESERVED = 1 << 1; // a reserved opcode was executed
const SKIP = 1 << 2; // next instruction is decoded but not executed
const ON_FIRE = 1 << 3; // interrupt queue overflowed
}
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HaltReason {
    #[error("HCF at {pc:#06x}")]
    Hcf { pc: u16 },
    #[error("reserved opcode {word:#06x} at {pc:#06x}")]
    Reserved { pc: u16, word: u16 },
    #[error("interrupt queue overflow")]
    InterruptOverflow,
    #[error("halt requested")]
    Requested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Executed { addr: u16, op: Op },
    Skipped { addr: u16 },
    Interrupt { msg: u16 },
    Reserved { addr: u16, word: u16 },
    /// Nothing ran; the machine is stopped.
    Halted(HaltReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub steps: u64,
    pub halt: Option<HaltReason>,
}

/// Where a decoded operand is read from and written to. The two differ only for SP and
/// PC, which read their pre-decode shadow and write the live register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Place {
    pub read: Loc,
    pub write: Loc,
}

impl Place {
    pub fn at(loc: Loc) -> Self {
        Self { read: loc, write: loc }
    }
}

/// Notified around every executed instruction, with the instruction's start address.
pub trait StepObserver {
    fn before_step(&mut self, _addr: u16, _mem: &Memory) {}
    fn after_step(&mut self, _addr: u16, _mem: &Memory) {}
}

pub struct Cpu {
    pub cfg: CpuConfig,
    mem: Memory,
    bus: PeripheralBus,
    irq: InterruptController,
    flags: CpuFlags,
    halt_reason: Option<HaltReason>,
    halt: Arc<AtomicBool>,
    cycles: u64,
    at: u16, // address of the instruction being executed
    observer: Option<Box<dyn StepObserver>>,
}

impl Cpu {
    pub fn new(cfg: CpuConfig) -> Self {
        Self {
            cfg,
            mem: Memory::new(),
            bus: PeripheralBus::new(),
            irq: InterruptController::new(cfg.queue_depth),
            flags: CpuFlags::empty(),
            halt_reason: None,
            halt: Arc::new(AtomicBool::new(false)),
            cycles: 0,
            at: 0,
            observer: None,
        }
    }

    /// Zeroes RAM and registers, empties the interrupt queue and clears every latch.
    /// Attached devices stay attached.
    pub fn reset(&mut self) {
        self.mem.reset();
        self.irq.reset();
        self.flags = CpuFlags::empty();
        self.halt_reason = None;
        self.halt.store(false, Ordering::SeqCst);
        self.cycles = 0;
        self.at = 0;
    }

    pub fn load(&mut self, image: &[u16]) {
        self.mem.load(0, image);
    }

    pub fn load_at(&mut self, origin: u16, image: &[u16]) {
        self.mem.load(origin, image);
    }

    /// Loads a byte image using the configured byte order. A trailing odd byte is ignored.
    pub fn load_bytes(&mut self, bytes: &[u8]) {
        let words: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|p| {
                if self.cfg.little_endian {
                    u16::from_le_bytes([p[0], p[1]])
                } else {
                    u16::from_be_bytes([p[0], p[1]])
                }
            })
            .collect();
        self.load(&words);
    }

    pub fn attach(
        &mut self,
        dev: Box<dyn Peripheral>,
        line: Option<Line>,
    ) -> Result<DeviceId, BusError> {
        self.bus.attach(dev, line)
    }

    pub fn detach(&mut self, id: DeviceId) -> Option<Box<dyn Peripheral>> {
        self.bus.detach(id)
    }

    pub fn bus(&self) -> &PeripheralBus {
        &self.bus
    }

    pub fn set_observer(&mut self, observer: Option<Box<dyn StepObserver>>) {
        self.observer = observer;
    }

    pub fn memory(&self) -> &Memory {
        &self.mem
    }

    pub fn interrupts(&self) -> &InterruptController {
        &self.irq
    }

    pub fn flags(&self) -> CpuFlags {
        self.flags
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn halted(&self) -> bool {
        self.halt_reason.is_some()
    }

    pub fn halt_reason(&self) -> Option<HaltReason> {
        self.halt_reason
    }

    pub fn reserved_executed(&self) -> bool {
        self.flags.contains(CpuFlags::RESERVED)
    }

    pub fn skip_pending(&self) -> bool {
        self.flags.contains(CpuFlags::SKIP)
    }

    /// Shared flag any component may raise to stop the run loop after the current step.
    pub fn halt_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.halt)
    }

    /// Start address of the instruction currently (or most recently) executed.
    pub fn current(&self) -> u16 {
        self.at
    }

    // Raw RAM access, bypassing devices.

    pub fn peek(&self, addr: u16) -> u16 {
        self.mem.get(addr as Loc)
    }

    pub fn poke(&mut self, addr: u16, val: u16) {
        self.mem.set(addr as Loc, val);
    }

    pub fn reg(&self, r: Register) -> u16 {
        self.mem.reg(r)
    }

    pub fn set_reg(&mut self, r: Register, val: u16) {
        self.mem.set_reg(r, val);
    }

    pub fn pc(&self) -> u16 {
        self.mem.get(memory::PC)
    }

    pub fn set_pc(&mut self, val: u16) {
        self.mem.set(memory::PC, val);
    }

    pub fn sp(&self) -> u16 {
        self.mem.get(memory::SP)
    }

    pub fn set_sp(&mut self, val: u16) {
        self.mem.set(memory::SP, val);
    }

    pub fn ex(&self) -> u16 {
        self.mem.get(memory::EX)
    }

    pub fn set_ex(&mut self, val: u16) {
        self.mem.set(memory::EX, val);
    }

    pub fn ia(&self) -> u16 {
        self.mem.get(memory::IA)
    }

    pub fn set_ia(&mut self, val: u16) {
        self.mem.set(memory::IA, val);
    }

    /// Program-visible read; RAM on a claimed line goes to its device.
    pub fn read(&mut self, loc: Loc) -> u16 {
        if is_ram(loc) {
            let addr = loc as u16;
            if self.bus.owner(addr).is_some() {
                let ia = self.mem.get(memory::IA);
                let mut ctx =
                    DeviceCtx::new(self.mem.ram_mut(), &mut self.irq, ia, &mut self.cycles, &self.halt);
                if let Some(v) = self.bus.read(addr, &mut ctx) {
                    return v;
                }
            }
        }
        self.mem.get(loc)
    }

    /// Program-visible write; writes into the read-only block are discarded.
    pub fn write(&mut self, loc: Loc, val: u16) {
        if is_ram(loc) {
            let addr = loc as u16;
            if self.bus.owner(addr).is_some() {
                let ia = self.mem.get(memory::IA);
                let mut ctx =
                    DeviceCtx::new(self.mem.ram_mut(), &mut self.irq, ia, &mut self.cycles, &self.halt);
                if self.bus.write(addr, val, &mut ctx) {
                    return;
                }
            }
        }
        self.mem.set(loc, val);
    }

    pub fn push(&mut self, val: u16) {
        let sp = self.sp().wrapping_sub(1);
        self.set_sp(sp);
        self.write(sp as Loc, val);
    }

    pub fn pop(&mut self) -> u16 {
        let sp = self.sp();
        let val = self.read(sp as Loc);
        self.set_sp(sp.wrapping_add(1));
        val
    }

    /// Software interrupt. Dropped when IA is 0; overflow latches and halts on the next step.
    pub fn interrupt(&mut self, msg: u16) {
        let ia = self.ia();
        // QueueFull is latched in the controller and surfaces as InterruptOverflow.
        let _ = self.irq.post(ia, msg);
    }

    pub fn set_queueing(&mut self, on: bool) {
        self.irq.set_queueing(on);
    }

    fn fetch(&mut self) -> u16 {
        let pc = self.pc();
        let word = self.read(pc as Loc);
        self.set_pc(pc.wrapping_add(1));
        word
    }

    fn resolve(&mut self, code: u8, slot: Slot) -> Place {
        let reg = |code: u8| Register::from_index(code & 0x7);
        match code {
            0x00..=0x07 => Place::at(reg_loc(reg(code))),
            0x08..=0x0f => Place::at(self.mem.reg(reg(code)) as Loc),
            0x10..=0x17 => {
                let base = self.mem.reg(reg(code));
                let off = self.fetch();
                Place::at(base.wrapping_add(off) as Loc)
            }
            isa::PUSH_POP => match slot {
                Slot::B => {
                    let sp = self.sp().wrapping_sub(1);
                    self.set_sp(sp);
                    Place::at(sp as Loc)
                }
                Slot::A => {
                    let sp = self.sp();
                    self.set_sp(sp.wrapping_add(1));
                    Place::at(sp as Loc)
                }
            },
            isa::PEEK => Place::at(self.sp() as Loc),
            isa::PICK => {
                let off = self.fetch();
                Place::at(self.sp().wrapping_add(off) as Loc)
            }
            isa::SP => Place {
                read: memory::SP_SHADOW,
                write: memory::SP,
            },
            isa::PC => Place {
                read: memory::PC_SHADOW,
                write: memory::PC,
            },
            isa::EX => Place::at(memory::EX),
            isa::AT_NEXT => Place::at(self.fetch() as Loc),
            isa::NEXT => {
                let val = self.fetch();
                let cell = match slot {
                    Slot::A => memory::LITERAL_A,
                    Slot::B => memory::LITERAL_B,
                };
                self.mem.latch_literal(cell, val);
                Place::at(cell)
            }
            _ => Place::at(const_loc(code)),
        }
    }

    fn skip_operand(&mut self, code: u8) {
        let n = isa::operand_words(code);
        self.set_pc(self.pc().wrapping_add(n));
    }

    fn dispatch(&mut self, ia: u16, msg: u16) {
        let pc = self.pc();
        self.push(pc);
        let a = self.reg(Register::A);
        self.push(a);
        self.set_reg(Register::A, msg);
        self.set_pc(ia);
        self.irq.set_queueing(true);
        tracing::debug!(msg, ia, ret = pc, "interrupt dispatch");
    }

    fn tick(&mut self, raw: u16) {
        if self.bus.is_empty() {
            return;
        }
        let ia = self.mem.get(memory::IA);
        let mut ctx = DeviceCtx::new(self.mem.ram_mut(), &mut self.irq, ia, &mut self.cycles, &self.halt);
        self.bus.tick(raw, &mut ctx);
    }

    fn stop(&mut self, reason: HaltReason) {
        tracing::debug!(%reason, "halt");
        self.flags.insert(CpuFlags::HALTED);
        self.halt_reason = Some(reason);
    }

    fn notify(&mut self, addr: u16, after: bool) {
        if let Some(mut obs) = self.observer.take() {
            if after {
                obs.after_step(addr, &self.mem);
            } else {
                obs.before_step(addr, &self.mem);
            }
            self.observer = Some(obs);
        }
    }

    pub fn step<D: Decoder, X: Executor>(&mut self, dec: &D, exec: &X) -> StepOutcome {
        if let Some(reason) = self.halt_reason {
            return StepOutcome::Halted(reason);
        }
        if self.halt.load(Ordering::SeqCst) {
            self.stop(HaltReason::Requested);
            return StepOutcome::Halted(HaltReason::Requested);
        }
        if self.irq.overflowed() {
            self.flags.insert(CpuFlags::ON_FIRE);
            self.stop(HaltReason::InterruptOverflow);
            return StepOutcome::Halted(HaltReason::InterruptOverflow);
        }

        let skipping = self.flags.contains(CpuFlags::SKIP);
        if !skipping {
            if let Some(msg) = self.irq.take() {
                let ia = self.ia();
                if ia != 0 {
                    self.dispatch(ia, msg);
                    return StepOutcome::Interrupt { msg };
                }
                // IA was cleared after the message was queued
                self.irq.clear();
            }
        }

        let addr = self.pc();
        self.at = addr;
        let raw = self.fetch();
        let (pc, sp) = (self.pc(), self.sp());
        self.mem.set(memory::PC_SHADOW, pc);
        self.mem.set(memory::SP_SHADOW, sp);

        if skipping {
            self.flags.remove(CpuFlags::SKIP);
            let (o, b, a) = isa::fields(raw);
            if o != 0 {
                self.skip_operand(b);
            }
            self.skip_operand(a);
            self.cycles += 1;
            tracing::trace!(addr, raw, "skip");
            return StepOutcome::Skipped { addr };
        }

        let Some(d) = dec.decode(raw) else {
            self.flags.insert(CpuFlags::RESERVED);
            self.stop(HaltReason::Reserved { pc: addr, word: raw });
            return StepOutcome::Reserved { addr, word: raw };
        };

        self.notify(addr, false);
        let b = if d.op.is_special() {
            None
        } else {
            Some(self.resolve(d.b, Slot::B))
        };
        let a = self.resolve(d.a, Slot::A);
        tracing::trace!(addr, op = ?d.op, "exec");
        let flow = exec.exec(self, &d, b, a);
        self.cycles += describe(d.op).cycles + (d.width() - 1) as u64;
        if let Flow::Skip = flow {
            self.flags.insert(CpuFlags::SKIP);
        }
        self.tick(raw);
        self.notify(addr, true);
        if let Flow::Halt(reason) = flow {
            self.stop(reason);
        }
        StepOutcome::Executed { addr, op: d.op }
    }

    /// Steps until halted, or until `limit` steps have run.
    pub fn run<D: Decoder, X: Executor>(
        &mut self,
        dec: &D,
        exec: &X,
        limit: Option<u64>,
    ) -> RunSummary {
        let mut steps = 0u64;
        while !self.halted() {
            if limit.is_some_and(|l| steps >= l) {
                break;
            }
            if let StepOutcome::Halted(_) = self.step(dec, exec) {
                break;
            }
            steps += 1;
        }
        RunSummary {
            steps,
            halt: self.halt_reason,
        }
    }
}

impl Drop for Cpu {
    fn drop(&mut self) {
        // lets devices with background threads shut down
        self.bus.detach_all();
    }
}
