use std::sync::atomic::{AtomicBool, Ordering};

use crate::interrupt::{InterruptController, InterruptError};

pub const LINE_COUNT: usize = 16;
pub const LINE_WORDS: u32 = 0x1000;

/// One of the 16 4096-word windows of the address space, keyed by the top 4 address bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Line(u8);

impl Line {
    pub fn new(index: u8) -> Option<Line> {
        ((index as usize) < LINE_COUNT).then_some(Line(index))
    }

    pub fn of(addr: u16) -> Line {
        Line((addr >> 12) as u8)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn base(self) -> u16 {
        (self.0 as u16) << 12
    }

    pub fn offset(addr: u16) -> u16 {
        addr & 0x0fff
    }
}

impl std::fmt::Display for Line {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {:#x} ({:#06x}..={:#06x})", self.0, self.base(), self.base() | 0x0fff)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(usize);

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("{line} already claimed by `{owner}`")]
    LineClaimed { line: Line, owner: String },
}

/// What a device may touch while servicing a callback.
pub struct DeviceCtx<'a> {
    pub(crate) ram: &'a mut [u16],
    pub(crate) irq: &'a mut InterruptController,
    pub(crate) ia: u16,
    pub(crate) cycles: &'a mut u64,
    pub(crate) halt: &'a AtomicBool,
    pub(crate) base: Option<u16>,
}

impl<'a> DeviceCtx<'a> {
    pub fn new(
        ram: &'a mut [u16],
        irq: &'a mut InterruptController,
        ia: u16,
        cycles: &'a mut u64,
        halt: &'a AtomicBool,
    ) -> Self {
        Self { ram, irq, ia, cycles, halt, base: None }
    }

    /// First address of the line the device claims, if any.
    pub fn base(&self) -> Option<u16> {
        self.base
    }

    pub fn read_ram(&self, addr: u16) -> u16 {
        self.ram[addr as usize]
    }

    pub fn write_ram(&mut self, addr: u16, val: u16) {
        self.ram[addr as usize] = val;
    }

    pub fn post_interrupt(&mut self, msg: u16) -> Result<(), InterruptError> {
        self.irq.post(self.ia, msg)
    }

    pub fn cycles(&self) -> u64 {
        *self.cycles
    }

    pub fn consume_cycles(&mut self, n: u64) {
        *self.cycles = self.cycles.saturating_add(n);
    }

    pub fn request_halt(&self) {
        self.halt.store(true, Ordering::SeqCst);
    }
}

pub trait Peripheral {
    fn name(&self) -> &str {
        "device"
    }

    fn on_attach(&mut self, _line: Option<Line>) {}

    fn on_detach(&mut self) {}

    /// Called once per executed instruction, after its effect is committed.
    fn on_tick(&mut self, _opcode: u16, _ctx: &mut DeviceCtx<'_>) {}

    fn on_read(&mut self, offset: u16, ctx: &mut DeviceCtx<'_>) -> u16 {
        let base = ctx.base().unwrap_or(0);
        ctx.read_ram(base.wrapping_add(offset))
    }

    fn on_write(&mut self, offset: u16, new: u16, _old: u16, ctx: &mut DeviceCtx<'_>) {
        let base = ctx.base().unwrap_or(0);
        ctx.write_ram(base.wrapping_add(offset), new);
    }
}

struct Attached {
    dev: Box<dyn Peripheral>,
    line: Option<Line>,
}

#[derive(Default)]
pub struct PeripheralBus {
    lines: [Option<DeviceId>; LINE_COUNT],
    slots: Vec<Option<Attached>>,
}

impl PeripheralBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(
        &mut self,
        mut dev: Box<dyn Peripheral>,
        line: Option<Line>,
    ) -> Result<DeviceId, BusError> {
        if let Some(l) = line {
            if let Some(owner) = self.lines[l.index()] {
                let owner = self
                    .get(owner)
                    .map(|d| d.name().to_string())
                    .unwrap_or_default();
                return Err(BusError::LineClaimed { line: l, owner });
            }
        }
        let id = DeviceId(self.slots.len());
        if let Some(l) = line {
            self.lines[l.index()] = Some(id);
        }
        tracing::debug!(device = dev.name(), ?line, "attach");
        dev.on_attach(line);
        self.slots.push(Some(Attached { dev, line }));
        Ok(id)
    }

    /// Removes a device, freeing its line. Detaching twice returns `None` the second time.
    pub fn detach(&mut self, id: DeviceId) -> Option<Box<dyn Peripheral>> {
        let Attached { mut dev, line } = self.slots.get_mut(id.0)?.take()?;
        if let Some(l) = line {
            self.lines[l.index()] = None;
        }
        tracing::debug!(device = dev.name(), ?line, "detach");
        dev.on_detach();
        Some(dev)
    }

    pub fn detach_all(&mut self) {
        for i in 0..self.slots.len() {
            self.detach(DeviceId(i));
        }
    }

    pub fn get(&self, id: DeviceId) -> Option<&dyn Peripheral> {
        self.slots
            .get(id.0)
            .and_then(|s| s.as_ref())
            .map(|a| a.dev.as_ref())
    }

    pub fn owner(&self, addr: u16) -> Option<DeviceId> {
        self.lines[Line::of(addr).index()]
    }

    pub fn is_claimed(&self, line: Line) -> bool {
        self.lines[line.index()].is_some()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn claimed(&mut self, addr: u16) -> Option<&mut Attached> {
        let id = self.owner(addr)?;
        self.slots.get_mut(id.0)?.as_mut()
    }

    /// Routes a read to the owning device; `None` when the line is unclaimed.
    pub fn read(&mut self, addr: u16, ctx: &mut DeviceCtx<'_>) -> Option<u16> {
        let att = self.claimed(addr)?;
        ctx.base = att.line.map(Line::base);
        Some(att.dev.on_read(Line::offset(addr), ctx))
    }

    /// Routes a write to the owning device; `false` when the line is unclaimed.
    pub fn write(&mut self, addr: u16, val: u16, ctx: &mut DeviceCtx<'_>) -> bool {
        let Some(att) = self.claimed(addr) else {
            return false;
        };
        let old = ctx.read_ram(addr);
        ctx.base = att.line.map(Line::base);
        att.dev.on_write(Line::offset(addr), val, old, ctx);
        true
    }

    pub fn tick(&mut self, opcode: u16, ctx: &mut DeviceCtx<'_>) {
        for att in self.slots.iter_mut().flatten() {
            ctx.base = att.line.map(Line::base);
            att.dev.on_tick(opcode, ctx);
        }
    }
}
