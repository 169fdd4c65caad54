use tracing::warn;

use crate::bus::{DeviceCtx, Line, Peripheral};

pub const PERIOD: u16 = 0;
pub const MESSAGE: u16 = 1;
pub const TICKS: u16 = 2;
pub const WAIT: u16 = 3;

/// Cycle-driven timer.
///
/// | offset | read          | write                          |
/// |--------|---------------|--------------------------------|
/// | 0      | period        | period in cycles, 0 stops it   |
/// | 1      | message       | interrupt message, 0 for none  |
/// | 2      | tick count    | ignored                        |
/// | 3      | 0             | burn that many cycles          |
#[derive(Debug, Default)]
pub struct Clock {
    period: u16,
    message: u16,
    ticks: u16,
    deadline: u64,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ticks(&self) -> u16 {
        self.ticks
    }
}

impl Peripheral for Clock {
    fn name(&self) -> &str {
        "clock"
    }

    fn on_attach(&mut self, _line: Option<Line>) {
        *self = Self::default();
    }

    fn on_tick(&mut self, _opcode: u16, ctx: &mut DeviceCtx<'_>) {
        if self.period == 0 || ctx.cycles() < self.deadline {
            return;
        }
        self.ticks = self.ticks.wrapping_add(1);
        self.deadline = ctx.cycles() + self.period as u64;
        if self.message != 0 {
            if let Err(e) = ctx.post_interrupt(self.message) {
                warn!(error = %e, "clock interrupt lost");
            }
        }
    }

    fn on_read(&mut self, offset: u16, _ctx: &mut DeviceCtx<'_>) -> u16 {
        match offset {
            PERIOD => self.period,
            MESSAGE => self.message,
            TICKS => self.ticks,
            _ => 0,
        }
    }

    fn on_write(&mut self, offset: u16, new: u16, _old: u16, ctx: &mut DeviceCtx<'_>) {
        match offset {
            PERIOD => {
                self.period = new;
                self.ticks = 0;
                self.deadline = ctx.cycles() + new as u64;
            }
            MESSAGE => self.message = new,
            WAIT => ctx.consume_cycles(new as u64),
            _ => {}
        }
    }
}
