use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptError {
    #[error("interrupt queue full ({depth} pending), message {msg:#06x} lost")]
    QueueFull { depth: usize, msg: u16 },
}

/// Pending interrupt messages and the queueing latch.
///
/// Dispatch itself touches registers and the stack, so it lives on the CPU; this type
/// only decides what is pending and whether delivery is currently held back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterruptController {
    queue: VecDeque<u16>,
    depth: usize,
    queueing: bool,
    overflowed: bool,
}

impl InterruptController {
    pub fn new(depth: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            depth,
            queueing: false,
            overflowed: false,
        }
    }

    /// Enqueues `msg` unless delivery is disabled (`ia == 0`), in which case the request
    /// vanishes without a trace.
    pub fn post(&mut self, ia: u16, msg: u16) -> Result<(), InterruptError> {
        if ia == 0 {
            tracing::trace!(msg, "interrupt dropped, IA is 0");
            return Ok(());
        }
        if self.queue.len() >= self.depth {
            self.overflowed = true;
            tracing::error!(msg, depth = self.depth, "interrupt queue overflow");
            return Err(InterruptError::QueueFull { depth: self.depth, msg });
        }
        self.queue.push_back(msg);
        Ok(())
    }

    /// Next message eligible for dispatch.
    pub fn take(&mut self) -> Option<u16> {
        if self.queueing {
            return None;
        }
        self.queue.pop_front()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn pending(&self) -> impl Iterator<Item = u16> + '_ {
        self.queue.iter().copied()
    }

    pub fn queueing(&self) -> bool {
        self.queueing
    }

    pub fn set_queueing(&mut self, on: bool) {
        self.queueing = on;
    }

    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    pub fn reset(&mut self) {
        self.queue.clear();
        self.queueing = false;
        self.overflowed = false;
    }
}
