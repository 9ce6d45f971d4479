//! Drift-free periodic delay.

use crate::port::{Port, TickType};

/// Wake-time bookkeeping for a fixed-rate task loop.
///
/// The first [`delay_until`](Self::delay_until) anchors to the current
/// tick count; every call after that wakes exactly `period` ticks after the
/// previous wake time, no matter how long the loop body took.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DelayUntil {
    initialized: bool,
    previous_wake: TickType,
}

impl DelayUntil {
    pub const fn new() -> Self {
        Self {
            initialized: false,
            previous_wake: 0,
        }
    }

    /// Block until `period` ticks after the previous wake time.
    pub fn delay_until<P: Port>(&mut self, port: &P, period: TickType) {
        if !self.initialized {
            self.initialized = true;
            self.previous_wake = port.tick_count();
        }

        port.delay_until(&mut self.previous_wake, period);
    }

    /// Forget the cadence; the next call re-anchors to the current tick.
    pub fn reset(&mut self) {
        self.initialized = false;
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Last wake time handed back by the kernel.
    pub fn previous_wake(&self) -> Option<TickType> {
        self.initialized.then_some(self.previous_wake)
    }
}
