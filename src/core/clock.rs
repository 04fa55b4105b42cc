//! Frame clock
//!
//! All delivery-time arithmetic reads the clock through [`Clock`]. A clock must
//! return the same value for every read within one frame, otherwise scope and
//! ordering decisions would depend on where in the frame they were made.

use crate::core::types::Time;

/// Monotonic, frame-consistent time source
pub trait Clock {
    /// Current time in seconds
    fn now(&self) -> Time;
}

/// Clock that only moves when the engine loop advances it
#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    now: Time,
    frame: u64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(now: Time) -> Self {
        Self { now, frame: 0 }
    }

    /// Advance to the next frame
    pub fn advance(&mut self, dt: Time) {
        if dt > 0.0 {
            self.now += dt;
        }
        self.frame += 1;
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }
}

impl Clock for FrameClock {
    fn now(&self) -> Time {
        self.now
    }
}
