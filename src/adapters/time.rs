//! Clock adapters for calm-window evaluation.

use chrono::{Local, Timelike};

use crate::app::ports::Clock;

/// Real local wall-clock.
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn minutes_of_day(&self) -> u16 {
        let now = Local::now();
        (now.hour() * 60 + now.minute()) as u16
    }
}

/// A clock pinned to a fixed time of day — for tests and the simulator.
pub struct FixedClock(pub u16);

impl Clock for FixedClock {
    fn minutes_of_day(&self) -> u16 {
        self.0
    }
}
