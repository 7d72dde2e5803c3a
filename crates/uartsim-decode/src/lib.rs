pub mod uart;

use serde::{Deserialize, Serialize};
use uartsim_core::{period_ns, SimTime};

pub use uart::{Frame, FrameError, UartChar, UartDecoder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaudRate(pub u32); // symbols per second

impl BaudRate {
    /// Bit period `T` in nanoseconds, rounded to the nearest nanosecond.
    pub fn bit_period(&self) -> Option<SimTime> {
        period_ns(self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSpan {
    pub start_ns: SimTime,
    pub end_ns: SimTime,
}

impl TimeSpan {
    pub fn duration(&self) -> SimTime {
        self.end_ns - self.start_ns
    }
}
