use thiserror::Error;

use crate::time::SimTime;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    #[error("clock period must be an even number of ns, at least 2, got {0} ns")]
    InvalidClockPeriod(SimTime),

    #[error("signal width must be 1..=64 bits, got {0}")]
    InvalidWidth(u32),

    #[error("simulation stalled at {0} ns with no pending events")]
    Stalled(SimTime),

    #[error("time limit of {limit} ns exceeded")]
    TimeLimit { limit: SimTime },

    #[error("more than {max} delta cycles at {time} ns")]
    DeltaOverflow { time: SimTime, max: u32 },
}
