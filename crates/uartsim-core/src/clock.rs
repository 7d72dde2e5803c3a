use crate::error::SimError;
use crate::scheduler::Simulator;
use crate::signal::SignalWriter;
use crate::time::{period_ns, SimTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clock {
    period: SimTime,
}

impl Clock {
    /// Fails unless `period` splits into two equal, non-empty halves.
    pub fn new(period: SimTime) -> Result<Self, SimError> {
        if period < 2 || period % 2 != 0 {
            return Err(SimError::InvalidClockPeriod(period));
        }
        Ok(Self { period })
    }

    pub fn from_frequency(hz: u32) -> Result<Self, SimError> {
        Self::new(period_ns(hz).unwrap_or(0))
    }

    pub fn period(&self) -> SimTime {
        self.period
    }

    pub fn half_period(&self) -> SimTime {
        self.period / 2
    }

    /// The signal goes high immediately and then toggles forever; the
    /// process only ends when the simulator is halted.
    pub fn start(self, sim: &Simulator, signal: SignalWriter) {
        log::debug!(
            "starting clock `{}` with period {} ns at {} ns",
            signal.reader().name(),
            self.period,
            sim.now()
        );
        let sim2 = sim.clone();
        let half = self.half_period();
        sim.spawn(async move {
            let mut level = true;
            loop {
                signal.set_bool(level);
                sim2.delay(half).await;
                level = !level;
            }
        });
    }
}
