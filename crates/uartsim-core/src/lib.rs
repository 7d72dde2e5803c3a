//! Core functionalities: discrete-event scheduler, signals, clock, waveform trace.

pub mod clock;
pub mod error;
pub mod scheduler;
pub mod signal;
pub mod time;
pub mod trace;

pub use clock::Clock;
pub use error::SimError;
pub use scheduler::{Delay, Simulator};
pub use signal::{Edge, EdgeWait, SignalEvent, SignalId, SignalReader, SignalWriter};
pub use time::{period_ns, SimTime};
pub use trace::{TraceEntry, TraceStore};
