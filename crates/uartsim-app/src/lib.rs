pub mod bench;
pub mod config;
pub mod device;
pub mod driver;
pub mod error;
pub mod monitor;
pub mod pins;
pub mod sequencer;

pub use bench::Testbench;
pub use config::{BenchConfig, BusyPollLimit, Timing};
pub use device::{Device, UartDevice};
pub use error::BenchError;
pub use monitor::BusyPoll;
pub use pins::{DevicePins, DriverPins};
pub use sequencer::{Phase, PhaseMark, ScenarioReport, Sequencer};
