use thiserror::Error;
use uartsim_core::SimError;

#[derive(Debug, Error)]
pub enum BenchError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("RX mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    RxMismatch { expected: u8, actual: u8 },

    #[error("tx_busy still high after {edges} clock edges")]
    BusyTimeout { edges: u64 },

    #[error("simulation error: {0}")]
    Sim(#[from] SimError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
