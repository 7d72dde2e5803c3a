use serde::{Deserialize, Serialize};
use uartsim_core::{Clock, SimTime};
use uartsim_decode::uart::FRAME_SLOTS;
use uartsim_decode::BaudRate;

use crate::error::BenchError;

pub const CLK_FREQ_HZ: u32 = 50_000_000;
pub const BAUD_RATE: u32 = 9600;

/// Fewest clock cycles per bit the receiver can sample in the middle of.
pub const MIN_CLOCKS_PER_BIT: u32 = 4;

pub const DEFAULT_BUSY_POLL_FRAMES: u32 = 4;

/// How long the transmit poll waits for `tx_busy` to clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BusyPollLimit {
    /// Frame times at the configured baud rate, converted to clock edges.
    Frames(u32),
    Edges(u64),
    Unbounded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchConfig {
    pub clk_freq_hz: u32,
    pub baud_rate: u32,
    pub rx_byte: u8,
    pub tx_byte: u8,
    /// Clock periods `rst_n` is held low, and then held high.
    pub reset_cycles: u32,
    pub idle_margin_bits: u32,
    /// Bit periods waited after the RX frame and after TX completes.
    pub settle_bits: u32,
    pub busy_poll_limit: BusyPollLimit,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            clk_freq_hz: CLK_FREQ_HZ,
            baud_rate: BAUD_RATE,
            rx_byte: 0x5A,
            tx_byte: 0x5A,
            reset_cycles: 5,
            idle_margin_bits: 3,
            settle_bits: 12,
            busy_poll_limit: BusyPollLimit::Frames(DEFAULT_BUSY_POLL_FRAMES),
        }
    }
}

/// Time constants derived from a [`BenchConfig`]; fixed for a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Timing {
    pub clk_period: SimTime,
    pub bit_period: SimTime,
    pub clocks_per_bit: u32,
    /// `None` polls until busy clears.
    pub busy_poll_edges: Option<u64>,
}

impl BenchConfig {
    pub fn timing(&self) -> Result<Timing, BenchError> {
        if self.clk_freq_hz == 0 {
            return Err(BenchError::Config("clock frequency must be non-zero".into()));
        }
        let bit_period = BaudRate(self.baud_rate)
            .bit_period()
            .ok_or_else(|| BenchError::Config("baud rate must be non-zero".into()))?;
        let clock = Clock::from_frequency(self.clk_freq_hz)?;

        let clocks_per_bit = self.clk_freq_hz / self.baud_rate;
        if clocks_per_bit < MIN_CLOCKS_PER_BIT {
            return Err(BenchError::Config(format!(
                "{} baud needs at least {} clocks per bit, {} Hz gives {}",
                self.baud_rate, MIN_CLOCKS_PER_BIT, self.clk_freq_hz, clocks_per_bit
            )));
        }
        if self.reset_cycles == 0 {
            return Err(BenchError::Config("reset must last at least one clock".into()));
        }

        let busy_poll_edges = match self.busy_poll_limit {
            BusyPollLimit::Frames(0) | BusyPollLimit::Edges(0) => {
                return Err(BenchError::Config("busy poll limit must be non-zero".into()));
            }
            BusyPollLimit::Frames(frames) => {
                Some(u64::from(frames) * FRAME_SLOTS as u64 * u64::from(clocks_per_bit))
            }
            BusyPollLimit::Edges(edges) => Some(edges),
            BusyPollLimit::Unbounded => None,
        };

        Ok(Timing { clk_period: clock.period(), bit_period, clocks_per_bit, busy_poll_edges })
    }
}
