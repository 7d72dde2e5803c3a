//! 8N1 UART framing: one start bit, eight data bits LSB first, one stop bit.

use serde::Serialize;
use thiserror::Error;
use uartsim_core::SimTime;

use crate::TimeSpan;

pub const DATA_BITS: usize = 8;
pub const FRAME_SLOTS: usize = DATA_BITS + 2;

pub const IDLE_LEVEL: bool = true;
pub const START_LEVEL: bool = false;
pub const STOP_LEVEL: bool = true;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("start bit sampled high")]
    StartBitHigh,
    #[error("stop bit sampled low (framing error)")]
    StopBitLow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    slots: [bool; FRAME_SLOTS],
}

impl Frame {
    /// Data bit `i` of `byte` lands in data slot `i`.
    pub fn encode(byte: u8) -> Self {
        let mut slots = [STOP_LEVEL; FRAME_SLOTS];
        slots[0] = START_LEVEL;
        for i in 0..DATA_BITS {
            slots[1 + i] = (byte >> i) & 1 == 1;
        }
        Self { slots }
    }

    pub fn from_slots(slots: [bool; FRAME_SLOTS]) -> Self {
        Self { slots }
    }

    pub fn slots(&self) -> [bool; FRAME_SLOTS] {
        self.slots
    }

    pub fn start_bit(&self) -> bool {
        self.slots[0]
    }

    pub fn data_bit(&self, index: usize) -> bool {
        assert!(index < DATA_BITS, "data bit index {index} out of range");
        self.slots[1 + index]
    }

    pub fn stop_bit(&self) -> bool {
        self.slots[FRAME_SLOTS - 1]
    }

    pub fn data_byte(&self) -> u8 {
        (0..DATA_BITS).fold(0u8, |acc, i| acc | (u8::from(self.data_bit(i)) << i))
    }

    pub fn decode(&self) -> Result<u8, FrameError> {
        if self.start_bit() != START_LEVEL {
            return Err(FrameError::StartBitHigh);
        }
        if self.stop_bit() != STOP_LEVEL {
            return Err(FrameError::StopBitLow);
        }
        Ok(self.data_byte())
    }

    pub fn duration(bit_period: SimTime) -> SimTime {
        FRAME_SLOTS as SimTime * bit_period
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UartChar {
    pub byte: u8,
    pub span: TimeSpan,
    pub framing_ok: bool,
}

/// Recovers characters from a recorded line waveform by sampling each bit
/// slot in its middle.
#[derive(Debug, Clone, Copy)]
pub struct UartDecoder {
    bit_period: SimTime,
}

impl UartDecoder {
    pub fn new(bit_period: SimTime) -> Self {
        Self { bit_period }
    }

    pub fn bit_period(&self) -> SimTime {
        self.bit_period
    }

    /// Decodes `transitions`, a time-ordered list of `(time, level)` changes
    /// where bit 0 of the value is the line level. The line is idle before
    /// the first transition. Frames whose stop bit would be sampled after
    /// `end` are not reported.
    pub fn decode(&self, transitions: &[(SimTime, u64)], end: SimTime) -> Vec<UartChar> {
        let level_at = |t: SimTime| {
            let idx = transitions.partition_point(|&(time, _)| time <= t);
            if idx == 0 {
                IDLE_LEVEL
            } else {
                transitions[idx - 1].1 & 1 == 1
            }
        };
        let half = self.bit_period / 2;

        let mut chars = Vec::new();
        let mut resume = 0;
        let mut prev = IDLE_LEVEL;
        for &(t, value) in transitions {
            let level = value & 1 == 1;
            let falling = prev && !level;
            prev = level;
            if !falling || t < resume {
                continue;
            }

            let sample_time = |slot: usize| t + half + slot as SimTime * self.bit_period;
            let stop_time = sample_time(FRAME_SLOTS - 1);
            if stop_time > end {
                break;
            }
            // too short to be a start bit
            if level_at(sample_time(0)) != START_LEVEL {
                continue;
            }

            let mut slots = [false; FRAME_SLOTS];
            for (slot, sampled) in slots.iter_mut().enumerate() {
                *sampled = level_at(sample_time(slot));
            }
            let frame = Frame::from_slots(slots);
            chars.push(UartChar {
                byte: frame.data_byte(),
                span: TimeSpan { start_ns: t, end_ns: t + Frame::duration(self.bit_period) },
                framing_ok: frame.stop_bit() == STOP_LEVEL,
            });
            resume = stop_time;
        }
        chars
    }
}
