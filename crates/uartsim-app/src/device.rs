use uartsim_core::{SignalReader, SignalWriter, Simulator};

use crate::config::BenchConfig;
use crate::error::BenchError;
use crate::pins::DevicePins;

pub trait Device {
    fn attach(self, sim: &Simulator, pins: DevicePins);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RxState {
    Idle,
    Start,
    Data,
    Stop,
}

#[derive(Debug, Clone)]
pub struct RxEngine {
    clocks_per_bit: u32,
    state: RxState,
    counter: u32,
    bit: u32,
    shift: u8,
}

impl RxEngine {
    pub fn new(clocks_per_bit: u32) -> Self {
        Self { clocks_per_bit, state: RxState::Idle, counter: 0, bit: 0, shift: 0 }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.clocks_per_bit);
    }

    /// Returns the byte once a frame with a valid stop bit has been received.
    pub fn step(&mut self, level: bool) -> Option<u8> {
        let last = self.clocks_per_bit - 1;
        match self.state {
            RxState::Idle => {
                if !level {
                    self.state = RxState::Start;
                    self.counter = 0;
                }
            }
            RxState::Start => {
                if self.counter == last / 2 {
                    // re-check in the middle of the start bit
                    if level {
                        self.state = RxState::Idle;
                    } else {
                        self.state = RxState::Data;
                        self.counter = 0;
                        self.bit = 0;
                        self.shift = 0;
                    }
                } else {
                    self.counter += 1;
                }
            }
            RxState::Data => {
                if self.counter < last {
                    self.counter += 1;
                } else {
                    self.counter = 0;
                    if level {
                        self.shift |= 1 << self.bit;
                    }
                    if self.bit < 7 {
                        self.bit += 1;
                    } else {
                        self.state = RxState::Stop;
                    }
                }
            }
            RxState::Stop => {
                if self.counter < last {
                    self.counter += 1;
                } else {
                    self.state = RxState::Idle;
                    if level {
                        return Some(self.shift);
                    }
                    log::debug!("receiver dropped 0x{:02X}: stop bit low", self.shift);
                }
            }
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxState {
    Idle,
    Start,
    Data,
    Stop,
}

#[derive(Debug, Clone)]
pub struct TxEngine {
    clocks_per_bit: u32,
    state: TxState,
    counter: u32,
    bit: u32,
    data: u8,
}

impl TxEngine {
    pub fn new(clocks_per_bit: u32) -> Self {
        Self { clocks_per_bit, state: TxState::Idle, counter: 0, bit: 0, data: 0 }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.clocks_per_bit);
    }

    pub fn line(&self) -> bool {
        match self.state {
            TxState::Idle | TxState::Stop => true,
            TxState::Start => false,
            TxState::Data => (self.data >> self.bit) & 1 == 1,
        }
    }

    pub fn busy(&self) -> bool {
        self.state != TxState::Idle
    }

    pub fn step(&mut self, start: bool, data: u8) {
        let last = self.clocks_per_bit - 1;
        match self.state {
            TxState::Idle => {
                if start {
                    self.data = data;
                    self.counter = 0;
                    self.state = TxState::Start;
                }
            }
            TxState::Start => {
                if self.counter < last {
                    self.counter += 1;
                } else {
                    self.counter = 0;
                    self.bit = 0;
                    self.state = TxState::Data;
                }
            }
            TxState::Data => {
                if self.counter < last {
                    self.counter += 1;
                } else {
                    self.counter = 0;
                    if self.bit < 7 {
                        self.bit += 1;
                    } else {
                        self.state = TxState::Stop;
                    }
                }
            }
            TxState::Stop => {
                if self.counter < last {
                    self.counter += 1;
                } else {
                    self.state = TxState::Idle;
                }
            }
        }
    }
}

/// Reference device: an 8N1 receiver and transmitter sharing one clock.
#[derive(Debug, Clone, Copy)]
pub struct UartDevice {
    clocks_per_bit: u32,
}

impl UartDevice {
    /// # Panics
    ///
    /// Panics if `clocks_per_bit < 2`.
    pub fn new(clocks_per_bit: u32) -> Self {
        assert!(clocks_per_bit >= 2, "need at least 2 clocks per bit");
        Self { clocks_per_bit }
    }

    /// Divides the configured clock by the baud rate, truncating.
    pub fn for_config(config: &BenchConfig) -> Result<Self, BenchError> {
        let timing = config.timing()?;
        Ok(Self::new(timing.clocks_per_bit))
    }

    pub fn clocks_per_bit(&self) -> u32 {
        self.clocks_per_bit
    }
}

impl Device for UartDevice {
    fn attach(self, sim: &Simulator, pins: DevicePins) {
        let DevicePins { clk, rst_n, rx, tx_data, tx_start, rx_data, tx_busy, tx } = pins;
        log::debug!("attaching UART device, {} clocks per bit", self.clocks_per_bit);

        sim.spawn(run_receiver(
            RxEngine::new(self.clocks_per_bit),
            clk.clone(),
            rst_n.clone(),
            rx,
            rx_data,
        ));
        sim.spawn(run_transmitter(
            TxEngine::new(self.clocks_per_bit),
            clk,
            rst_n,
            tx_data,
            tx_start,
            tx_busy,
            tx,
        ));
    }
}

async fn run_receiver(
    mut engine: RxEngine,
    clk: SignalReader,
    rst_n: SignalReader,
    rx: SignalReader,
    rx_data: SignalWriter,
) {
    loop {
        clk.rising_edge().await;
        if !rst_n.is_high() {
            engine.reset();
            rx_data.set(0);
            continue;
        }
        if let Some(byte) = engine.step(rx.is_high()) {
            log::debug!("receiver decoded 0x{byte:02X}");
            rx_data.set(u64::from(byte));
        }
    }
}

async fn run_transmitter(
    mut engine: TxEngine,
    clk: SignalReader,
    rst_n: SignalReader,
    tx_data: SignalReader,
    tx_start: SignalReader,
    tx_busy: SignalWriter,
    tx: SignalWriter,
) {
    let mut busy = engine.busy();
    let mut line = engine.line();
    loop {
        clk.rising_edge().await;
        if rst_n.is_high() {
            engine.step(tx_start.is_high(), (tx_data.value() & 0xFF) as u8);
        } else {
            engine.reset();
        }
        if engine.busy() != busy {
            busy = engine.busy();
            tx_busy.set_bool(busy);
        }
        if engine.line() != line {
            line = engine.line();
            tx.set_bool(line);
        }
    }
}
