use std::fmt;

use serde::Serialize;
use uartsim_core::{Clock, SimTime, Simulator};

use crate::config::{BenchConfig, Timing};
use crate::driver;
use crate::error::BenchError;
use crate::monitor::{self, BusyPoll};
use crate::pins::DriverPins;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Init,
    ClockStarted,
    Reset,
    IdleMargin,
    RxDrive,
    RxSettle,
    RxCheck,
    TxArm,
    TxStrobe,
    TxPollBusy,
    TxSettle,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Init => "INIT",
            Phase::ClockStarted => "CLOCK_STARTED",
            Phase::Reset => "RESET",
            Phase::IdleMargin => "IDLE_MARGIN",
            Phase::RxDrive => "RX_DRIVE",
            Phase::RxSettle => "RX_SETTLE",
            Phase::RxCheck => "RX_CHECK",
            Phase::TxArm => "TX_ARM",
            Phase::TxStrobe => "TX_STROBE",
            Phase::TxPollBusy => "TX_POLL_BUSY",
            Phase::TxSettle => "TX_SETTLE",
            Phase::Done => "DONE",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PhaseMark {
    pub phase: Phase,
    pub entered_at: SimTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioReport {
    pub timing: Timing,
    pub rx_byte: u8,
    pub tx_byte: u8,
    pub busy: BusyPoll,
    pub finished_at: SimTime,
    pub phases: Vec<PhaseMark>,
}

impl ScenarioReport {
    pub fn entered_at(&self, phase: Phase) -> Option<SimTime> {
        self.phases.iter().find(|m| m.phase == phase).map(|m| m.entered_at)
    }
}

pub struct Sequencer {
    config: BenchConfig,
    timing: Timing,
    phases: Vec<PhaseMark>,
}

impl Sequencer {
    pub fn new(config: BenchConfig, timing: Timing) -> Self {
        Self { config, timing, phases: Vec::new() }
    }

    fn enter(&mut self, sim: &Simulator, phase: Phase) {
        log::debug!("{} ns: {phase}", sim.now());
        self.phases.push(PhaseMark { phase, entered_at: sim.now() });
    }

    pub async fn run(mut self, sim: Simulator, pins: DriverPins) -> Result<ScenarioReport, BenchError> {
        let DriverPins { clk, rst_n, rx, tx_data, tx_start, rx_data, tx_busy, tx: _ } = pins;
        let bit = self.timing.bit_period;
        let clk_r = clk.reader();

        self.enter(&sim, Phase::Init);
        rx.set_high();
        tx_start.set_low();
        tx_data.set(0);
        rst_n.set_high();

        Clock::new(self.timing.clk_period)?.start(&sim, clk);
        self.enter(&sim, Phase::ClockStarted);

        self.enter(&sim, Phase::Reset);
        driver::reset(&sim, &rst_n, self.timing.clk_period, self.config.reset_cycles).await;

        self.enter(&sim, Phase::IdleMargin);
        sim.delay(bit * SimTime::from(self.config.idle_margin_bits)).await;

        let rx_byte = self.config.rx_byte;
        self.enter(&sim, Phase::RxDrive);
        log::info!("Sending byte 0x{rx_byte:02X} to device via rx line...");
        driver::send_byte(&sim, &rx, rx_byte, bit).await;

        self.enter(&sim, Phase::RxSettle);
        sim.delay(bit * SimTime::from(self.config.settle_bits)).await;

        self.enter(&sim, Phase::RxCheck);
        monitor::check_rx(&rx_data, rx_byte)?;

        let tx_byte = self.config.tx_byte;
        self.enter(&sim, Phase::TxArm);
        log::info!("Sending byte 0x{tx_byte:02X} via tx path...");
        tx_data.set(u64::from(tx_byte));

        self.enter(&sim, Phase::TxStrobe);
        monitor::strobe(&tx_start, &clk_r).await;

        self.enter(&sim, Phase::TxPollBusy);
        let busy = monitor::wait_while_busy(&clk_r, &tx_busy, self.timing.busy_poll_edges).await?;
        if !busy.saw_busy {
            log::warn!("tx_busy never read high after the start strobe");
        }
        log::info!("TX completed after {} clock edges. Verify 'tx' waveform for correctness.", busy.edges);

        self.enter(&sim, Phase::TxSettle);
        sim.delay(bit * SimTime::from(self.config.settle_bits)).await;

        self.enter(&sim, Phase::Done);
        log::info!("UART TX/RX scenario finished at {} ns", sim.now());

        Ok(ScenarioReport {
            timing: self.timing,
            rx_byte,
            tx_byte,
            busy,
            finished_at: sim.now(),
            phases: self.phases,
        })
    }
}
