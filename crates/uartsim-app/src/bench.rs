use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use uartsim_core::{Simulator, TraceStore};
use uartsim_decode::{UartChar, UartDecoder};

use crate::config::{BenchConfig, Timing};
use crate::device::Device;
use crate::error::BenchError;
use crate::pins::{interface, DevicePins, DriverPins};
use crate::sequencer::{ScenarioReport, Sequencer};

const TRACE_CAPACITY: usize = 100_000;

pub struct Testbench {
    sim: Simulator,
    config: BenchConfig,
    timing: Timing,
    driver: Option<DriverPins>,
    device: Option<DevicePins>,
    trace: Option<TraceStore>,
}

impl Testbench {
    /// Validates `config` and creates the interface signals. Nothing runs
    /// until [`run`](Self::run).
    pub fn new(config: BenchConfig) -> Result<Self, BenchError> {
        let timing = config.timing()?;
        let sim = Simulator::new();
        let (driver, device) = interface(&sim)?;
        log::debug!(
            "testbench: clock {} ns, bit {} ns ({} clocks per bit)",
            timing.clk_period,
            timing.bit_period,
            timing.clocks_per_bit
        );
        Ok(Self {
            sim,
            config,
            timing,
            driver: Some(driver),
            device: Some(device),
            trace: None,
        })
    }

    pub fn simulator(&self) -> &Simulator {
        &self.sim
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }

    pub fn attach<D: Device>(&mut self, device: D) -> Result<(), BenchError> {
        let pins = self
            .device
            .take()
            .ok_or_else(|| BenchError::Config("a device is already attached".into()))?;
        device.attach(&self.sim, pins);
        Ok(())
    }

    pub fn record_trace(&mut self) -> Result<(), BenchError> {
        let driver = self
            .driver
            .as_ref()
            .ok_or_else(|| BenchError::Config("trace must be attached before the run".into()))?;
        let (rst_n, rx, tx_data, tx_start) = (
            driver.rst_n.reader(),
            driver.rx.reader(),
            driver.tx_data.reader(),
            driver.tx_start.reader(),
        );
        let probes = [&rst_n, &rx, &driver.rx_data, &tx_data, &tx_start, &driver.tx_busy, &driver.tx];
        self.trace = Some(TraceStore::attach(&self.sim, &probes, TRACE_CAPACITY));
        Ok(())
    }

    /// Runs the scenario to completion, then abandons the clock and device
    /// processes.
    pub fn run(&mut self) -> Result<ScenarioReport, BenchError> {
        if self.device.is_some() {
            return Err(BenchError::Config("no device attached".into()));
        }
        let pins = self
            .driver
            .take()
            .ok_or_else(|| BenchError::Config("scenario already ran".into()))?;

        let sequencer = Sequencer::new(self.config, self.timing);
        let result = self.sim.run_until(sequencer.run(self.sim.clone(), pins));
        self.sim.halt();
        if let Some(trace) = self.trace.as_mut() {
            trace.sync();
        }
        result?
    }

    pub fn trace(&mut self) -> Option<&TraceStore> {
        let trace = self.trace.as_mut()?;
        trace.sync();
        Some(trace)
    }

    pub fn decode_tx(&mut self) -> Vec<UartChar> {
        let end = self.sim.now();
        let decoder = UartDecoder::new(self.timing.bit_period);
        self.trace()
            .map(|trace| decoder.decode(&trace.waveform("tx"), end))
            .unwrap_or_default()
    }

    pub fn export_trace(&mut self, path: &Path) -> Result<(), BenchError> {
        let Some(trace) = self.trace() else {
            return Err(BenchError::Config("no trace recorded".into()));
        };
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, trace.entries())?;
        log::debug!("saved {} trace entries to {}", trace.entries().len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::UartDevice;

    #[test]
    fn invalid_config_fails_before_anything_runs() {
        let config = BenchConfig { baud_rate: 0, ..Default::default() };
        assert!(matches!(Testbench::new(config), Err(BenchError::Config(_))));
    }

    #[test]
    fn run_requires_a_device() {
        let mut bench = Testbench::new(BenchConfig::default()).unwrap();
        let err = bench.run().unwrap_err();
        assert_eq!(err.to_string(), "invalid configuration: no device attached");
        assert_eq!(bench.simulator().now(), 0);
    }

    #[test]
    fn device_can_only_be_attached_once() {
        let config = BenchConfig::default();
        let mut bench = Testbench::new(config).unwrap();
        bench.attach(UartDevice::for_config(&config).unwrap()).unwrap();
        assert!(bench.attach(UartDevice::for_config(&config).unwrap()).is_err());
    }

    #[test]
    fn no_trace_unless_requested() {
        let mut bench = Testbench::new(BenchConfig::default()).unwrap();
        assert!(bench.trace().is_none());
        assert!(bench.decode_tx().is_empty());
    }
}
