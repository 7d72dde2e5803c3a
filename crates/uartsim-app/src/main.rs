use std::path::PathBuf;

use anyhow::{Context, Result};
use uartsim_app::{BenchConfig, Testbench, UartDevice};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = BenchConfig::default();
    let mut bench = Testbench::new(config).context("invalid testbench configuration")?;
    bench.attach(UartDevice::for_config(&config)?)?;
    bench.record_trace()?;

    let report = bench.run().context("UART TX/RX scenario failed")?;
    log::info!(
        "rx_data matched 0x{:02X}; tx_busy cleared after {} clock edges; {} ns simulated",
        report.rx_byte,
        report.busy.edges,
        report.finished_at
    );

    for ch in bench.decode_tx() {
        log::info!(
            "tx line: 0x{:02X} at {}..{} ns{}",
            ch.byte,
            ch.span.start_ns,
            ch.span.end_ns,
            if ch.framing_ok { "" } else { " (framing error)" }
        );
    }

    if let Some(path) = std::env::var_os("UARTSIM_TRACE").map(PathBuf::from) {
        bench
            .export_trace(&path)
            .with_context(|| format!("failed to write trace to {}", path.display()))?;
        log::info!("waveform written to {}", path.display());
    }

    Ok(())
}
