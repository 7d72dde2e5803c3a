use serde::Serialize;
use uartsim_core::{SignalReader, SignalWriter};

use crate::error::BenchError;

pub fn check_rx(rx_data: &SignalReader, expected: u8) -> Result<u8, BenchError> {
    let actual = (rx_data.value() & 0xFF) as u8;
    if actual != expected {
        log::error!("rx_data is 0x{actual:02X}, expected 0x{expected:02X}");
        return Err(BenchError::RxMismatch { expected, actual });
    }
    Ok(actual)
}

pub async fn strobe(tx_start: &SignalWriter, clk: &SignalReader) {
    tx_start.set_high();
    clk.rising_edge().await;
    tx_start.set_low();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BusyPoll {
    /// Rising clock edges waited, including the one that saw busy low.
    pub edges: u64,
    pub saw_busy: bool,
}

/// Waits on rising edges of `clk` until `tx_busy` reads low.
///
/// Values read at an edge are the ones committed before it, so the first
/// poll observes what the device did on the strobe edge. With a `limit`,
/// giving up after that many edges is reported as
/// [`BenchError::BusyTimeout`].
pub async fn wait_while_busy(
    clk: &SignalReader,
    tx_busy: &SignalReader,
    limit: Option<u64>,
) -> Result<BusyPoll, BenchError> {
    let mut poll = BusyPoll { edges: 0, saw_busy: false };
    loop {
        clk.rising_edge().await;
        poll.edges += 1;
        if !tx_busy.is_high() {
            return Ok(poll);
        }
        poll.saw_busy = true;
        if limit.is_some_and(|max| poll.edges >= max) {
            return Err(BenchError::BusyTimeout { edges: poll.edges });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uartsim_core::{Clock, Simulator};

    #[test]
    fn matching_byte_passes() {
        let sim = Simulator::new();
        let rx_data = sim.signal("rx_data", 8, 0x5A).unwrap();
        assert_eq!(check_rx(&rx_data.reader(), 0x5A).unwrap(), 0x5A);
    }

    #[test]
    fn mismatch_reports_both_values_in_hex() {
        let sim = Simulator::new();
        let rx_data = sim.signal("rx_data", 8, 0x0A).unwrap();
        let err = check_rx(&rx_data.reader(), 0x5A).unwrap_err();
        assert!(matches!(err, BenchError::RxMismatch { expected: 0x5A, actual: 0x0A }));
        assert_eq!(err.to_string(), "RX mismatch: expected 0x5A, got 0x0A");
    }

    #[test]
    fn strobe_spans_one_rising_edge() {
        let sim = Simulator::new();
        let clk = sim.signal("clk", 1, 0).unwrap();
        let tx_start = sim.signal("tx_start", 1, 0).unwrap();
        let clk_r = clk.reader();
        let events = sim.subscribe(&[tx_start.id()]);
        Clock::new(20).unwrap().start(&sim, clk);

        let sim2 = sim.clone();
        sim.run_until(async move {
            sim2.delay(5).await;
            strobe(&tx_start, &clk_r).await;
        })
        .unwrap();

        let seen: Vec<_> = events.try_iter().map(|e| (e.time, e.value)).collect();
        assert_eq!(seen, vec![(5, 1), (20, 0)]);
    }

    /// Busy rises on the first edge, stays high for `high_edges` edges.
    fn busy_for(sim: &Simulator, clk: SignalReader, high_edges: u64) -> SignalReader {
        let busy = sim.signal("tx_busy", 1, 0).unwrap();
        let reader = busy.reader();
        sim.spawn(async move {
            clk.rising_edge().await;
            busy.set_high();
            for _ in 0..high_edges {
                clk.rising_edge().await;
            }
            busy.set_low();
        });
        reader
    }

    #[test]
    fn polls_until_busy_clears() {
        let sim = Simulator::new();
        let clk = sim.signal("clk", 1, 0).unwrap();
        let clk_r = clk.reader();
        Clock::new(20).unwrap().start(&sim, clk);
        let busy = busy_for(&sim, clk_r.clone(), 10);

        let sim2 = sim.clone();
        let (poll, t) = sim
            .run_until(async move {
                clk_r.rising_edge().await;
                let poll = wait_while_busy(&clk_r, &busy, Some(100)).await.unwrap();
                (poll, sim2.now())
            })
            .unwrap();
        assert_eq!(poll, BusyPoll { edges: 11, saw_busy: true });
        assert_eq!(t, 11 * 20);
    }

    #[test]
    fn busy_that_never_clears_hits_the_limit() {
        let sim = Simulator::new();
        let clk = sim.signal("clk", 1, 0).unwrap();
        let clk_r = clk.reader();
        Clock::new(20).unwrap().start(&sim, clk);
        let busy = busy_for(&sim, clk_r.clone(), u64::MAX);

        let result = sim
            .run_until(async move {
                clk_r.rising_edge().await;
                wait_while_busy(&clk_r, &busy, Some(50)).await
            })
            .unwrap();
        assert!(matches!(result, Err(BenchError::BusyTimeout { edges: 50 })));
    }

    #[test]
    fn busy_never_raised_is_reported() {
        let sim = Simulator::new();
        let clk = sim.signal("clk", 1, 0).unwrap();
        let clk_r = clk.reader();
        let busy = sim.signal("tx_busy", 1, 0).unwrap();
        let busy_r = busy.reader();
        Clock::new(20).unwrap().start(&sim, clk);

        let poll = sim
            .run_until(async move { wait_while_busy(&clk_r, &busy_r, None).await })
            .unwrap()
            .unwrap();
        assert_eq!(poll, BusyPoll { edges: 1, saw_busy: false });
    }
}
