use uartsim_core::{SignalWriter, SimTime, Simulator};
use uartsim_decode::uart::{Frame, IDLE_LEVEL};

/// Pulses the active-low reset: `rst_n` low for `cycles` clock periods, then
/// high for another `cycles` periods before returning.
pub async fn reset(sim: &Simulator, rst_n: &SignalWriter, clk_period: SimTime, cycles: u32) {
    let hold = clk_period * SimTime::from(cycles);
    rst_n.set_low();
    sim.delay(hold).await;
    rst_n.set_high();
    sim.delay(hold).await;
}

/// Drives one byte onto `line`: an idle bit, then the frame, every level held
/// for exactly `bit_period`. Returns once the stop bit has been held.
pub async fn send_byte(sim: &Simulator, line: &SignalWriter, byte: u8, bit_period: SimTime) {
    line.set_bool(IDLE_LEVEL);
    sim.delay(bit_period).await;

    for level in Frame::encode(byte).slots() {
        line.set_bool(level);
        sim.delay(bit_period).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: SimTime = 104_167;

    #[test]
    fn reset_holds_low_then_high_for_five_clocks() {
        let sim = Simulator::new();
        let rst_n = sim.signal("rst_n", 1, 1).unwrap();
        let events = sim.subscribe(&[rst_n.id()]);

        let sim2 = sim.clone();
        let done_at = sim
            .run_until(async move {
                reset(&sim2, &rst_n, 20, 5).await;
                sim2.now()
            })
            .unwrap();

        let seen: Vec<_> = events.try_iter().map(|e| (e.time, e.value)).collect();
        assert_eq!(seen, vec![(0, 0), (100, 1)]);
        assert_eq!(done_at, 200);
    }

    #[test]
    fn send_byte_drives_idle_start_data_stop() {
        let sim = Simulator::new();
        let rx = sim.signal("rx", 1, 1).unwrap();
        let events = sim.subscribe(&[rx.id()]);

        let sim2 = sim.clone();
        let done_at = sim
            .run_until(async move {
                send_byte(&sim2, &rx, 0x5A, T).await;
                sim2.now()
            })
            .unwrap();
        assert_eq!(done_at, T + Frame::duration(T));

        // 0x5A LSB first: 0 1 0 1 1 0 1 0, framed by start 0 and stop 1.
        let seen: Vec<_> = events.try_iter().map(|e| (e.time / T, e.value)).collect();
        assert_eq!(
            seen,
            vec![(1, 0), (3, 1), (4, 0), (5, 1), (7, 0), (8, 1), (9, 0), (10, 1)]
        );
    }

    #[test]
    fn boundary_bytes_keep_frame_levels() {
        for (byte, expected) in [
            (0x00u8, vec![(1, 0), (10, 1)]),
            (0xFF, vec![(1, 0), (2, 1)]),
            (0x01, vec![(1, 0), (2, 1), (3, 0), (10, 1)]),
        ] {
            let sim = Simulator::new();
            let rx = sim.signal("rx", 1, 1).unwrap();
            let events = sim.subscribe(&[rx.id()]);

            let sim2 = sim.clone();
            sim.run_until(async move { send_byte(&sim2, &rx, byte, T).await }).unwrap();

            let seen: Vec<_> = events.try_iter().map(|e| (e.time / T, e.value)).collect();
            assert_eq!(seen, expected, "byte 0x{byte:02X}");
            assert_eq!(sim.now(), 11 * T);
        }
    }
}
