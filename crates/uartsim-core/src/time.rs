/// Simulated time in nanoseconds.
pub type SimTime = u64;

pub const NS_PER_SEC: u64 = 1_000_000_000;

/// Period of a `rate_hz` signal, rounded to the nearest nanosecond.
pub fn period_ns(rate_hz: u32) -> Option<SimTime> {
    if rate_hz == 0 {
        return None;
    }
    let rate = u64::from(rate_hz);
    Some((NS_PER_SEC + rate / 2) / rate)
}
