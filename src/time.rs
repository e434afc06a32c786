//! Wall and monotonic clocks, sleeping.

use std::time::Duration;

use crate::constants::{FILETIME_EPOCH_OFFSET, FILETIME_TICKS_PER_SEC, MICROS_PER_SEC};
use crate::sys;
use crate::types::TimeSpec;

/// Current time relative to the UNIX epoch
pub fn now_wall() -> TimeSpec {
    sys::now_wall()
}

/// Current value of a clock that never moves backward within the process
pub fn now_monotonic() -> TimeSpec {
    sys::now_monotonic()
}

/// Compute `a - b`, carrying between nanoseconds and seconds
///
/// The result is never negative when `a >= b`.
pub fn time_diff(a: TimeSpec, b: TimeSpec) -> TimeSpec {
    a - b
}

/// Suspend the calling thread for at least `micros` microseconds
///
/// Signals do not cut the sleep short; the remainder is slept off.
pub fn sleep_us(micros: u64) {
    if micros == 0 {
        return;
    }
    sys::sleep_us(micros)
}

pub fn sleep_ms(millis: u64) {
    sleep_us(millis.saturating_mul(1_000))
}

pub fn sleep_secs(secs: u64) {
    sleep_us(secs.saturating_mul(MICROS_PER_SEC))
}

/// Sleep for a `Duration`, rounded up to whole microseconds
pub fn sleep(d: Duration) {
    let micros = d.as_micros() + u128::from(d.subsec_nanos() % 1_000 != 0);
    sleep_us(micros.min(u64::MAX as u128) as u64)
}

/// Convert a count of 100ns ticks since 1601-01-01 to UNIX time
///
/// Values before the UNIX epoch produce negative seconds.
pub fn filetime_to_timespec(ticks: u64) -> TimeSpec {
    let rel = ticks as i128 - FILETIME_EPOCH_OFFSET as i128;
    let per_sec = FILETIME_TICKS_PER_SEC as i128;
    let seconds = rel.div_euclid(per_sec);
    let rem = rel.rem_euclid(per_sec);
    TimeSpec::new(seconds as i64, (rem * 100) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filetime_epoch() {
        assert_eq!(filetime_to_timespec(FILETIME_EPOCH_OFFSET), TimeSpec::ZERO);
        assert_eq!(
            filetime_to_timespec(FILETIME_EPOCH_OFFSET + 15_000_001),
            TimeSpec::new(1, 500_000_100)
        );
        let before = filetime_to_timespec(FILETIME_EPOCH_OFFSET - 1);
        assert_eq!(before, TimeSpec::new(-1, 999_999_900));
    }

    #[test]
    fn test_time_diff_carries() {
        let a = TimeSpec::new(10, 100);
        let b = TimeSpec::new(8, 900);
        assert_eq!(time_diff(a, b), TimeSpec::new(1, 999_999_200));
        assert_eq!(time_diff(a, a), TimeSpec::ZERO);
        assert!(time_diff(b, a).is_negative());
    }
}
