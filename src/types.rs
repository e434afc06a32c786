use std::cmp::Ordering;
use std::ops::Sub;
use std::time::Duration;

use crate::constants::{NANOS_PER_MICRO, NANOS_PER_SEC};

/// Seconds and nanoseconds, `0 <= nanos < 1_000_000_000`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TimeSpec {
    pub seconds: i64,
    pub nanos: u32,
}

impl TimeSpec {
    pub const ZERO: TimeSpec = TimeSpec {
        seconds: 0,
        nanos: 0,
    };
    pub const MAX: TimeSpec = TimeSpec {
        seconds: i64::MAX,
        nanos: NANOS_PER_SEC - 1,
    };
    pub const MIN: TimeSpec = TimeSpec {
        seconds: i64::MIN,
        nanos: 0,
    };

    /// Build a normalized value; excess nanoseconds carry into seconds
    ///
    /// Saturates at `TimeSpec::MAX`.
    pub fn new(seconds: i64, nanos: u32) -> Self {
        match seconds.checked_add((nanos / NANOS_PER_SEC) as i64) {
            Some(seconds) => TimeSpec {
                seconds,
                nanos: nanos % NANOS_PER_SEC,
            },
            None => TimeSpec::MAX,
        }
    }

    /// Clamps to `[MIN, MAX]`
    fn from_nanos_saturating(total: i128) -> Self {
        let per_sec = NANOS_PER_SEC as i128;
        let seconds = total.div_euclid(per_sec);
        if seconds > i64::MAX as i128 {
            TimeSpec::MAX
        } else if seconds < i64::MIN as i128 {
            TimeSpec::MIN
        } else {
            TimeSpec {
                seconds: seconds as i64,
                nanos: total.rem_euclid(per_sec) as u32,
            }
        }
    }

    pub fn from_duration(d: Duration) -> Self {
        TimeSpec {
            seconds: d.as_secs() as i64,
            nanos: d.subsec_nanos(),
        }
    }

    /// Negative values clamp to zero
    pub fn to_duration(self) -> Duration {
        if self.seconds < 0 {
            return Duration::ZERO;
        }
        Duration::new(self.seconds as u64, self.nanos)
    }

    pub fn as_nanos(self) -> i128 {
        self.seconds as i128 * NANOS_PER_SEC as i128 + self.nanos as i128
    }

    /// Rounds toward negative infinity and saturates at the `i64` bounds
    pub fn as_micros(self) -> i64 {
        let micros = self.as_nanos().div_euclid(NANOS_PER_MICRO as i128);
        micros.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    pub fn is_negative(self) -> bool {
        self.seconds < 0
    }
}

impl Ord for TimeSpec {
    fn cmp(&self, other: &Self) -> Ordering {
        self.seconds
            .cmp(&other.seconds)
            .then(self.nanos.cmp(&other.nanos))
    }
}

impl PartialOrd for TimeSpec {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Sub for TimeSpec {
    type Output = TimeSpec;

    /// Saturating
    fn sub(self, rhs: TimeSpec) -> TimeSpec {
        TimeSpec::from_nanos_saturating(self.as_nanos() - rhs.as_nanos())
    }
}

/// Identity of a filesystem object while a handle to it is open
///
/// POSIX fills `{device, inode}`; Windows fills the volume serial number
/// and the 64-bit file index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId {
    pub volume: u64,
    pub index: u64,
}

impl FileId {
    pub fn new(volume: u64, index: u64) -> Self {
        FileId { volume, index }
    }

    /// Windows layout: serial number plus high/low halves of the file index
    pub fn from_windows_parts(volume_serial: u32, index_high: u32, index_low: u32) -> Self {
        FileId {
            volume: volume_serial as u64,
            index: ((index_high as u64) << 32) | index_low as u64,
        }
    }

    pub fn as_u128(&self) -> u128 {
        ((self.volume as u128) << 64) | self.index as u128
    }

    /// Fixed 16-byte big-endian form
    pub fn to_bytes(&self) -> [u8; 16] {
        self.as_u128().to_be_bytes()
    }
}

/// Byte counts for the filesystem containing a path
///
/// `available <= free <= total` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FsSizes {
    /// Bytes usable by an unprivileged caller
    pub available: u64,
    /// Free bytes, including any reserved for privileged users
    pub free: u64,
    pub total: u64,
}

impl FsSizes {
    /// Build from raw host numbers, clamping to keep the ordering
    pub fn from_host(available: u64, free: u64, total: u64) -> Self {
        let free = free.min(total);
        FsSizes {
            available: available.min(free),
            free,
            total,
        }
    }
}

/// Lifecycle state of a `FileHandle`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HandleState {
    Open = 0,
    Closed = 1,
    /// A fatal I/O error was observed; every operation now fails
    Poisoned = 2,
}

impl HandleState {
    pub(crate) fn from_u8(v: u8) -> HandleState {
        match v {
            0 => HandleState::Open,
            1 => HandleState::Closed,
            _ => HandleState::Poisoned,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_borrows_a_second() {
        let a = TimeSpec::new(5, 100);
        let b = TimeSpec::new(3, 900_000_000);
        assert_eq!(a - b, TimeSpec::new(1, 100_000_100));
        assert_eq!(b - a, TimeSpec::new(-2, 899_999_900));
        assert!((b - a).is_negative());
    }

    #[test]
    fn test_new_carries_nanos() {
        assert_eq!(TimeSpec::new(1, 2_500_000_000), TimeSpec::new(3, 500_000_000));
        assert_eq!(TimeSpec::new(i64::MAX, 1_000_000_000), TimeSpec::MAX);
    }

    #[test]
    fn test_extreme_values_saturate() {
        let far_past = TimeSpec::new(i64::MIN, 0);
        let far_future = TimeSpec::new(i64::MAX, 0);
        assert_eq!(far_future - far_past, TimeSpec::MAX);
        assert_eq!(far_past - far_future, TimeSpec::MIN);
        assert_eq!(TimeSpec::MIN - TimeSpec::new(0, 1), TimeSpec::MIN);

        assert_eq!(far_future.as_micros(), i64::MAX);
        assert_eq!(far_past.as_micros(), i64::MIN);
        assert_eq!(TimeSpec::new(-1, 1).as_micros(), -1_000_000);
        assert_eq!(TimeSpec::new(2, 1_500).as_micros(), 2_000_001);
    }
}
