use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::Utc;

/// Source of span and event timestamps (nanoseconds since the Unix epoch)
pub trait TimestampGenerator: Send + Sync + fmt::Debug {
    fn now(&self) -> u64;
}

/// Wall-clock timestamps
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl TimestampGenerator for SystemClock {
    fn now(&self) -> u64 {
        Utc::now()
            .timestamp_nanos_opt()
            .and_then(|nanos| u64::try_from(nanos).ok())
            .unwrap_or_default()
    }
}

/// Convert nanoseconds since the Unix epoch to a `SystemTime`
pub fn to_system_time(nanos: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_nanos(nanos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_monotonic_enough() {
        let clock = SystemClock;
        let first = clock.now();
        let second = clock.now();
        assert!(first > 1_600_000_000_000_000_000);
        assert!(second >= first);
    }

    #[test]
    fn test_to_system_time() {
        assert_eq!(to_system_time(0), UNIX_EPOCH);
        assert_eq!(
            to_system_time(1_500_000_000),
            UNIX_EPOCH + Duration::from_millis(1500)
        );
    }
}
