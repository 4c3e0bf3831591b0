use std::time::{SystemTime, UNIX_EPOCH};

/// Shared custom epoch: Thursday, January 1, 2026 00:00:00 UTC.
///
/// Timestamps packed into 64-bit identifiers are deltas from this instant.
pub const GENERATOR_EPOCH_MS: u64 = 1_767_225_600_000;

/// The shared epoch expressed in Sonyflake's 10-millisecond tick unit.
pub const SONYFLAKE_EPOCH_TICKS: u64 = GENERATOR_EPOCH_MS / 10;

/// A source of wall-clock time in milliseconds since the Unix epoch.
///
/// This abstraction lets production code read the system clock while tests
/// inject fixed, stepping or regressing clocks.
///
/// # Example
///
/// ```
/// use idmint::TimeSource;
///
/// struct FixedTime;
/// impl TimeSource for FixedTime {
///     fn current_millis(&self) -> u64 {
///         1234
///     }
/// }
///
/// assert_eq!(FixedTime.current_millis(), 1234);
/// ```
pub trait TimeSource {
    /// Returns the current wall-clock time in milliseconds since 1970-01-01.
    fn current_millis(&self) -> u64;
}

/// The production clock: a direct `SystemTime` read.
///
/// Unlike a monotonic ticker, this source can observe NTP steps and manual
/// clock adjustments. That is intentional: the time-sharded strategies must
/// detect regression and refuse to emit rather than silently reuse a tick.
#[derive(Default, Clone, Copy, Debug)]
pub struct WallClock;

impl TimeSource for WallClock {
    fn current_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wall_clock_is_past_the_generator_epoch() {
        assert!(WallClock.current_millis() > GENERATOR_EPOCH_MS);
    }

    #[test]
    fn sonyflake_epoch_is_in_ten_milli_ticks() {
        assert_eq!(SONYFLAKE_EPOCH_TICKS * 10, GENERATOR_EPOCH_MS);
    }
}
