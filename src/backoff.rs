//! Backoff schedules for retrying store calls.
//!
//! Attempt semantics: `delay(n)` is the pause taken after the n-th failed
//! attempt, so `delay(1)` is the base delay and `delay(0)` is always zero.
//! Exponential growth multiplies the base by `multiplier` per retry and is
//! capped; all arithmetic saturates at [`MAX_BACKOFF`] instead of wrapping.

use std::fmt;
use std::time::Duration;

/// Ceiling applied when a computed delay would overflow (1 hour).
pub const MAX_BACKOFF: Duration = Duration::from_secs(60 * 60);

/// Errors from backoff configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackoffError {
    /// `with_max`/`with_multiplier` only apply to exponential schedules.
    #[error("constant backoff does not take a {0}")]
    NotExponential(&'static str),
    /// The multiplier must be at least 1.
    #[error("multiplier must be >= 1 (got {0})")]
    InvalidMultiplier(u32),
    /// The cap must be positive and at least the base delay.
    #[error("max delay {max:?} must be positive and >= base {base:?}")]
    InvalidMax {
        /// Configured base delay.
        base: Duration,
        /// Rejected cap.
        max: Duration,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Schedule {
    Constant { delay: Duration },
    Exponential { base: Duration, multiplier: u32, max: Option<Duration> },
}

/// A retry delay schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    schedule: Schedule,
}

impl Backoff {
    /// Same delay for every retry. Mostly useful in tests.
    pub fn constant(delay: Duration) -> Self {
        Self { schedule: Schedule::Constant { delay } }
    }

    /// Doubling delay starting at `base`, uncapped until [`MAX_BACKOFF`].
    pub fn exponential(base: Duration) -> Self {
        Self { schedule: Schedule::Exponential { base, multiplier: 2, max: None } }
    }

    /// Override the growth factor of an exponential schedule.
    pub fn with_multiplier(mut self, multiplier: u32) -> Result<Self, BackoffError> {
        match &mut self.schedule {
            Schedule::Exponential { multiplier: m, .. } => {
                if multiplier == 0 {
                    return Err(BackoffError::InvalidMultiplier(multiplier));
                }
                *m = multiplier;
                Ok(self)
            }
            Schedule::Constant { .. } => Err(BackoffError::NotExponential("multiplier")),
        }
    }

    /// Cap the delay of an exponential schedule.
    pub fn with_max(mut self, max: Duration) -> Result<Self, BackoffError> {
        match &mut self.schedule {
            Schedule::Exponential { base, max: existing, .. } => {
                if max.is_zero() || max < *base {
                    return Err(BackoffError::InvalidMax { base: *base, max });
                }
                *existing = Some(max);
                Ok(self)
            }
            Schedule::Constant { .. } => Err(BackoffError::NotExponential("max delay")),
        }
    }

    /// Delay to take after `attempt` failed attempts (0 means no delay).
    pub fn delay(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        match &self.schedule {
            Schedule::Constant { delay } => *delay,
            Schedule::Exponential { base, multiplier, max } => {
                let exponent = attempt.saturating_sub(1).min(u32::MAX as usize) as u32;
                let factor = u128::from(*multiplier).saturating_pow(exponent);
                let nanos = base.as_nanos().saturating_mul(factor);
                let grown = Duration::from_nanos(nanos.min(MAX_BACKOFF.as_nanos()) as u64);
                let capped = max.map(|m| grown.min(m)).unwrap_or(grown);
                capped.min(MAX_BACKOFF)
            }
        }
    }
}

impl fmt::Display for Backoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schedule {
            Schedule::Constant { delay } => write!(f, "constant({:?})", delay),
            Schedule::Exponential { base, multiplier, max } => {
                write!(f, "exponential(base={:?}, x{}, max={:?})", base, multiplier, max)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_zero_is_free() {
        assert_eq!(Backoff::constant(Duration::from_secs(1)).delay(0), Duration::ZERO);
        assert_eq!(Backoff::exponential(Duration::from_secs(1)).delay(0), Duration::ZERO);
    }

    #[test]
    fn constant_is_flat() {
        let b = Backoff::constant(Duration::from_millis(250));
        assert_eq!(b.delay(1), Duration::from_millis(250));
        assert_eq!(b.delay(7), Duration::from_millis(250));
    }

    #[test]
    fn exponential_doubles_by_default() {
        let b = Backoff::exponential(Duration::from_millis(100));
        assert_eq!(b.delay(1), Duration::from_millis(100));
        assert_eq!(b.delay(2), Duration::from_millis(200));
        assert_eq!(b.delay(3), Duration::from_millis(400));
        assert_eq!(b.delay(4), Duration::from_millis(800));
    }

    #[test]
    fn multiplier_overrides_growth() {
        let b = Backoff::exponential(Duration::from_millis(100)).with_multiplier(3).unwrap();
        assert_eq!(b.delay(1), Duration::from_millis(100));
        assert_eq!(b.delay(2), Duration::from_millis(300));
        assert_eq!(b.delay(3), Duration::from_millis(900));
    }

    #[test]
    fn cap_holds() {
        let b = Backoff::exponential(Duration::from_secs(1)).with_max(Duration::from_secs(30)).unwrap();
        assert_eq!(b.delay(5), Duration::from_secs(16));
        assert_eq!(b.delay(6), Duration::from_secs(30));
        assert_eq!(b.delay(60), Duration::from_secs(30));
    }

    #[test]
    fn huge_attempts_saturate() {
        let b = Backoff::exponential(Duration::from_secs(1));
        assert_eq!(b.delay(1_000_000), MAX_BACKOFF);
        assert_eq!(b.delay((u32::MAX as usize) + 5), MAX_BACKOFF);
    }

    #[test]
    fn invalid_configs_are_rejected() {
        assert!(matches!(
            Backoff::constant(Duration::from_secs(1)).with_max(Duration::from_secs(2)),
            Err(BackoffError::NotExponential(_))
        ));
        assert!(matches!(
            Backoff::exponential(Duration::from_secs(10)).with_max(Duration::from_secs(1)),
            Err(BackoffError::InvalidMax { .. })
        ));
        assert!(matches!(
            Backoff::exponential(Duration::from_secs(1)).with_multiplier(0),
            Err(BackoffError::InvalidMultiplier(0))
        ));
    }
}
