use crate::config::ClientSettings;
use std::time::Duration;

/// Default number of attempts per request
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay between attempts
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(500);

/// Retry policy for the single transient failure class (HTTP 502)
///
/// Attempt `n` (zero based) that returns 502 is followed by a sleep of
/// `backoff_base * 2^n` before the next attempt. No sleep follows the final
/// attempt; its response is handed back to the caller as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_retries: u32,
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base: DEFAULT_BACKOFF_BASE,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_base: Duration) -> Self {
        Self {
            max_retries: max_retries.max(1),
            backoff_base,
        }
    }

    /// Delay to wait after the given failed attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Total time slept when the first `failures` attempts all return 502
    /// and a later attempt succeeds
    ///
    /// When every attempt returns 502 the last one is not followed by a
    /// sleep, so an exhausted request sleeps `total_delay(max_retries - 1)`.
    /// With the defaults that is 0.5 s then 1 s, not 0.5 s, 1 s and 2 s.
    pub fn total_delay(&self, failures: u32) -> Duration {
        (0..failures).map(|attempt| self.delay_for(attempt)).sum()
    }
}

impl From<&ClientSettings> for RetryPolicy {
    fn from(settings: &ClientSettings) -> Self {
        Self::new(settings.max_retries, settings.backoff_base)
    }
}
