use rand::Rng;
use std::time::Duration;

/// Trait for defining reconnection strategies
///
/// Implement this trait to control how the session behaves when the
/// transport drops. Attempts are 0-indexed.
pub trait ReconnectionStrategy: Send + Sync {
    /// Delay before the next attempt, without jitter
    ///
    /// # Returns
    /// * `Some(duration)` - Wait this long before reconnecting
    /// * `None` - Stop reconnecting
    fn base_delay(&self, attempt: u32) -> Option<Duration>;

    /// Random spread added on top of the base delay
    fn jitter(&self) -> Duration {
        Duration::ZERO
    }

    /// Check if we should continue reconnecting
    fn should_reconnect(&self, attempt: u32) -> bool;

    /// Maximum number of attempts, if bounded
    fn max_attempts(&self) -> Option<u32>;

    /// Base delay plus a jitter term drawn uniformly from `[0, jitter)`
    fn next_delay_with<G: Rng>(&self, attempt: u32, rng: &mut G) -> Option<Duration>
    where
        Self: Sized,
    {
        let base = self.base_delay(attempt)?;
        let jitter_ms = self.jitter().as_millis() as u64;
        if jitter_ms == 0 {
            return Some(base);
        }
        Some(base + Duration::from_millis(rng.gen_range(0..jitter_ms)))
    }

    /// Jittered delay using the thread-local generator
    fn next_delay(&self, attempt: u32) -> Option<Duration>
    where
        Self: Sized,
    {
        self.next_delay_with(attempt, &mut rand::thread_rng())
    }
}

/// Exponential backoff reconnection strategy
///
/// Delays between reconnection attempts grow exponentially:
/// initial_delay * 2^attempt, capped at max_delay, plus up to `jitter`
/// of random spread so that clients dropped together do not reconnect together.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    max_delay: Duration,
    jitter: Duration,
    max_attempts: Option<u32>,
}

impl ExponentialBackoff {
    /// Create a new exponential backoff strategy
    ///
    /// # Arguments
    /// * `initial_delay` - The initial delay before first reconnect
    /// * `max_delay` - The maximum delay between reconnects (before jitter)
    /// * `max_attempts` - Maximum number of attempts (None = unlimited)
    pub fn new(initial_delay: Duration, max_delay: Duration, max_attempts: Option<u32>) -> Self {
        Self {
            initial_delay,
            max_delay,
            jitter: Duration::ZERO,
            max_attempts,
        }
    }

    /// Add a random spread in `[0, jitter)` to every delay
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }
}

impl ReconnectionStrategy for ExponentialBackoff {
    fn base_delay(&self, attempt: u32) -> Option<Duration> {
        if !self.should_reconnect(attempt) {
            return None;
        }

        // 2^attempt saturates long before u64 overflow matters
        let factor = 2u64.checked_pow(attempt).unwrap_or(u64::MAX);
        let delay = (self.initial_delay.as_millis() as u64).saturating_mul(factor);
        Some(Duration::from_millis(
            delay.min(self.max_delay.as_millis() as u64),
        ))
    }

    fn jitter(&self) -> Duration {
        self.jitter
    }

    fn should_reconnect(&self, attempt: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempt < max)
    }

    fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }
}
