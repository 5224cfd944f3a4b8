// Backoff policy shared by batch polling and the dispatcher's error pauses
use std::time::Duration;
use tracing::debug;

/// Exponential backoff policy
///
/// delay(n) = min(initial * multiplier ^ n, max_delay)
///
/// `max_attempts` bounds consecutive failed attempts where the caller counts
/// them (poll errors, dispatcher errors); `None` means unbounded.
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    pub initial: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    pub max_attempts: Option<u32>,
}

impl Backoff {
    pub fn new(initial: Duration, multiplier: f64, max_delay: Duration) -> Self {
        Self {
            initial,
            multiplier,
            max_delay,
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Batch status polling: 3s, x1.75, capped at 20s
    pub fn polling() -> Self {
        Self::new(Duration::from_secs(3), 1.75, Duration::from_secs(20)).with_max_attempts(5)
    }

    /// Delay before attempt `attempt` (zero-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(attempt.min(64) as i32);
        let secs = (self.initial.as_secs_f64() * factor).min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(secs.max(0.0))
    }

    /// Whether another attempt is allowed after `failures` consecutive failures
    pub fn allows(&self, failures: u32) -> bool {
        match self.max_attempts {
            Some(max) => failures < max,
            None => true,
        }
    }

    /// Iterator-style state for one backoff sequence
    pub fn start(&self) -> BackoffState<'_> {
        BackoffState {
            policy: self,
            attempt: 0,
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::polling()
    }
}

/// Running position inside a backoff sequence
#[derive(Debug)]
pub struct BackoffState<'a> {
    policy: &'a Backoff,
    attempt: u32,
}

impl BackoffState<'_> {
    /// Next delay, advancing the sequence
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.policy.delay(self.attempt);
        debug!(attempt = self.attempt, delay_ms = delay.as_millis() as u64, "Backoff step");
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}
