//! Conflict retry policy: pure decision logic for the checkout loop.

use std::time::Duration;

/// How one checkout attempt ended, as far as retry is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The conditional commit lost a version race.
    Conflict,
    /// Storage hiccup (retryable the same way as a conflict).
    TransientStorage,
    /// The request itself is invalid. Re-snapshotting cannot change the
    /// caller's request, so these are never retried.
    Validation,
}

/// Decision for one failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry(Duration),
    GiveUp,
}

/// Bounded exponential backoff with per-caller jitter.
///
/// Pure: `decide` is a function of its arguments only. The `seed` argument
/// decorrelates competing callers (the coordinator derives it from the
/// per-call order id) so losers of the same race do not retry in lockstep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConflictRetryPolicy {
    /// Maximum number of attempts (first try included).
    pub max_attempts: u32,
    /// Base delay before the second attempt.
    pub base_delay: Duration,
    /// Cap on any single delay.
    pub max_delay: Duration,
    /// Jitter factor (0.0-1.0), applied as a fraction of the computed delay.
    pub jitter: f64,
}

impl Default for ConflictRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(25),
            max_delay: Duration::from_secs(1),
            jitter: 0.5,
        }
    }
}

impl ConflictRetryPolicy {
    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Decide whether attempt `attempt` (1-indexed) that ended in `outcome`
    /// should be retried, and after what delay.
    pub fn decide(&self, attempt: u32, outcome: AttemptOutcome, seed: u64) -> RetryDecision {
        if outcome == AttemptOutcome::Validation {
            return RetryDecision::GiveUp;
        }
        if attempt >= self.max_attempts {
            return RetryDecision::GiveUp;
        }
        RetryDecision::Retry(self.delay_for_attempt(attempt, seed))
    }

    /// Backoff delay after attempt `attempt` (1-indexed): exponential in the
    /// attempt number, capped, plus seed-dependent jitter.
    pub fn delay_for_attempt(&self, attempt: u32, seed: u64) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64;
        let max_ms = self.max_delay.as_millis() as f64;

        let exp = 2_f64.powi(attempt.saturating_sub(1).min(16) as i32);
        let delay_ms = (base_ms * exp).min(max_ms);

        // Deterministic jitter: fold seed and attempt into [0, 1).
        let jitter_range = delay_ms * self.jitter;
        let jitter = if jitter_range > 0.0 {
            let mixed = seed
                .wrapping_mul(6364136223846793005)
                .wrapping_add(attempt as u64 * 1442695040888963407);
            let pseudo_random = (mixed % 1000) as f64 / 1000.0;
            jitter_range * (pseudo_random - 0.5) * 2.0
        } else {
            0.0
        };

        Duration::from_millis((delay_ms + jitter).max(0.0) as u64)
    }
}
