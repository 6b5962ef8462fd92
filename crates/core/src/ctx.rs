//! Per-call context: deadline / cancellation budget for blocking operations.
//!
//! Store operations are the only places a checkout call may block, so they
//! all accept a `CallCtx`. An expired context makes an operation fail fast
//! without applying any write.

use std::time::{Duration, Instant};

/// Caller-supplied execution budget for one logical call.
///
/// `CallCtx::background()` never expires. `CallCtx::with_timeout` expires at
/// a fixed instant; every blocking operation checks it before doing work, so
/// cancellation can never leave a partial write behind.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallCtx {
    deadline: Option<Instant>,
}

impl CallCtx {
    /// A context with no deadline.
    pub fn background() -> Self {
        Self { deadline: None }
    }

    /// A context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_expired(&self) -> bool {
        match self.deadline {
            Some(d) => Instant::now() >= d,
            None => false,
        }
    }

    /// Time left before the deadline, if one is set.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|d| d.saturating_duration_since(Instant::now()))
    }
}
