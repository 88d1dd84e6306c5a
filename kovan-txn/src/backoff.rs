use std::time::Duration;

/// Action to take after a backoff attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffAction {
    /// Retry the operation
    Retry,
    /// Yield the current thread and retry
    Yield,
    /// Give up
    Abort,
}

/// Pluggable backoff strategy for work blocked behind a foreign lock:
/// redelivery of `lock_key`/`prewrite_optimistic` requests and snapshot reads.
pub trait BackoffStrategy: Send + Sync {
    /// Determine the action to take for a given attempt number (0-indexed)
    fn backoff(&self, attempt: u32) -> BackoffAction;
}

/// Default backoff: yield for the first 3 attempts, then sleep with an
/// exponentially growing (capped) delay, then give up at `max_attempts`.
#[derive(Debug, Clone, Copy)]
pub struct DefaultBackoff {
    max_attempts: u32,
}

impl DefaultBackoff {
    const YIELD_ATTEMPTS: u32 = 3;
    const MAX_SHIFT: u32 = 6;

    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }
}

impl Default for DefaultBackoff {
    fn default() -> Self {
        Self::new(64)
    }
}

impl BackoffStrategy for DefaultBackoff {
    fn backoff(&self, attempt: u32) -> BackoffAction {
        if attempt >= self.max_attempts {
            return BackoffAction::Abort;
        }
        if attempt < Self::YIELD_ATTEMPTS {
            return BackoffAction::Yield;
        }
        let shift = (attempt - Self::YIELD_ATTEMPTS).min(Self::MAX_SHIFT);
        std::thread::sleep(Duration::from_micros(50 << shift));
        BackoffAction::Retry
    }
}

/// Never waits: every attempt is retried immediately, up to `max_attempts`.
#[derive(Debug, Clone, Copy)]
pub struct NoBackoff {
    pub max_attempts: u32,
}

impl BackoffStrategy for NoBackoff {
    fn backoff(&self, attempt: u32) -> BackoffAction {
        if attempt >= self.max_attempts {
            BackoffAction::Abort
        } else {
            BackoffAction::Retry
        }
    }
}
