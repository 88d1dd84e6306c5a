use crate::backoff::{BackoffStrategy, DefaultBackoff};
use std::fmt;
use std::sync::Arc;

/// Engine configuration.
#[derive(Clone)]
pub struct Config {
    /// Server worker threads racing for per-key critical sections.
    pub workers: usize,
    /// Probability that the network delivers a request twice.
    pub duplicate_probability: f64,
    /// Policy between redeliveries of requests blocked by a foreign lock, and
    /// between retries of blocked snapshot reads. `Abort` ends the wait.
    pub backoff: Arc<dyn BackoffStrategy>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: 4,
            duplicate_probability: 0.0,
            backoff: Arc::new(DefaultBackoff::default()),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("workers", &self.workers)
            .field("duplicate_probability", &self.duplicate_probability)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// At least one worker is always started.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Clamped to `[0.0, 1.0]`; NaN disables duplication.
    #[must_use]
    pub fn with_duplicate_probability(mut self, probability: f64) -> Self {
        self.duplicate_probability = if probability.is_nan() {
            0.0
        } else {
            probability.clamp(0.0, 1.0)
        };
        self
    }

    /// Re-apply the builder bounds to a config assembled field by field.
    #[must_use]
    pub(crate) fn normalized(self) -> Self {
        let (workers, probability) = (self.workers, self.duplicate_probability);
        self.with_workers(workers)
            .with_duplicate_probability(probability)
    }

    #[must_use]
    pub fn with_backoff(mut self, backoff: Arc<dyn BackoffStrategy>) -> Self {
        self.backoff = backoff;
        self
    }
}
