use std::sync::atomic::{AtomicU64, Ordering};

/// Timestamp Oracle trait - can be implemented by consensus algorithms
/// (Raft, OmniPaxos, Paxos) or by a local atomic counter.
///
/// Timestamps are strictly positive; `0` means "unset".
pub trait TimestampOracle: Send + Sync {
    /// Get a strictly increasing timestamp.
    fn get_timestamp(&self) -> u64;

    /// Advance the max-seen high-water mark to at least `ts`.
    fn update_max_ts(&self, ts: u64);

    /// Highest timestamp observed through [`TimestampOracle::update_max_ts`].
    fn max_ts(&self) -> u64;
}

/// Local timestamp oracle using atomic counters.
/// Suitable for single-node or testing scenarios.
#[derive(Debug, Default)]
pub struct LocalTimestampOracle {
    counter: AtomicU64,
    max_ts: AtomicU64,
}

impl LocalTimestampOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_initial(initial: u64) -> Self {
        Self {
            counter: AtomicU64::new(initial),
            max_ts: AtomicU64::new(0),
        }
    }
}

impl TimestampOracle for LocalTimestampOracle {
    fn get_timestamp(&self) -> u64 {
        // Fetch-add ensures strictly increasing timestamps
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn update_max_ts(&self, ts: u64) {
        self.max_ts.fetch_max(ts, Ordering::SeqCst);
    }

    fn max_ts(&self) -> u64 {
        self.max_ts.load(Ordering::SeqCst)
    }
}

/// Mock for testing - you can move the counter forward manually.
#[derive(Debug, Default)]
pub struct MockTimestampOracle {
    counter: AtomicU64,
    max_ts: AtomicU64,
}

impl MockTimestampOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Jump the counter so the next issued timestamp is `ts + 1`.
    ///
    /// Moving backwards is ignored, the oracle never reissues a timestamp.
    pub fn set(&self, ts: u64) {
        self.counter.fetch_max(ts, Ordering::SeqCst);
    }
}

impl TimestampOracle for MockTimestampOracle {
    fn get_timestamp(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn update_max_ts(&self, ts: u64) {
        self.max_ts.fetch_max(ts, Ordering::SeqCst);
    }

    fn max_ts(&self) -> u64 {
        self.max_ts.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_local_oracle_strictly_increasing() {
        let oracle = LocalTimestampOracle::new();
        let mut last = 0;
        for _ in 0..100 {
            let ts = oracle.get_timestamp();
            assert!(ts > last);
            last = ts;
        }
    }

    #[test]
    fn test_local_oracle_unique_across_threads() {
        let oracle = Arc::new(LocalTimestampOracle::with_initial(10));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let oracle = oracle.clone();
                thread::spawn(move || (0..250).map(|_| oracle.get_timestamp()).collect::<Vec<_>>())
            })
            .collect();

        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 1000);
        assert!(all[0] > 10);
    }

    #[test]
    fn test_max_ts_never_regresses() {
        let oracle = LocalTimestampOracle::new();
        oracle.update_max_ts(7);
        oracle.update_max_ts(3);
        assert_eq!(oracle.max_ts(), 7);
        oracle.update_max_ts(9);
        assert_eq!(oracle.max_ts(), 9);
    }

    #[test]
    fn test_mock_oracle_set() {
        let oracle = MockTimestampOracle::new();
        oracle.set(41);
        assert_eq!(oracle.get_timestamp(), 42);
        // Going backwards is ignored.
        oracle.set(5);
        assert_eq!(oracle.get_timestamp(), 43);
    }
}
