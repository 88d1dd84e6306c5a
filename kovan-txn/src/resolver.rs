//! Stale lock resolution.
//!
//! Whenever an accessor is blocked by a lock it did not create, the resolver
//! turns that lock into a `cleanup` request naming the lock's primary key.
//! The server's cleanup action then decides the transaction's fate from the
//! primary key alone and fans the decision out to the remaining locks.

use crate::lock::LockInfo;
use crate::message::Request;
use dashmap::DashSet;
use tracing::debug;

/// Issues `cleanup` requests for foreign locks, at most one in flight per transaction.
#[derive(Debug, Default)]
pub struct StaleLockResolver {
    in_flight: DashSet<(String, u64)>,
}

impl StaleLockResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a lock that blocks progress.
    ///
    /// Returns the `cleanup` request to send, or `None` when a cleanup for the
    /// same transaction has been issued and not yet handled.
    pub fn on_blocked(&self, lock: &LockInfo) -> Option<Request> {
        if !self
            .in_flight
            .insert((lock.primary_key.clone(), lock.start_ts))
        {
            return None;
        }
        debug!(
            primary = %lock.primary_key,
            start_ts = lock.start_ts,
            kind = ?lock.kind,
            "stale lock: issuing cleanup"
        );
        Some(Request::Cleanup {
            start_ts: lock.start_ts,
            primary: lock.primary_key.clone(),
        })
    }

    /// Mark the cleanup for `(primary, start_ts)` as handled.
    pub fn finished(&self, primary: &str, start_ts: u64) {
        self.in_flight.remove(&(primary.to_string(), start_ts));
    }

    /// Number of cleanups issued and not yet handled.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}
