//! Per-key multi-version state: one optional lock, the write column and the
//! data-version markers of every key.
//!
//! Each key owns an independent [`KeyRecord`] behind a `parking_lot::Mutex`.
//! Every public operation on [`KeyStore`] takes exactly one of those mutexes
//! for its whole read-then-write sequence, so a key's history is linearizable
//! while operations on different keys run fully in parallel.

use crate::lock::{LockInfo, LockKind};
use crate::timestamp_oracle::TimestampOracle;
use crate::write::WriteRecord;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::trace;

/// State of a single key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyRecord {
    lock: Option<LockInfo>,
    /// Write column keyed by `start_ts`, which makes it unique per transaction.
    writes: BTreeMap<u64, WriteRecord>,
    /// DataVersion markers (start_ts of every prewritten value).
    data: BTreeSet<u64>,
}

impl KeyRecord {
    pub fn lock(&self) -> Option<&LockInfo> {
        self.lock.as_ref()
    }

    /// Write records ordered by `ts`.
    pub fn write_records(&self) -> Vec<WriteRecord> {
        let mut records: Vec<_> = self.writes.values().copied().collect();
        records.sort_by_key(|w| w.ts);
        records
    }

    pub fn write_for(&self, start_ts: u64) -> Option<&WriteRecord> {
        self.writes.get(&start_ts)
    }

    pub fn data_versions(&self) -> &BTreeSet<u64> {
        &self.data
    }

    /// Commit timestamp of the newest `write` record.
    pub fn latest_commit_ts(&self) -> Option<u64> {
        self.writes
            .values()
            .filter(|w| w.is_write())
            .map(|w| w.ts)
            .max()
    }

    fn has_rollback(&self, start_ts: u64) -> bool {
        self.writes
            .get(&start_ts)
            .is_some_and(|w| w.is_rollback())
    }

    fn has_write_at_or_after(&self, ts: u64) -> Option<u64> {
        self.writes.values().map(|w| w.ts).filter(|t| *t >= ts).max()
    }
}

#[cfg(test)]
impl KeyRecord {
    /// Assemble a record directly, bypassing the KeyStore operations.
    pub(crate) fn from_parts(
        lock: Option<LockInfo>,
        writes: impl IntoIterator<Item = (u64, WriteRecord)>,
        data: impl IntoIterator<Item = u64>,
    ) -> Self {
        Self {
            lock,
            writes: writes.into_iter().collect(),
            data: data.into_iter().collect(),
        }
    }
}

/// Result of [`KeyStore::try_acquire_pessimistic_lock`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockKeyOutcome {
    /// The pessimistic lock is held by the requesting transaction.
    Locked,
    /// A newer commit exists; retry with `for_update_ts >= latest_commit_ts`.
    Conflict { latest_commit_ts: u64 },
    /// The transaction was already rolled back on this key.
    Aborted,
    /// Another transaction's lock is in the way.
    Blocked(LockInfo),
    /// The transaction already committed on this key; the request is a late duplicate.
    Stale,
}

/// Result of both prewrite flavors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrewriteOutcome {
    Prewritten,
    Aborted,
    /// Another transaction's lock is in the way (optimistic prewrite only).
    Blocked(LockInfo),
}

/// Result of [`KeyStore::commit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    /// A write record for this start_ts was already present.
    AlreadyCommitted,
    Aborted,
}

impl CommitOutcome {
    pub fn is_committed(self) -> bool {
        matches!(self, CommitOutcome::Committed | CommitOutcome::AlreadyCommitted)
    }
}

/// Result of [`KeyStore::rollback`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackOutcome {
    RolledBack { protected: bool },
    AlreadyRolledBack,
    /// The transaction committed on this key; nothing was changed.
    AlreadyCommitted,
}

/// Result of [`KeyStore::read_version`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The start_ts of the visible version.
    Version(u64),
    NotFound,
    /// A lock that may hide a version at or below the read timestamp.
    Locked(LockInfo),
}

/// The KeyStore.
pub struct KeyStore {
    records: DashMap<String, Arc<Mutex<KeyRecord>>>,
    ts_oracle: Arc<dyn TimestampOracle>,
}

impl std::fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStore")
            .field("keys", &self.records.len())
            .finish()
    }
}

impl KeyStore {
    pub fn new(ts_oracle: Arc<dyn TimestampOracle>) -> Self {
        Self {
            records: DashMap::new(),
            ts_oracle,
        }
    }

    fn record(&self, key: &str) -> Arc<Mutex<KeyRecord>> {
        // Clone the Arc out so the shard guard is released before the key mutex is taken.
        if let Some(record) = self.records.get(key) {
            return record.value().clone();
        }
        self.records.entry(key.to_string()).or_default().value().clone()
    }

    fn existing(&self, key: &str) -> Option<Arc<Mutex<KeyRecord>>> {
        self.records.get(key).map(|r| r.value().clone())
    }

    /// Acquire a pessimistic lock, checking for commits newer than `for_update_ts`.
    pub fn try_acquire_pessimistic_lock(
        &self,
        key: &str,
        start_ts: u64,
        for_update_ts: u64,
        primary: &str,
    ) -> LockKeyOutcome {
        let record = self.record(key);
        let mut guard = record.lock();
        let rec = &mut *guard;

        let outcome = if rec.has_rollback(start_ts) {
            LockKeyOutcome::Aborted
        } else if rec.write_for(start_ts).is_some() {
            // Late copy of a request whose transaction already committed here.
            LockKeyOutcome::Stale
        } else if let Some(lock) = &rec.lock {
            if lock.start_ts == start_ts {
                // Duplicate delivery of a request that already won.
                LockKeyOutcome::Locked
            } else {
                LockKeyOutcome::Blocked(lock.clone())
            }
        } else if let Some(latest_commit_ts) = rec
            .latest_commit_ts()
            .filter(|ts| *ts > for_update_ts)
        {
            LockKeyOutcome::Conflict { latest_commit_ts }
        } else {
            rec.lock = Some(LockInfo::new(start_ts, primary, LockKind::PessimisticLock));
            self.ts_oracle.update_max_ts(for_update_ts);
            LockKeyOutcome::Locked
        };

        trace!(key, start_ts, for_update_ts, ?outcome, "lock_key");
        outcome
    }

    /// Convert the transaction's pessimistic lock into a prewrite lock.
    pub fn prewrite_pessimistic(&self, key: &str, start_ts: u64, primary: &str) -> PrewriteOutcome {
        let record = self.record(key);
        let mut guard = record.lock();
        let rec = &mut *guard;

        let outcome = match rec.lock.as_mut() {
            Some(lock) if lock.start_ts == start_ts => {
                lock.kind = LockKind::PessimisticPrewrite;
                lock.primary_key = primary.to_string();
                rec.data.insert(start_ts);
                PrewriteOutcome::Prewritten
            }
            // Missing or replaced: the pessimistic lock was cleaned up as stale.
            _ => PrewriteOutcome::Aborted,
        };

        trace!(key, start_ts, ?outcome, "prewrite_pessimistic");
        outcome
    }

    /// Install an optimistic prewrite lock and data marker.
    ///
    /// `secondaries` is stored on the lock only when `key` is the primary.
    pub fn prewrite_optimistic(
        &self,
        key: &str,
        start_ts: u64,
        primary: &str,
        secondaries: &BTreeSet<String>,
    ) -> PrewriteOutcome {
        let record = self.record(key);
        let mut guard = record.lock();
        let rec = &mut *guard;

        let outcome = if let Some(conflict_ts) = rec.has_write_at_or_after(start_ts) {
            trace!(key, start_ts, conflict_ts, "prewrite_optimistic: newer write record");
            PrewriteOutcome::Aborted
        } else if let Some(foreign) = rec.lock.as_ref().filter(|l| l.start_ts != start_ts) {
            PrewriteOutcome::Blocked(foreign.clone())
        } else {
            let lock = LockInfo::new(start_ts, primary, LockKind::OptimisticPrewrite);
            rec.lock = Some(if key == primary {
                lock.with_secondaries(secondaries.clone())
            } else {
                lock
            });
            rec.data.insert(start_ts);
            PrewriteOutcome::Prewritten
        };

        trace!(key, start_ts, ?outcome, "prewrite_optimistic");
        outcome
    }

    /// Commit the transaction's lock on `key` at `commit_ts`. Idempotent.
    pub fn commit(&self, key: &str, start_ts: u64, commit_ts: u64) -> CommitOutcome {
        let record = self.record(key);
        let mut guard = record.lock();
        let rec = &mut *guard;

        let outcome = match rec.write_for(start_ts).copied() {
            Some(w) if w.is_write() => CommitOutcome::AlreadyCommitted,
            Some(_) => CommitOutcome::Aborted,
            None if commit_ts <= start_ts => CommitOutcome::Aborted,
            None => {
                // A bare pessimistic lock was never prewritten and has no data to commit.
                let prewritten = rec.lock.as_ref().is_some_and(|l| {
                    l.start_ts == start_ts && l.kind != LockKind::PessimisticLock
                });
                if prewritten {
                    rec.lock = None;
                    rec.writes
                        .insert(start_ts, WriteRecord::commit(start_ts, commit_ts));
                    CommitOutcome::Committed
                } else {
                    CommitOutcome::Aborted
                }
            }
        };

        trace!(key, start_ts, commit_ts, ?outcome, "commit");
        outcome
    }

    /// Roll the transaction back on `key`. Idempotent.
    ///
    /// The rollback record is protected when it rolls back a pessimistic
    /// transaction's primary lock, or when there is no lock of this transaction
    /// to tell us what kind of transaction it was. Unprotected rollback records
    /// older than `start_ts` are collapsed.
    pub fn rollback(&self, key: &str, start_ts: u64) -> RollbackOutcome {
        let record = self.record(key);
        let mut guard = record.lock();
        let rec = &mut *guard;

        let outcome = match rec.write_for(start_ts).copied() {
            Some(w) if w.is_write() => RollbackOutcome::AlreadyCommitted,
            Some(_) => RollbackOutcome::AlreadyRolledBack,
            None => {
                let protected = match &rec.lock {
                    Some(lock) if lock.start_ts == start_ts => {
                        lock.kind.is_pessimistic() && lock.is_primary_of(key)
                    }
                    _ => true,
                };
                if rec.lock.as_ref().is_some_and(|l| l.start_ts == start_ts) {
                    rec.lock = None;
                }
                rec.data.remove(&start_ts);
                rec.writes.retain(|_, w| !w.is_collapsible_before(start_ts));
                rec.writes
                    .insert(start_ts, WriteRecord::rollback(start_ts, protected));
                RollbackOutcome::RolledBack { protected }
            }
        };

        trace!(key, start_ts, ?outcome, "rollback");
        outcome
    }

    /// Snapshot read: which version of `key` is visible at `read_ts`.
    ///
    /// Prewrite locks at or below `read_ts` hide the answer; bare pessimistic
    /// locks carry no data and never block readers.
    pub fn read_version(&self, key: &str, read_ts: u64) -> ReadOutcome {
        let Some(record) = self.existing(key) else {
            return ReadOutcome::NotFound;
        };
        let rec = record.lock();

        if let Some(lock) = &rec.lock
            && lock.start_ts <= read_ts
            && lock.kind != LockKind::PessimisticLock
        {
            return ReadOutcome::Locked(lock.clone());
        }

        rec.writes
            .values()
            .filter(|w| w.is_write() && w.ts <= read_ts)
            .max_by_key(|w| w.ts)
            .map_or(ReadOutcome::NotFound, |w| ReadOutcome::Version(w.start_ts))
    }

    fn with_record<T>(&self, key: &str, f: impl FnOnce(&KeyRecord) -> T) -> Option<T> {
        let record = self.existing(key)?;
        let rec = record.lock();
        Some(f(&rec))
    }

    pub fn lock(&self, key: &str) -> Option<LockInfo> {
        self.with_record(key, |rec| rec.lock.clone()).flatten()
    }

    pub fn write_records(&self, key: &str) -> Vec<WriteRecord> {
        self.with_record(key, KeyRecord::write_records)
            .unwrap_or_default()
    }

    pub fn write_for(&self, key: &str, start_ts: u64) -> Option<WriteRecord> {
        self.with_record(key, |rec| rec.write_for(start_ts).copied())
            .flatten()
    }

    pub fn data_versions(&self, key: &str) -> BTreeSet<u64> {
        self.with_record(key, |rec| rec.data.clone())
            .unwrap_or_default()
    }

    pub fn latest_commit_ts(&self, key: &str) -> Option<u64> {
        self.with_record(key, KeyRecord::latest_commit_ts).flatten()
    }

    /// A consistent copy of one key's state.
    pub fn snapshot(&self, key: &str) -> Option<KeyRecord> {
        self.with_record(key, KeyRecord::clone)
    }

    /// All keys ever touched, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.records.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Keys currently locked by the transaction `(primary, start_ts)`.
    ///
    /// Each key is inspected under its own mutex; the answer for a key may be
    /// stale by the time the caller acts on it, which the per-key operations
    /// tolerate because they re-check the lock.
    pub fn keys_locked_by(&self, primary: &str, start_ts: u64) -> Vec<String> {
        let candidates: Vec<(String, Arc<Mutex<KeyRecord>>)> = self
            .records
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();

        candidates
            .into_iter()
            .filter(|(_, record)| {
                let rec = record.lock();
                rec.lock
                    .as_ref()
                    .is_some_and(|l| l.belongs_to(primary, start_ts))
            })
            .map(|(key, _)| key)
            .collect()
    }

    /// Visit a consistent copy of every key's state.
    pub fn for_each_record(&self, mut f: impl FnMut(&str, &KeyRecord)) {
        for key in self.keys() {
            if let Some(rec) = self.snapshot(&key) {
                f(&key, &rec);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timestamp_oracle::LocalTimestampOracle;
    use crate::write::WriteKind;

    fn store() -> KeyStore {
        KeyStore::new(Arc::new(LocalTimestampOracle::new()))
    }

    fn none() -> BTreeSet<String> {
        BTreeSet::new()
    }

    #[test]
    fn test_optimistic_prewrite_commit() {
        let s = store();
        assert_eq!(s.prewrite_optimistic("k", 10, "k", &none()), PrewriteOutcome::Prewritten);
        assert_eq!(s.lock("k").unwrap().kind, LockKind::OptimisticPrewrite);
        assert!(s.data_versions("k").contains(&10));

        assert_eq!(s.commit("k", 10, 11), CommitOutcome::Committed);
        assert!(s.lock("k").is_none());
        assert_eq!(s.write_records("k"), vec![WriteRecord::commit(10, 11)]);

        // Replay is a no-op.
        assert_eq!(s.commit("k", 10, 11), CommitOutcome::AlreadyCommitted);
        assert_eq!(s.write_records("k").len(), 1);
    }

    #[test]
    fn test_optimistic_prewrite_rejects_newer_write() {
        let s = store();
        s.prewrite_optimistic("k", 10, "k", &none());
        s.commit("k", 10, 15);
        assert_eq!(s.prewrite_optimistic("k", 12, "k", &none()), PrewriteOutcome::Aborted);
        assert_eq!(s.prewrite_optimistic("k", 15, "k", &none()), PrewriteOutcome::Aborted);
        assert_eq!(s.prewrite_optimistic("k", 16, "k", &none()), PrewriteOutcome::Prewritten);
    }

    #[test]
    fn test_optimistic_prewrite_blocked_by_foreign_lock() {
        let s = store();
        s.prewrite_optimistic("k", 10, "k", &none());
        match s.prewrite_optimistic("k", 12, "k", &none()) {
            PrewriteOutcome::Blocked(lock) => assert_eq!(lock.start_ts, 10),
            other => panic!("expected blocked, got {:?}", other),
        }
        // Same transaction may repeat its prewrite.
        assert_eq!(s.prewrite_optimistic("k", 10, "k", &none()), PrewriteOutcome::Prewritten);
    }

    #[test]
    fn test_primary_lock_keeps_secondaries() {
        let s = store();
        let secondaries: BTreeSet<String> = ["b".to_string(), "c".to_string()].into();
        s.prewrite_optimistic("a", 5, "a", &secondaries);
        s.prewrite_optimistic("b", 5, "a", &secondaries);
        assert_eq!(s.lock("a").unwrap().secondaries, secondaries);
        assert!(s.lock("b").unwrap().secondaries.is_empty());
    }

    #[test]
    fn test_pessimistic_lock_conflict_reports_latest_commit() {
        let s = store();
        s.prewrite_optimistic("k", 3, "k", &none());
        s.commit("k", 3, 8);

        assert_eq!(
            s.try_acquire_pessimistic_lock("k", 5, 5, "k"),
            LockKeyOutcome::Conflict { latest_commit_ts: 8 }
        );
        assert_eq!(s.try_acquire_pessimistic_lock("k", 5, 8, "k"), LockKeyOutcome::Locked);
        assert_eq!(s.lock("k").unwrap().kind, LockKind::PessimisticLock);
    }

    #[test]
    fn test_pessimistic_lock_advances_max_ts() {
        let oracle = Arc::new(LocalTimestampOracle::new());
        let s = KeyStore::new(oracle.clone());
        s.try_acquire_pessimistic_lock("k", 4, 20, "k");
        assert_eq!(oracle.max_ts(), 20);
    }

    #[test]
    fn test_pessimistic_lock_after_rollback_is_aborted() {
        let s = store();
        s.rollback("k", 7);
        assert_eq!(s.try_acquire_pessimistic_lock("k", 7, 7, "k"), LockKeyOutcome::Aborted);
    }

    #[test]
    fn test_pessimistic_lock_duplicate_and_foreign() {
        let s = store();
        assert_eq!(s.try_acquire_pessimistic_lock("k", 7, 7, "k"), LockKeyOutcome::Locked);
        assert_eq!(s.try_acquire_pessimistic_lock("k", 7, 9, "k"), LockKeyOutcome::Locked);
        assert!(matches!(
            s.try_acquire_pessimistic_lock("k", 8, 8, "k"),
            LockKeyOutcome::Blocked(_)
        ));
    }

    #[test]
    fn test_late_lock_key_after_commit_is_stale() {
        let s = store();
        s.try_acquire_pessimistic_lock("k", 3, 3, "k");
        s.prewrite_pessimistic("k", 3, "k");
        s.commit("k", 3, 4);
        s.try_acquire_pessimistic_lock("k", 5, 5, "k");

        // The late copy neither blocks on the new holder nor reports a conflict.
        assert_eq!(s.try_acquire_pessimistic_lock("k", 3, 3, "k"), LockKeyOutcome::Stale);
        assert_eq!(s.lock("k").unwrap().start_ts, 5);
    }

    #[test]
    fn test_prewrite_pessimistic_requires_lock() {
        let s = store();
        assert_eq!(s.prewrite_pessimistic("k", 3, "k"), PrewriteOutcome::Aborted);

        s.try_acquire_pessimistic_lock("k", 3, 3, "k");
        assert_eq!(s.prewrite_pessimistic("k", 3, "k"), PrewriteOutcome::Prewritten);
        assert_eq!(s.lock("k").unwrap().kind, LockKind::PessimisticPrewrite);
        assert!(s.data_versions("k").contains(&3));
    }

    #[test]
    fn test_commit_without_lock_aborts() {
        let s = store();
        assert_eq!(s.commit("k", 3, 4), CommitOutcome::Aborted);
        s.rollback("k", 3);
        assert_eq!(s.commit("k", 3, 4), CommitOutcome::Aborted);
        assert!(s.write_records("k").iter().all(|w| !w.is_write()));
    }

    #[test]
    fn test_commit_rejects_non_increasing_commit_ts() {
        let s = store();
        s.prewrite_optimistic("k", 3, "k", &none());
        assert_eq!(s.commit("k", 3, 3), CommitOutcome::Aborted);
        assert!(s.lock("k").is_some());
    }

    #[test]
    fn test_commit_of_unprewritten_pessimistic_lock_aborts() {
        let s = store();
        s.try_acquire_pessimistic_lock("k", 5, 5, "k");
        assert_eq!(s.commit("k", 5, 6), CommitOutcome::Aborted);
        assert_eq!(s.lock("k").unwrap().kind, LockKind::PessimisticLock);
        assert!(s.write_records("k").is_empty());
        assert!(s.data_versions("k").is_empty());

        // Once prewritten the same lock commits, and only prewrite added data.
        s.prewrite_pessimistic("k", 5, "k");
        assert_eq!(s.commit("k", 5, 6), CommitOutcome::Committed);
        assert_eq!(s.data_versions("k"), [5].into());
    }

    #[test]
    fn test_rollback_protection_rules() {
        let s = store();

        // Pessimistic primary: protected.
        s.try_acquire_pessimistic_lock("p", 2, 2, "p");
        assert_eq!(s.rollback("p", 2), RollbackOutcome::RolledBack { protected: true });

        // Pessimistic secondary: not protected.
        s.try_acquire_pessimistic_lock("s", 2, 2, "p");
        assert_eq!(s.rollback("s", 2), RollbackOutcome::RolledBack { protected: false });

        // Optimistic primary: not protected.
        s.prewrite_optimistic("o", 4, "o", &none());
        assert_eq!(s.rollback("o", 4), RollbackOutcome::RolledBack { protected: false });

        // No lock evidence: protected.
        assert_eq!(s.rollback("fresh", 9), RollbackOutcome::RolledBack { protected: true });

        // Foreign lock: protected, foreign lock untouched.
        s.prewrite_optimistic("f", 11, "f", &none());
        assert_eq!(s.rollback("f", 10), RollbackOutcome::RolledBack { protected: true });
        assert_eq!(s.lock("f").unwrap().start_ts, 11);
    }

    #[test]
    fn test_rollback_idempotent_and_respects_commit() {
        let s = store();
        s.prewrite_optimistic("k", 3, "k", &none());
        s.commit("k", 3, 4);
        assert_eq!(s.rollback("k", 3), RollbackOutcome::AlreadyCommitted);

        s.prewrite_optimistic("k", 5, "k", &none());
        assert!(matches!(s.rollback("k", 5), RollbackOutcome::RolledBack { .. }));
        assert_eq!(s.rollback("k", 5), RollbackOutcome::AlreadyRolledBack);
        assert!(!s.data_versions("k").contains(&5));
    }

    #[test]
    fn test_rollback_collapses_only_unprotected_older_records() {
        let s = store();
        // Protected rollback at 2 (no lock evidence).
        s.rollback("k", 2);
        // Unprotected (optimistic) rollback at 3.
        s.prewrite_optimistic("k", 3, "k", &none());
        s.rollback("k", 3);
        assert_eq!(s.write_records("k").len(), 2);
        // Newer rollback at 8 collapses 3 but keeps 2.
        s.prewrite_optimistic("k", 8, "k", &none());
        s.rollback("k", 8);

        let records = s.write_records("k");
        let starts: Vec<u64> = records.iter().map(|w| w.start_ts).collect();
        assert_eq!(starts, vec![2, 8]);
        assert_eq!(records[0].kind, WriteKind::Rollback { protected: true });
    }

    #[test]
    fn test_read_version() {
        let s = store();
        assert_eq!(s.read_version("k", 100), ReadOutcome::NotFound);

        s.prewrite_optimistic("k", 3, "k", &none());
        assert!(matches!(s.read_version("k", 10), ReadOutcome::Locked(_)));
        // Locks newer than the read timestamp don't matter.
        assert_eq!(s.read_version("k", 2), ReadOutcome::NotFound);

        s.commit("k", 3, 4);
        assert_eq!(s.read_version("k", 3), ReadOutcome::NotFound);
        assert_eq!(s.read_version("k", 4), ReadOutcome::Version(3));

        // Bare pessimistic locks don't block readers.
        s.try_acquire_pessimistic_lock("k", 6, 6, "k");
        assert_eq!(s.read_version("k", 10), ReadOutcome::Version(3));
    }

    #[test]
    fn test_keys_locked_by() {
        let s = store();
        let secondaries: BTreeSet<String> = ["b".to_string()].into();
        s.prewrite_optimistic("a", 5, "a", &secondaries);
        s.prewrite_optimistic("b", 5, "a", &secondaries);
        s.prewrite_optimistic("c", 6, "c", &none());

        let mut keys = s.keys_locked_by("a", 5);
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
        assert!(s.keys_locked_by("a", 6).is_empty());
    }
}
