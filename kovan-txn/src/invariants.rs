//! Runtime checks for the safety properties of the protocol.
//!
//! [`check_store`] validates every key's state in isolation. [`OutcomeLog`]
//! remembers the commit decisions the servers handed out so the
//! response-level properties can be checked against the store afterwards.
//! Checks read each key under its own mutex; run them on a quiescent store
//! for a consistent verdict.

use crate::message::{Request, Response};
use crate::storage::{KeyRecord, KeyStore};
use crate::write::WriteKind;
use dashmap::DashMap;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("key '{key}' has more than one write record for start_ts {start_ts}")]
    DuplicateWrite { key: String, start_ts: u64 },
    #[error("key '{key}' holds both a lock and a write record for start_ts {start_ts}")]
    LockAndWrite { key: String, start_ts: u64 },
    #[error("key '{key}' has a misordered record: start_ts {start_ts}, ts {ts}")]
    WriteOrdering { key: String, start_ts: u64, ts: u64 },
    #[error("key '{key}' has a write record for start_ts {start_ts} without a data version")]
    MissingDataVersion { key: String, start_ts: u64 },
    #[error("transaction {start_ts} received both committed and commit_aborted")]
    DoubleOutcome { start_ts: u64 },
    #[error("transaction {start_ts} reported committed but primary '{primary}' has no write record")]
    PrimaryNotCommitted { start_ts: u64, primary: String },
    #[error("transaction {start_ts} committed but secondary '{key}' has neither a write record nor a lock")]
    SecondaryLost { start_ts: u64, key: String },
    #[error("transaction {start_ts} reported commit_aborted but primary '{primary}' has a write record")]
    CommittedAfterAbort { start_ts: u64, primary: String },
}

fn check_record(key: &str, rec: &KeyRecord) -> Result<(), InvariantViolation> {
    let records = rec.write_records();

    let mut seen = BTreeSet::new();
    for w in &records {
        if !seen.insert(w.start_ts) {
            return Err(InvariantViolation::DuplicateWrite {
                key: key.to_string(),
                start_ts: w.start_ts,
            });
        }
        let ordered = match w.kind {
            WriteKind::Write => w.ts > w.start_ts,
            WriteKind::Rollback { .. } => w.ts == w.start_ts,
        };
        if !ordered {
            return Err(InvariantViolation::WriteOrdering {
                key: key.to_string(),
                start_ts: w.start_ts,
                ts: w.ts,
            });
        }
        if w.is_write() && !rec.data_versions().contains(&w.start_ts) {
            return Err(InvariantViolation::MissingDataVersion {
                key: key.to_string(),
                start_ts: w.start_ts,
            });
        }
    }

    // Lock uniqueness holds by construction: a record has room for one lock.
    if let Some(lock) = rec.lock()
        && seen.contains(&lock.start_ts)
    {
        return Err(InvariantViolation::LockAndWrite {
            key: key.to_string(),
            start_ts: lock.start_ts,
        });
    }
    Ok(())
}

/// Check every per-key invariant over the whole store.
pub fn check_store(store: &KeyStore) -> Result<(), InvariantViolation> {
    let mut result = Ok(());
    store.for_each_record(|key, rec| {
        if result.is_ok() {
            result = check_record(key, rec);
        }
    });
    if let Err(violation) = &result {
        warn!(%violation, "invariant violated");
    }
    result
}

#[derive(Debug, Clone, Default)]
struct TxnOutcome {
    primary: Option<String>,
    keys: BTreeSet<String>,
    committed: bool,
    commit_aborted: bool,
}

/// Commit decisions observed per `start_ts`.
#[derive(Debug, Default)]
pub struct OutcomeLog {
    txns: DashMap<u64, TxnOutcome>,
}

impl OutcomeLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember the key set of a transaction so its secondaries can be checked.
    pub fn register(&self, start_ts: u64, primary: &str, keys: &BTreeSet<String>) {
        let mut entry = self.txns.entry(start_ts).or_default();
        entry.primary = Some(primary.to_string());
        entry.keys = keys.clone();
    }

    /// Record a response produced while handling `request`.
    pub fn record(&self, request: &Request, response: &Response) {
        let (committed, aborted) = match response {
            Response::Committed { .. } => (true, false),
            Response::CommitAborted { .. } => (false, true),
            _ => return,
        };
        let mut entry = self.txns.entry(response.start_ts()).or_default();
        if entry.primary.is_none() {
            entry.primary = Some(request.primary().to_string());
        }
        entry.committed |= committed;
        entry.commit_aborted |= aborted;
    }

    pub fn committed(&self) -> BTreeSet<u64> {
        self.txns
            .iter()
            .filter(|e| e.committed)
            .map(|e| *e.key())
            .collect()
    }

    pub fn commit_aborted(&self) -> BTreeSet<u64> {
        self.txns
            .iter()
            .filter(|e| e.commit_aborted)
            .map(|e| *e.key())
            .collect()
    }

    /// Check commit consistency, abort consistency and the absence of double
    /// outcomes against the current store.
    pub fn check(&self, store: &KeyStore) -> Result<(), InvariantViolation> {
        let txns: BTreeMap<u64, TxnOutcome> = self
            .txns
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect();

        for (start_ts, outcome) in txns {
            let Some(primary) = outcome.primary.as_deref() else {
                continue;
            };
            if outcome.committed && outcome.commit_aborted {
                return Err(InvariantViolation::DoubleOutcome { start_ts });
            }
            let primary_write = store
                .write_for(primary, start_ts)
                .is_some_and(|w| w.is_write());

            if outcome.committed {
                if !primary_write {
                    return Err(InvariantViolation::PrimaryNotCommitted {
                        start_ts,
                        primary: primary.to_string(),
                    });
                }
                for key in outcome.keys.iter().filter(|k| *k != primary) {
                    let resolved = store.write_for(key, start_ts).is_some_and(|w| w.is_write());
                    let pending = store.lock(key).is_some_and(|l| l.start_ts == start_ts);
                    if !resolved && !pending {
                        return Err(InvariantViolation::SecondaryLost {
                            start_ts,
                            key: key.clone(),
                        });
                    }
                }
            }
            if outcome.commit_aborted && primary_write {
                return Err(InvariantViolation::CommittedAfterAbort {
                    start_ts,
                    primary: primary.to_string(),
                });
            }
        }
        Ok(())
    }
}
