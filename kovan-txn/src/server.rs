//! Server-side request handling.
//!
//! [`ServerHandler`] is stateless: it maps one request onto KeyStore
//! operations and reports what should happen next as [`Effects`]. Delivering
//! those effects (routing responses, enqueueing follow-up requests,
//! redelivering blocked requests) is left to the caller.

use crate::message::{Request, Response};
use crate::resolver::StaleLockResolver;
use crate::storage::{KeyStore, LockKeyOutcome, PrewriteOutcome, RollbackOutcome};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Everything produced by handling one request.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Effects {
    /// Responses for the requesting coordinator.
    pub responses: Vec<Response>,
    /// Follow-up requests (cleanup, resolve fan-out).
    pub requests: Vec<Request>,
    /// The request waits behind a foreign lock and should be redelivered.
    pub blocked: bool,
}

impl Effects {
    fn respond(response: Response) -> Self {
        Self {
            responses: vec![response],
            ..Self::default()
        }
    }
}

pub struct ServerHandler {
    store: Arc<KeyStore>,
    resolver: Arc<StaleLockResolver>,
}

impl ServerHandler {
    pub fn new(store: Arc<KeyStore>, resolver: Arc<StaleLockResolver>) -> Self {
        Self { store, resolver }
    }

    pub fn store(&self) -> &Arc<KeyStore> {
        &self.store
    }

    pub fn handle(&self, request: &Request) -> Effects {
        match request {
            Request::LockKey {
                start_ts,
                primary,
                key,
                for_update_ts,
            } => self.lock_key(*start_ts, primary, key, *for_update_ts),
            Request::PrewriteOptimistic {
                start_ts,
                primary,
                keys,
            } => self.prewrite_optimistic(*start_ts, primary, keys),
            Request::PrewritePessimistic {
                start_ts,
                primary,
                key,
            } => {
                let start_ts = *start_ts;
                match self.store.prewrite_pessimistic(key, start_ts, primary) {
                    PrewriteOutcome::Prewritten => Effects::respond(Response::Prewritten {
                        start_ts,
                        key: key.clone(),
                    }),
                    PrewriteOutcome::Aborted | PrewriteOutcome::Blocked(_) => {
                        Effects::respond(Response::PrewriteAborted { start_ts })
                    }
                }
            }
            Request::Commit {
                start_ts,
                primary,
                commit_ts,
            } => {
                let start_ts = *start_ts;
                if self.store.commit(primary, start_ts, *commit_ts).is_committed() {
                    Effects::respond(Response::Committed { start_ts })
                } else {
                    Effects::respond(Response::CommitAborted { start_ts })
                }
            }
            Request::Cleanup { start_ts, primary } => self.cleanup(*start_ts, primary),
            Request::ResolveCommitted {
                start_ts,
                primary,
                commit_ts,
            } => {
                for key in self.store.keys_locked_by(primary, *start_ts) {
                    let outcome = self.store.commit(&key, *start_ts, *commit_ts);
                    debug!(%key, start_ts, commit_ts, ?outcome, "resolve_committed");
                }
                Effects::default()
            }
            Request::ResolveRolledback { start_ts, primary } => {
                for key in self.store.keys_locked_by(primary, *start_ts) {
                    let outcome = self.store.rollback(&key, *start_ts);
                    debug!(%key, start_ts, ?outcome, "resolve_rolledback");
                }
                Effects::default()
            }
        }
    }

    fn lock_key(&self, start_ts: u64, primary: &str, key: &str, for_update_ts: u64) -> Effects {
        match self
            .store
            .try_acquire_pessimistic_lock(key, start_ts, for_update_ts, primary)
        {
            LockKeyOutcome::Locked => Effects::respond(Response::LockedKey {
                start_ts,
                key: key.to_string(),
            }),
            LockKeyOutcome::Conflict { latest_commit_ts } => {
                Effects::respond(Response::LockFailed {
                    start_ts,
                    key: key.to_string(),
                    latest_commit_ts,
                })
            }
            LockKeyOutcome::Aborted => Effects::respond(Response::LockKeyAborted { start_ts }),
            LockKeyOutcome::Blocked(lock) => Effects {
                requests: self.resolver.on_blocked(&lock).into_iter().collect(),
                blocked: true,
                ..Effects::default()
            },
            LockKeyOutcome::Stale => Effects::default(),
        }
    }

    fn prewrite_optimistic(&self, start_ts: u64, primary: &str, keys: &BTreeSet<String>) -> Effects {
        let secondaries: BTreeSet<String> = keys.iter().filter(|k| *k != primary).cloned().collect();
        let mut effects = Effects::default();
        let mut aborted = false;
        let mut blockers = Vec::new();

        for key in keys {
            match self
                .store
                .prewrite_optimistic(key, start_ts, primary, &secondaries)
            {
                PrewriteOutcome::Prewritten => effects.responses.push(Response::Prewritten {
                    start_ts,
                    key: key.clone(),
                }),
                PrewriteOutcome::Aborted => aborted = true,
                PrewriteOutcome::Blocked(lock) => blockers.push(lock),
            }
        }

        if aborted {
            // A doomed batch neither waits nor disturbs the lock holders.
            effects
                .responses
                .push(Response::PrewriteAborted { start_ts });
        } else if !blockers.is_empty() {
            effects.blocked = true;
            effects.requests = blockers
                .iter()
                .filter_map(|lock| self.resolver.on_blocked(lock))
                .collect();
        }
        effects
    }

    /// Decide the fate of `(primary, start_ts)` from the primary key and fan it out.
    fn cleanup(&self, start_ts: u64, primary: &str) -> Effects {
        let commit_ts = match self.store.write_for(primary, start_ts) {
            Some(w) if w.is_write() => Some(w.ts),
            _ => match self.store.rollback(primary, start_ts) {
                // Committed between the check and the rollback.
                RollbackOutcome::AlreadyCommitted => self
                    .store
                    .write_for(primary, start_ts)
                    .map(|w| w.ts),
                RollbackOutcome::RolledBack { .. } | RollbackOutcome::AlreadyRolledBack => None,
            },
        };
        self.resolver.finished(primary, start_ts);

        let primary = primary.to_string();
        let follow_up = match commit_ts {
            Some(commit_ts) => {
                debug!(%primary, start_ts, commit_ts, "cleanup: primary committed");
                Request::ResolveCommitted {
                    start_ts,
                    primary,
                    commit_ts,
                }
            }
            None => {
                debug!(%primary, start_ts, "cleanup: primary rolled back");
                Request::ResolveRolledback { start_ts, primary }
            }
        };
        Effects {
            requests: vec![follow_up],
            ..Effects::default()
        }
    }
}
