//! Client-side transaction state machine.
//!
//! A [`TxnCoordinator`] never performs I/O. [`TxnCoordinator::start`] and
//! [`TxnCoordinator::on_response`] return the requests the caller must send;
//! responses may arrive duplicated or in any order.
//!
//! ```text
//! pessimistic: Init -> Locking -> Prewriting -> Committing -> Committed | Aborted
//! optimistic:  Init ------------> Prewriting -> Committing -> Committed | Aborted
//! ```

use crate::message::{Request, Response};
use crate::timestamp_oracle::TimestampOracle;
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

/// Whether locks are taken before prewrite.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum TxnKind {
    /// Locks are installed by the prewrite itself.
    #[default]
    Optimistic,
    /// Every key is locked with `lock_key` before prewrite.
    Pessimistic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    Init,
    Locking,
    Prewriting,
    Committing,
    Committed,
    Aborted,
}

impl TxnState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TxnState::Committed | TxnState::Aborted)
    }
}

impl fmt::Display for TxnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TxnState::Init => "init",
            TxnState::Locking => "locking",
            TxnState::Prewriting => "prewriting",
            TxnState::Committing => "committing",
            TxnState::Committed => "committed",
            TxnState::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// The response that moved a transaction to `Aborted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    LockKeyAborted,
    PrewriteAborted,
    CommitAborted,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AbortReason::LockKeyAborted => "lock_key_aborted",
            AbortReason::PrewriteAborted => "prewrite_aborted",
            AbortReason::CommitAborted => "commit_aborted",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct TxnCoordinator {
    kind: TxnKind,
    state: TxnState,
    primary: String,
    keys: BTreeSet<String>,
    start_ts: u64,
    for_update_ts: u64,
    commit_ts: u64,
    /// Keys still waiting for `locked_key`.
    locking_set: BTreeSet<String>,
    /// Keys still waiting for `prewritten`.
    prewriting_set: BTreeSet<String>,
    abort_reason: Option<AbortReason>,
}

impl TxnCoordinator {
    /// A transaction over `keys`, with `primary` holding the commit decision.
    ///
    /// The primary is added to the key set if missing.
    pub fn new<K: Into<String>>(
        kind: TxnKind,
        primary: impl Into<String>,
        keys: impl IntoIterator<Item = K>,
    ) -> Self {
        let primary = primary.into();
        let mut keys: BTreeSet<String> = keys.into_iter().map(Into::into).collect();
        keys.insert(primary.clone());
        Self {
            kind,
            state: TxnState::Init,
            primary,
            keys,
            start_ts: 0,
            for_update_ts: 0,
            commit_ts: 0,
            locking_set: BTreeSet::new(),
            prewriting_set: BTreeSet::new(),
            abort_reason: None,
        }
    }

    pub fn kind(&self) -> TxnKind {
        self.kind
    }

    pub fn state(&self) -> TxnState {
        self.state
    }

    pub fn primary(&self) -> &str {
        &self.primary
    }

    pub fn keys(&self) -> &BTreeSet<String> {
        &self.keys
    }

    /// `0` until the transaction has started.
    pub fn start_ts(&self) -> u64 {
        self.start_ts
    }

    pub fn for_update_ts(&self) -> u64 {
        self.for_update_ts
    }

    /// `0` until the commit request has been issued.
    pub fn commit_ts(&self) -> u64 {
        self.commit_ts
    }

    pub fn locking_set(&self) -> &BTreeSet<String> {
        &self.locking_set
    }

    pub fn prewriting_set(&self) -> &BTreeSet<String> {
        &self.prewriting_set
    }

    pub fn abort_reason(&self) -> Option<AbortReason> {
        self.abort_reason
    }

    fn transition(&mut self, to: TxnState) {
        debug!(start_ts = self.start_ts, from = %self.state, %to, "txn state");
        self.state = to;
    }

    /// Leave `Init`. Returns no requests when called in any other state.
    pub fn start(&mut self, oracle: &dyn TimestampOracle) -> Vec<Request> {
        if self.state != TxnState::Init {
            return Vec::new();
        }
        self.start_ts = oracle.get_timestamp();
        match self.kind {
            TxnKind::Pessimistic => {
                self.for_update_ts = self.start_ts;
                self.locking_set = self.keys.clone();
                self.transition(TxnState::Locking);
                self.keys
                    .iter()
                    .map(|key| self.lock_key_request(key))
                    .collect()
            }
            TxnKind::Optimistic => {
                self.prewriting_set = self.keys.clone();
                self.transition(TxnState::Prewriting);
                vec![Request::PrewriteOptimistic {
                    start_ts: self.start_ts,
                    primary: self.primary.clone(),
                    keys: self.keys.clone(),
                }]
            }
        }
    }

    fn lock_key_request(&self, key: &str) -> Request {
        Request::LockKey {
            start_ts: self.start_ts,
            primary: self.primary.clone(),
            key: key.to_string(),
            for_update_ts: self.for_update_ts,
        }
    }

    /// Advance on one response. Responses for other transactions, for keys no
    /// longer pending, or belonging to an earlier phase are ignored.
    pub fn on_response(&mut self, response: &Response, oracle: &dyn TimestampOracle) -> Vec<Request> {
        if self.state.is_terminal()
            || self.state == TxnState::Init
            || response.start_ts() != self.start_ts
        {
            return Vec::new();
        }

        match (self.state, response) {
            (TxnState::Locking, Response::LockedKey { key, .. }) => {
                self.locking_set.remove(key);
                if self.locking_set.is_empty() {
                    return self.begin_pessimistic_prewrite();
                }
                Vec::new()
            }
            (TxnState::Locking, Response::LockFailed { key, latest_commit_ts, .. })
                if self.locking_set.contains(key) =>
            {
                // Retry with a for_update_ts covering the newer commit; never regress.
                self.for_update_ts = self.for_update_ts.max(*latest_commit_ts);
                debug!(
                    start_ts = self.start_ts,
                    %key,
                    for_update_ts = self.for_update_ts,
                    "lock_key retry"
                );
                vec![self.lock_key_request(key)]
            }
            (TxnState::Prewriting, Response::Prewritten { key, .. }) => {
                self.prewriting_set.remove(key);
                if self.prewriting_set.is_empty() {
                    self.commit_ts = oracle.get_timestamp();
                    self.transition(TxnState::Committing);
                    // Async commit: only the primary; secondaries resolve lazily.
                    return vec![Request::Commit {
                        start_ts: self.start_ts,
                        primary: self.primary.clone(),
                        commit_ts: self.commit_ts,
                    }];
                }
                Vec::new()
            }
            (TxnState::Committing, Response::Committed { .. }) => {
                self.transition(TxnState::Committed);
                Vec::new()
            }
            (TxnState::Locking | TxnState::Prewriting, Response::LockKeyAborted { .. }) => {
                self.abort(AbortReason::LockKeyAborted)
            }
            (TxnState::Locking | TxnState::Prewriting, Response::PrewriteAborted { .. }) => {
                self.abort(AbortReason::PrewriteAborted)
            }
            // Once the commit is issued only the primary's answer decides.
            (TxnState::Committing, Response::CommitAborted { .. }) => {
                self.abort(AbortReason::CommitAborted)
            }
            _ => Vec::new(),
        }
    }

    fn begin_pessimistic_prewrite(&mut self) -> Vec<Request> {
        self.prewriting_set = self.keys.clone();
        self.transition(TxnState::Prewriting);
        self.keys
            .iter()
            .map(|key| Request::PrewritePessimistic {
                start_ts: self.start_ts,
                primary: self.primary.clone(),
                key: key.clone(),
            })
            .collect()
    }

    fn abort(&mut self, reason: AbortReason) -> Vec<Request> {
        self.abort_reason = Some(reason);
        self.transition(TxnState::Aborted);
        Vec::new()
    }
}
