//! Request and response messages exchanged between transaction coordinators
//! and server handlers.
//!
//! Both enums serialize as internally tagged objects, discriminated by a
//! `type` field with snake_case variant names, e.g.
//! `{"type":"lock_key","start_ts":3,"primary":"a","key":"b","for_update_ts":3}`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    LockKey {
        start_ts: u64,
        primary: String,
        key: String,
        for_update_ts: u64,
    },
    PrewriteOptimistic {
        start_ts: u64,
        primary: String,
        keys: BTreeSet<String>,
    },
    PrewritePessimistic {
        start_ts: u64,
        primary: String,
        key: String,
    },
    Commit {
        start_ts: u64,
        primary: String,
        commit_ts: u64,
    },
    Cleanup {
        start_ts: u64,
        primary: String,
    },
    ResolveCommitted {
        start_ts: u64,
        primary: String,
        commit_ts: u64,
    },
    ResolveRolledback {
        start_ts: u64,
        primary: String,
    },
}

impl Request {
    pub fn start_ts(&self) -> u64 {
        match self {
            Request::LockKey { start_ts, .. }
            | Request::PrewriteOptimistic { start_ts, .. }
            | Request::PrewritePessimistic { start_ts, .. }
            | Request::Commit { start_ts, .. }
            | Request::Cleanup { start_ts, .. }
            | Request::ResolveCommitted { start_ts, .. }
            | Request::ResolveRolledback { start_ts, .. } => *start_ts,
        }
    }

    pub fn primary(&self) -> &str {
        match self {
            Request::LockKey { primary, .. }
            | Request::PrewriteOptimistic { primary, .. }
            | Request::PrewritePessimistic { primary, .. }
            | Request::Commit { primary, .. }
            | Request::Cleanup { primary, .. }
            | Request::ResolveCommitted { primary, .. }
            | Request::ResolveRolledback { primary, .. } => primary,
        }
    }

    /// Short name matching the wire `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Request::LockKey { .. } => "lock_key",
            Request::PrewriteOptimistic { .. } => "prewrite_optimistic",
            Request::PrewritePessimistic { .. } => "prewrite_pessimistic",
            Request::Commit { .. } => "commit",
            Request::Cleanup { .. } => "cleanup",
            Request::ResolveCommitted { .. } => "resolve_committed",
            Request::ResolveRolledback { .. } => "resolve_rolledback",
        }
    }

    /// The abort response a server may answer with after giving up on a
    /// request that waits behind a foreign lock.
    pub fn wait_abort_response(&self) -> Option<Response> {
        let start_ts = self.start_ts();
        match self {
            Request::LockKey { .. } => Some(Response::LockKeyAborted { start_ts }),
            Request::PrewriteOptimistic { .. } => Some(Response::PrewriteAborted { start_ts }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Prewritten {
        start_ts: u64,
        key: String,
    },
    LockedKey {
        start_ts: u64,
        key: String,
    },
    LockFailed {
        start_ts: u64,
        key: String,
        latest_commit_ts: u64,
    },
    Committed {
        start_ts: u64,
    },
    CommitAborted {
        start_ts: u64,
    },
    PrewriteAborted {
        start_ts: u64,
    },
    LockKeyAborted {
        start_ts: u64,
    },
}

impl Response {
    pub fn start_ts(&self) -> u64 {
        match self {
            Response::Prewritten { start_ts, .. }
            | Response::LockedKey { start_ts, .. }
            | Response::LockFailed { start_ts, .. }
            | Response::Committed { start_ts }
            | Response::CommitAborted { start_ts }
            | Response::PrewriteAborted { start_ts }
            | Response::LockKeyAborted { start_ts } => *start_ts,
        }
    }

    /// True for the three terminal abort responses.
    pub fn is_abort(&self) -> bool {
        matches!(
            self,
            Response::CommitAborted { .. }
                | Response::PrewriteAborted { .. }
                | Response::LockKeyAborted { .. }
        )
    }
}
