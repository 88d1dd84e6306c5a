/// Kind of a record in a key's write column (CF_WRITE).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    /// The transaction committed on this key.
    Write,
    /// The transaction was rolled back on this key.
    ///
    /// Protected records are never collapsed by garbage collection.
    Rollback { protected: bool },
}

/// A resolved transaction footprint on one key.
///
/// `Write` records carry `ts = commit_ts > start_ts`; `Rollback` records carry
/// `ts = start_ts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteRecord {
    pub ts: u64,
    pub start_ts: u64,
    pub kind: WriteKind,
}

impl WriteRecord {
    pub fn commit(start_ts: u64, commit_ts: u64) -> Self {
        Self {
            ts: commit_ts,
            start_ts,
            kind: WriteKind::Write,
        }
    }

    pub fn rollback(start_ts: u64, protected: bool) -> Self {
        Self {
            ts: start_ts,
            start_ts,
            kind: WriteKind::Rollback { protected },
        }
    }

    pub fn is_write(&self) -> bool {
        self.kind == WriteKind::Write
    }

    pub fn is_rollback(&self) -> bool {
        matches!(self.kind, WriteKind::Rollback { .. })
    }

    pub fn is_protected(&self) -> bool {
        matches!(self.kind, WriteKind::Rollback { protected: true })
    }

    /// Unprotected rollbacks older than `ts` may be dropped when a newer rollback lands.
    pub(crate) fn is_collapsible_before(&self, ts: u64) -> bool {
        matches!(self.kind, WriteKind::Rollback { protected: false }) && self.ts < ts
    }
}
