use std::collections::BTreeSet;

/// Lock information stored beside a key's write records.
/// This is TiKV's CF_LOCK approach: at most one lock per key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockInfo {
    pub start_ts: u64,
    pub primary_key: String,
    pub kind: LockKind,
    /// Every other key of the transaction. Only populated on the primary key's lock.
    pub secondaries: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockKind {
    /// Installed by an optimistic prewrite.
    OptimisticPrewrite,
    /// A pessimistic lock converted by the prewrite step.
    PessimisticPrewrite,
    /// Acquired by `lock_key`, before any data is written.
    PessimisticLock,
}

impl LockKind {
    /// True for locks that belong to a pessimistic transaction.
    pub fn is_pessimistic(self) -> bool {
        matches!(self, LockKind::PessimisticPrewrite | LockKind::PessimisticLock)
    }
}

impl LockInfo {
    pub fn new(start_ts: u64, primary_key: impl Into<String>, kind: LockKind) -> Self {
        Self {
            start_ts,
            primary_key: primary_key.into(),
            kind,
            secondaries: BTreeSet::new(),
        }
    }

    pub fn with_secondaries(mut self, secondaries: BTreeSet<String>) -> Self {
        self.secondaries = secondaries;
        self
    }

    /// Whether this lock sits on its own transaction's primary key.
    pub fn is_primary_of(&self, key: &str) -> bool {
        self.primary_key == key
    }

    /// Whether this lock was placed by the transaction `(primary, start_ts)`.
    pub fn belongs_to(&self, primary: &str, start_ts: u64) -> bool {
        self.start_ts == start_ts && self.primary_key == primary
    }
}
