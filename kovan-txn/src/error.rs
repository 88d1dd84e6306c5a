use crate::coordinator::AbortReason;
use thiserror::Error;

/// Errors surfaced by the blocking transaction API.
///
/// Conflicts inside the protocol are never errors; they arrive as response
/// values and only become a `TxnError` once the coordinator reaches `Aborted`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TxnError {
    /// The transaction reached the `aborted` state.
    #[error("transaction {start_ts} aborted: {reason}")]
    Aborted { start_ts: u64, reason: AbortReason },
    /// Commit was requested on a transaction without keys.
    #[error("transaction has no keys to commit")]
    EmptyTransaction,
    /// The engine stopped before the transaction reached a terminal state.
    #[error("engine shut down while transaction {start_ts} was in flight")]
    Disconnected { start_ts: u64 },
    /// A snapshot read stayed blocked by a lock after the backoff gave up.
    #[error("read of key '{key}' blocked by lock of transaction {start_ts}")]
    ReadBlocked { key: String, start_ts: u64 },
}
