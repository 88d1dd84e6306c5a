#![doc(
    html_logo_url = "https://raw.githubusercontent.com/vertexclique/kovan/master/art/kovan-square.svg"
)]
//! # Kovan Txn
//!
//! `kovan-txn` is the transactional core of a Percolator-style distributed
//! transaction protocol: optimistic and pessimistic two-phase commit over a
//! versioned key store, with lazy resolution of the locks that crashed or
//! slow transactions leave behind.
//!
//! ## How it works
//!
//! Every key keeps one lock slot, a column of write records and a set of data
//! versions, all mutated under a per-key critical section by [`KeyStore`].
//!
//! - **Coordinators** ([`TxnCoordinator`]) are pure state machines. They take
//!   timestamps from a [`TimestampOracle`] and turn responses into requests.
//! - **Servers** ([`ServerHandler`]) map requests onto `KeyStore` operations.
//!   Requests may be duplicated and arrive in any order; every operation is
//!   idempotent.
//! - **Commit** writes only the primary key. The primary's write record is the
//!   single source of truth; secondaries are committed or rolled back by the
//!   [`StaleLockResolver`] when someone trips over their locks.
//!
//! [`Percolator`] wires these together with a pool of server workers and an
//! in-process at-least-once network.
//!
//! ## Example
//!
//! ```rust
//! use kovan_txn::Percolator;
//!
//! let db = Percolator::new();
//!
//! // 1. Commit a write to two keys; "a" is the primary
//! let mut txn = db.begin_optimistic();
//! txn.write("a").write("b");
//! let commit_ts = txn.commit().unwrap();
//!
//! // 2. A snapshot read sees the version written by that transaction
//! let start_ts = db.read("a").unwrap().expect("a is committed");
//! assert_eq!(db.store().write_for("a", start_ts).unwrap().ts, commit_ts);
//!
//! // 3. Reading "b" resolves its leftover lock from the primary
//! assert_eq!(db.read("b").unwrap(), Some(start_ts));
//! ```

pub mod backoff;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod invariants;
mod lock;
pub mod message;
mod network;
pub mod percolator;
pub mod resolver;
pub mod server;
pub mod storage;
mod timestamp_oracle;
mod write;

pub use crate::backoff::{BackoffAction, BackoffStrategy, DefaultBackoff, NoBackoff};
pub use crate::config::Config;
pub use crate::coordinator::{AbortReason, TxnCoordinator, TxnKind, TxnState};
pub use crate::error::TxnError;
pub use crate::invariants::{InvariantViolation, OutcomeLog, check_store};
pub use crate::lock::{LockInfo, LockKind};
pub use crate::message::{Request, Response};
pub use crate::percolator::{Percolator, Txn};
pub use crate::resolver::StaleLockResolver;
pub use crate::server::{Effects, ServerHandler};
pub use crate::storage::{
    CommitOutcome, KeyRecord, KeyStore, LockKeyOutcome, PrewriteOutcome, ReadOutcome,
    RollbackOutcome,
};
pub use crate::timestamp_oracle::{LocalTimestampOracle, MockTimestampOracle, TimestampOracle};
pub use crate::write::{WriteKind, WriteRecord};
