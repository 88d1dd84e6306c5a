use crate::backoff::BackoffAction;
use crate::config::Config;
use crate::coordinator::{TxnCoordinator, TxnKind, TxnState};
use crate::error::TxnError;
use crate::invariants::{InvariantViolation, OutcomeLog, check_store};
use crate::message::Request;
use crate::network::{Envelope, Network};
use crate::resolver::StaleLockResolver;
use crate::server::ServerHandler;
use crate::storage::{KeyStore, ReadOutcome};
use crate::timestamp_oracle::{LocalTimestampOracle, TimestampOracle};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded, select};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// How often a waiting coordinator checks whether the engine shut down.
const SHUTDOWN_POLL: Duration = Duration::from_millis(50);

struct Inner {
    store: Arc<KeyStore>,
    resolver: Arc<StaleLockResolver>,
    handler: ServerHandler,
    network: Network,
    ts_oracle: Arc<dyn TimestampOracle>,
    outcomes: OutcomeLog,
    config: Config,
    shutdown: AtomicBool,
}

impl Inner {
    /// Handle one dequeued request and push everything it produced.
    fn process(&self, envelope: Envelope) {
        let effects = self.handler.handle(&envelope.request);
        for response in effects.responses {
            if response.is_abort() {
                debug!(kind = envelope.request.kind(), ?response, "request answered with abort");
            }
            self.outcomes.record(&envelope.request, &response);
            self.network.deliver(response);
        }
        for request in effects.requests {
            self.network.send(request);
        }
        if effects.blocked {
            self.wait_or_give_up(envelope);
        }
        // Last, so the in-flight count covers every follow-up.
        self.network.complete();
    }

    fn wait_or_give_up(&self, envelope: Envelope) {
        match self.config.backoff.backoff(envelope.attempt) {
            BackoffAction::Retry => self.network.redeliver(envelope),
            BackoffAction::Yield => {
                thread::yield_now();
                self.network.redeliver(envelope);
            }
            BackoffAction::Abort => {
                warn!(
                    kind = envelope.request.kind(),
                    start_ts = envelope.request.start_ts(),
                    attempts = envelope.attempt,
                    "lock wait exhausted"
                );
                if let Some(response) = envelope.request.wait_abort_response() {
                    self.network.deliver(response);
                }
            }
        }
    }

    fn run_worker(&self, id: usize, shutdown: Receiver<()>) {
        debug!(worker = id, "server worker started");
        loop {
            select! {
                recv(self.network.requests()) -> envelope => match envelope {
                    Ok(envelope) => self.process(envelope),
                    Err(_) => break,
                },
                recv(shutdown) -> _ => break,
            }
        }
        debug!(worker = id, "server worker stopped");
    }
}

/// Percolator engine: a key store served by a pool of worker threads that
/// race on a shared, at-least-once request queue.
pub struct Percolator {
    inner: Arc<Inner>,
    workers: Vec<JoinHandle<()>>,
    // Dropping the sender disconnects every worker's shutdown receiver.
    shutdown_tx: Option<Sender<()>>,
}

impl fmt::Debug for Percolator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Percolator")
            .field("config", &self.inner.config)
            .field("workers", &self.workers.len())
            .field("in_flight", &self.inner.network.in_flight())
            .finish()
    }
}

impl Default for Percolator {
    fn default() -> Self {
        Self::new()
    }
}

impl Percolator {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self::with_config_and_oracle(config, Arc::new(LocalTimestampOracle::new()))
    }

    pub fn with_oracle(ts_oracle: Arc<dyn TimestampOracle>) -> Self {
        Self::with_config_and_oracle(Config::default(), ts_oracle)
    }

    pub fn with_config_and_oracle(config: Config, ts_oracle: Arc<dyn TimestampOracle>) -> Self {
        // Fields are public, so the builder bounds may have been bypassed.
        let config = config.normalized();
        let store = Arc::new(KeyStore::new(ts_oracle.clone()));
        let resolver = Arc::new(StaleLockResolver::new());
        let inner = Arc::new(Inner {
            handler: ServerHandler::new(store.clone(), resolver.clone()),
            network: Network::new(config.duplicate_probability),
            store,
            resolver,
            ts_oracle,
            outcomes: OutcomeLog::new(),
            config,
            shutdown: AtomicBool::new(false),
        });

        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
        let workers = (0..inner.config.workers)
            .map(|id| {
                let inner = inner.clone();
                let shutdown = shutdown_rx.clone();
                thread::spawn(move || inner.run_worker(id, shutdown))
            })
            .collect();

        info!(
            workers = inner.config.workers,
            duplicate_probability = inner.config.duplicate_probability,
            "percolator engine started"
        );
        Self {
            inner,
            workers,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn store(&self) -> &Arc<KeyStore> {
        &self.inner.store
    }

    pub fn ts_oracle(&self) -> &Arc<dyn TimestampOracle> {
        &self.inner.ts_oracle
    }

    pub fn resolver(&self) -> &Arc<StaleLockResolver> {
        &self.inner.resolver
    }

    /// Commit decisions handed out by the servers so far.
    pub fn outcomes(&self) -> &OutcomeLog {
        &self.inner.outcomes
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn begin(&self, kind: TxnKind) -> Txn {
        Txn {
            inner: self.inner.clone(),
            kind,
            primary: None,
            keys: BTreeSet::new(),
        }
    }

    pub fn begin_optimistic(&self) -> Txn {
        self.begin(TxnKind::Optimistic)
    }

    pub fn begin_pessimistic(&self) -> Txn {
        self.begin(TxnKind::Pessimistic)
    }

    /// Put a raw request on the network.
    ///
    /// Nobody waits for its responses; they are dropped. Useful for playing
    /// the part of a client that disappears halfway through a transaction.
    pub fn submit(&self, request: Request) {
        self.inner.network.send(request);
    }

    /// Snapshot read at a fresh timestamp.
    ///
    /// Returns the `start_ts` of the visible committed version. A prewrite
    /// lock at or below the read timestamp is handed to the stale lock
    /// resolver and the read is retried under the configured backoff.
    pub fn read(&self, key: &str) -> Result<Option<u64>, TxnError> {
        let read_ts = self.inner.ts_oracle.get_timestamp();
        let mut attempt = 0u32;
        loop {
            let lock = match self.inner.store.read_version(key, read_ts) {
                ReadOutcome::Version(start_ts) => return Ok(Some(start_ts)),
                ReadOutcome::NotFound => return Ok(None),
                ReadOutcome::Locked(lock) => lock,
            };
            if let Some(cleanup) = self.inner.resolver.on_blocked(&lock) {
                self.inner.network.send(cleanup);
            }
            match self.inner.config.backoff.backoff(attempt) {
                BackoffAction::Retry => {}
                BackoffAction::Yield => thread::yield_now(),
                BackoffAction::Abort => {
                    return Err(TxnError::ReadBlocked {
                        key: key.to_string(),
                        start_ts: lock.start_ts,
                    });
                }
            }
            attempt += 1;
        }
    }

    /// Block until every queued request, follow-up and redelivery is handled.
    pub fn wait_idle(&self) {
        self.inner.network.wait_idle();
    }

    /// Check the store and the recorded commit decisions for safety violations.
    ///
    /// Call after [`wait_idle`](Self::wait_idle) for a consistent verdict.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        check_store(&self.inner.store)?;
        self.inner.outcomes.check(&self.inner.store)
    }
}

impl Drop for Percolator {
    fn drop(&mut self) {
        info!(in_flight = self.inner.network.in_flight(), "percolator engine shutting down");
        self.inner.shutdown.store(true, Ordering::SeqCst);
        drop(self.shutdown_tx.take());
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                warn!("server worker panicked");
            }
        }
    }
}

/// A transaction being assembled. Nothing reaches the servers before
/// [`commit`](Txn::commit), so dropping a `Txn` leaves no trace.
pub struct Txn {
    inner: Arc<Inner>,
    kind: TxnKind,
    primary: Option<String>,
    keys: BTreeSet<String>,
}

impl fmt::Debug for Txn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Txn")
            .field("kind", &self.kind)
            .field("primary", &self.primary)
            .field("keys", &self.keys)
            .finish()
    }
}

impl Txn {
    pub fn kind(&self) -> TxnKind {
        self.kind
    }

    /// The first key written.
    pub fn primary(&self) -> Option<&str> {
        self.primary.as_deref()
    }

    pub fn keys(&self) -> &BTreeSet<String> {
        &self.keys
    }

    /// Add `key` to the write set. The first key becomes the primary.
    pub fn write(&mut self, key: impl Into<String>) -> &mut Self {
        let key = key.into();
        if self.primary.is_none() {
            self.primary = Some(key.clone());
        }
        self.keys.insert(key);
        self
    }

    /// Run the transaction to a terminal state and return its `commit_ts`.
    ///
    /// Returning `Ok` means the primary is committed; secondaries may still
    /// be locked and are resolved by later accessors.
    pub fn commit(self) -> Result<u64, TxnError> {
        let Some(primary) = self.primary else {
            return Err(TxnError::EmptyTransaction);
        };
        let inner = self.inner;
        let oracle = inner.ts_oracle.as_ref();

        let mut coordinator = TxnCoordinator::new(self.kind, primary, self.keys);
        let requests = coordinator.start(oracle);
        let start_ts = coordinator.start_ts();

        let responses = inner.network.register(start_ts);
        inner
            .outcomes
            .register(start_ts, coordinator.primary(), coordinator.keys());
        for request in requests {
            inner.network.send(request);
        }

        let result = loop {
            match coordinator.state() {
                TxnState::Committed => break Ok(coordinator.commit_ts()),
                TxnState::Aborted => {
                    break match coordinator.abort_reason() {
                        Some(reason) => Err(TxnError::Aborted { start_ts, reason }),
                        None => Err(TxnError::Disconnected { start_ts }),
                    };
                }
                _ => {}
            }
            match responses.recv_timeout(SHUTDOWN_POLL) {
                Ok(response) => {
                    for request in coordinator.on_response(&response, oracle) {
                        inner.network.send(request);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    if inner.shutdown.load(Ordering::SeqCst) {
                        break Err(TxnError::Disconnected { start_ts });
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    break Err(TxnError::Disconnected { start_ts });
                }
            }
        };
        inner.network.unregister(start_ts);

        match &result {
            Ok(commit_ts) => debug!(start_ts, commit_ts, "transaction committed"),
            Err(err) => debug!(start_ts, %err, "transaction failed"),
        }
        result
    }
}
