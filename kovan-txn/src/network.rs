//! In-process message delivery.
//!
//! Requests go into one shared at-least-once queue that every server worker
//! pulls from, so concurrent requests race for the per-key critical sections
//! in no particular order. Responses are routed to the coordinator that owns
//! the `start_ts`; responses for a transaction nobody waits on are dropped.

use crate::message::{Request, Response};
use crossbeam_channel::{Receiver, Sender, unbounded};
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::trace;

/// A request plus the number of times it has been redelivered after blocking.
#[derive(Debug, Clone)]
pub(crate) struct Envelope {
    pub request: Request,
    pub attempt: u32,
}

pub(crate) struct Network {
    requests_tx: Sender<Envelope>,
    requests_rx: Receiver<Envelope>,
    routes: DashMap<u64, Sender<Response>>,
    in_flight: AtomicUsize,
    idle_lock: Mutex<()>,
    idle: Condvar,
    duplicate_probability: f64,
}

impl Network {
    pub fn new(duplicate_probability: f64) -> Self {
        let (requests_tx, requests_rx) = unbounded();
        Self {
            requests_tx,
            requests_rx,
            routes: DashMap::new(),
            in_flight: AtomicUsize::new(0),
            idle_lock: Mutex::new(()),
            idle: Condvar::new(),
            duplicate_probability,
        }
    }

    pub fn requests(&self) -> &Receiver<Envelope> {
        &self.requests_rx
    }

    /// Enqueue a request, possibly twice.
    pub fn send(&self, request: Request) {
        let duplicate = self.duplicate_probability > 0.0
            && rand::thread_rng().gen_bool(self.duplicate_probability);
        if duplicate {
            trace!(kind = request.kind(), start_ts = request.start_ts(), "duplicating request");
            self.enqueue(Envelope {
                request: request.clone(),
                attempt: 0,
            });
        }
        self.enqueue(Envelope {
            request,
            attempt: 0,
        });
    }

    /// Put a blocked request back at the tail of the queue.
    pub fn redeliver(&self, envelope: Envelope) {
        self.enqueue(Envelope {
            attempt: envelope.attempt + 1,
            ..envelope
        });
    }

    fn enqueue(&self, envelope: Envelope) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        // Both ends live in `self`, so the channel cannot be disconnected.
        let _ = self.requests_tx.send(envelope);
    }

    /// Called once a dequeued request and all of its follow-ups are enqueued.
    pub fn complete(&self) {
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            let _guard = self.idle_lock.lock();
            self.idle.notify_all();
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Block until no request is queued or being handled.
    pub fn wait_idle(&self) {
        let mut guard = self.idle_lock.lock();
        while self.in_flight() > 0 {
            self.idle.wait(&mut guard);
        }
    }

    /// Start routing responses for `start_ts` to the returned receiver.
    pub fn register(&self, start_ts: u64) -> Receiver<Response> {
        let (tx, rx) = unbounded();
        self.routes.insert(start_ts, tx);
        rx
    }

    pub fn unregister(&self, start_ts: u64) {
        self.routes.remove(&start_ts);
    }

    pub fn deliver(&self, response: Response) {
        let start_ts = response.start_ts();
        match self.routes.get(&start_ts) {
            Some(route) => {
                let _ = route.send(response);
            }
            None => trace!(start_ts, ?response, "no coordinator waiting, dropping response"),
        }
    }
}
