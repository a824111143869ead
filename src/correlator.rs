//! Ties an asynchronous reply back to the call that is waiting for it.
//!
//! The page side correlates bridge responses with the requests it sent; the host side
//! uses the same structure to correlate a human decision with the prompt it raised.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::bridge::protocol::{OperationTag, RequestId};

/// Process-wide so ids never collide between documents or prompts.
static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(1);

pub fn next_request_id() -> RequestId {
    RequestId(REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed))
}

/// Snapshot of something still waiting for its reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub id: RequestId,
    pub tag: OperationTag,
    pub created_at: DateTime<Utc>,
}

struct Waiter<T> {
    record: PendingRequest,
    sender: oneshot::Sender<T>,
}

pub struct Correlator<T> {
    pending: Mutex<HashMap<RequestId, Waiter<T>>>,
}

impl<T> Default for Correlator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Correlator<T> {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a waiter. Must happen before the request is sent so a fast reply
    /// cannot slip past.
    pub fn register(&self, tag: OperationTag) -> (RequestId, oneshot::Receiver<T>) {
        let id = next_request_id();
        let (sender, receiver) = oneshot::channel();
        let record = PendingRequest {
            id,
            tag,
            created_at: Utc::now(),
        };
        self.pending.lock().insert(id, Waiter { record, sender });
        (id, receiver)
    }

    /// Hands `value` to its waiter and forgets it.
    ///
    /// Without an id (legacy peers) the oldest waiter for `tag` is chosen. Returns the
    /// value back when nobody is waiting, e.g. a reply arriving after its timeout.
    pub fn resolve(&self, id: Option<RequestId>, tag: OperationTag, value: T) -> Result<RequestId, T> {
        let waiter = {
            let mut pending = self.pending.lock();
            let key = match id {
                Some(id) => pending.get(&id).filter(|w| w.record.tag == tag).map(|_| id),
                None => pending
                    .values()
                    .filter(|w| w.record.tag == tag)
                    .min_by_key(|w| w.record.id)
                    .map(|w| w.record.id),
            };
            match key {
                Some(key) => pending.remove(&key),
                None => None,
            }
        };

        match waiter {
            Some(waiter) => {
                let id = waiter.record.id;
                waiter.sender.send(value).map(|_| id)
            }
            None => Err(value),
        }
    }

    /// Drops a waiter without resolving it (timeout). Returns whether it existed.
    pub fn cancel(&self, id: RequestId) -> bool {
        self.pending.lock().remove(&id).is_some()
    }

    /// Drops every waiter; their receivers observe a closed channel.
    pub fn abandon_all(&self) -> usize {
        let drained: Vec<_> = self.pending.lock().drain().collect();
        drained.len()
    }

    pub fn contains(&self, id: RequestId) -> bool {
        self.pending.lock().contains_key(&id)
    }

    pub fn in_flight(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn pending(&self) -> Vec<PendingRequest> {
        let mut records: Vec<_> = self.pending.lock().values().map(|w| w.record.clone()).collect();
        records.sort_by_key(|r| r.id);
        records
    }
}
