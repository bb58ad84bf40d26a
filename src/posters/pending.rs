//! Pooled pending posts and the FIFO queue the posters drain.
//!
//! A `PendingPost` is one (subscription, event) delivery waiting for its
//! poster. Shells are pooled process-wide so steady-state delivery does
//! not allocate; the pool is capped to keep a burst from pinning memory.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::event::{Event, Projection};
use crate::registry::Subscription;

const POOL_CAP: usize = 10_000;

static POOL: Mutex<Vec<PendingPost>> = Mutex::new(Vec::new());

/// One queued delivery: the subscription, the event, and the projection
/// path from the event's concrete type to the handler's declared type.
pub struct PendingPost {
    subscription: Option<Arc<Subscription>>,
    event: Option<Arc<dyn Event>>,
    event_path: Option<Arc<[Projection]>>,
}

impl PendingPost {
    /// Fetches a shell from the pool and loads it.
    pub(crate) fn obtain(
        subscription: Arc<Subscription>,
        event: Arc<dyn Event>,
        event_path: Arc<[Projection]>,
    ) -> PendingPost {
        let mut pending = POOL
            .lock()
            .pop()
            .unwrap_or(PendingPost { subscription: None, event: None, event_path: None });
        pending.subscription = Some(subscription);
        pending.event = Some(event);
        pending.event_path = Some(event_path);
        pending
    }

    /// Unloads the delivery, leaving an empty shell.
    pub(crate) fn take(
        &mut self,
    ) -> Option<(Arc<Subscription>, Arc<dyn Event>, Arc<[Projection]>)> {
        match (self.subscription.take(), self.event.take(), self.event_path.take()) {
            (Some(subscription), Some(event), Some(path)) => Some((subscription, event, path)),
            _ => None,
        }
    }

    /// Returns the shell to the pool.
    pub(crate) fn release(mut self) {
        self.subscription = None;
        self.event = None;
        self.event_path = None;
        let mut pool = POOL.lock();
        if pool.len() < POOL_CAP {
            pool.push(self);
        }
    }
}

/// FIFO of pending posts with blocking and non-blocking poll.
#[derive(Default)]
pub(crate) struct PendingPostQueue {
    queue: Mutex<VecDeque<PendingPost>>,
    ready: Condvar,
}

impl PendingPostQueue {
    pub(crate) fn enqueue(&self, pending: PendingPost) {
        self.queue.lock().push_back(pending);
        self.ready.notify_one();
    }

    pub(crate) fn poll(&self) -> Option<PendingPost> {
        self.queue.lock().pop_front()
    }

    /// Polls, waiting up to `timeout` for an enqueue when empty.
    pub(crate) fn poll_timeout(&self, timeout: Duration) -> Option<PendingPost> {
        let mut queue = self.queue.lock();
        if let Some(pending) = queue.pop_front() {
            return Some(pending);
        }
        let _ = self.ready.wait_for(&mut queue, timeout);
        queue.pop_front()
    }
}
