//! Parallel poster.
//!
//! Submits one executor job per pending post. No ordering between
//! deliveries, which is the point: a slow handler only ties up its own
//! job.

use std::sync::Arc;

use crate::bus::WeakBus;
use crate::executor::Executor;
use crate::posters::pending::{PendingPost, PendingPostQueue};
use crate::posters::Poster;

pub(crate) struct AsyncPoster {
    shared: Arc<Shared>,
}

struct Shared {
    queue: PendingPostQueue,
    bus: WeakBus,
    executor: Arc<dyn Executor>,
}

impl AsyncPoster {
    pub(crate) fn new(bus: WeakBus, executor: Arc<dyn Executor>) -> Self {
        Self {
            shared: Arc::new(Shared {
                queue: PendingPostQueue::default(),
                bus,
                executor,
            }),
        }
    }
}

impl Poster for AsyncPoster {
    fn enqueue(&self, pending: PendingPost) {
        self.shared.queue.enqueue(pending);
        let shared = Arc::clone(&self.shared);
        self.shared.executor.execute(Box::new(move || {
            if let Some(pending) = shared.queue.poll() {
                if let Some(bus) = shared.bus.upgrade() {
                    bus.invoke_subscriber(pending);
                }
            }
        }));
    }
}
