//! Serial background poster.
//!
//! Keeps at most one drain job in flight on the executor. The drain pulls
//! pending posts in FIFO order and lingers briefly on an empty queue
//! before parking, so bursts reuse the running job instead of submitting
//! a new one per event.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::bus::WeakBus;
use crate::executor::Executor;
use crate::posters::pending::{PendingPost, PendingPostQueue};
use crate::posters::Poster;

const IDLE_LINGER: Duration = Duration::from_secs(1);

pub(crate) struct BackgroundPoster {
    shared: Arc<Shared>,
}

struct Shared {
    queue: PendingPostQueue,
    running: Mutex<bool>,
    bus: WeakBus,
    executor: Arc<dyn Executor>,
}

impl BackgroundPoster {
    pub(crate) fn new(bus: WeakBus, executor: Arc<dyn Executor>) -> Self {
        Self {
            shared: Arc::new(Shared {
                queue: PendingPostQueue::default(),
                running: Mutex::new(false),
                bus,
                executor,
            }),
        }
    }
}

impl Poster for BackgroundPoster {
    fn enqueue(&self, pending: PendingPost) {
        self.shared.queue.enqueue(pending);
        let mut running = self.shared.running.lock();
        if !*running {
            *running = true;
            drop(running);
            let shared = Arc::clone(&self.shared);
            self.shared.executor.execute(Box::new(move || Shared::run(&shared)));
        }
    }
}

impl Shared {
    fn run(shared: &Arc<Shared>) {
        // Clears the running flag even when a rethrowing handler unwinds
        // through the drain.
        let _reset = RunningReset(&shared.running);
        loop {
            let pending = match shared.queue.poll_timeout(IDLE_LINGER) {
                Some(pending) => pending,
                None => {
                    // Recheck under the flag lock so an enqueue racing the
                    // park cannot strand its post.
                    let mut running = shared.running.lock();
                    match shared.queue.poll() {
                        Some(pending) => {
                            drop(running);
                            pending
                        }
                        None => {
                            *running = false;
                            return;
                        }
                    }
                }
            };
            match shared.bus.upgrade() {
                Some(bus) => bus.invoke_subscriber(pending),
                None => return,
            }
        }
    }
}

struct RunningReset<'a>(&'a Mutex<bool>);

impl Drop for RunningReset<'_> {
    fn drop(&mut self) {
        *self.0.lock() = false;
    }
}
