//! Main-thread collaborator and the queued main-thread poster.
//!
//! The bus never names a GUI toolkit. Hosts that have a main thread
//! inject a [`MainThreadSupport`]; without one, main-mode handlers run
//! inline and every thread counts as the main thread.
//!
//! [`MainThreadPoster`] is a ready-made poster for hosts whose main loop
//! can run closures: it drains FIFO on the loop, yields after a short
//! cooperative slice, and reschedules itself so a deep queue cannot
//! starve the loop.

use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::bus::{EventBus, WeakBus};
use crate::posters::pending::{PendingPost, PendingPostQueue};
use crate::posters::Poster;

const MAX_DRAIN_SLICE: Duration = Duration::from_millis(10);

/// Host hook describing the main thread.
pub trait MainThreadSupport: Send + Sync {
    /// True when the calling thread is the host's main thread.
    fn is_main_thread(&self) -> bool;

    /// Builds the poster that marshals deliveries onto the main thread.
    fn create_poster(&self, bus: &EventBus) -> Arc<dyn Poster>;
}

/// Minimal main-loop seam for [`MainThreadPoster`]: run a closure on the
/// main thread, soon.
pub trait MainLoopScheduler: Send + Sync {
    fn schedule(&self, tick: Box<dyn FnOnce() + Send + 'static>);
}

/// Queued FIFO poster drained on the host main loop in cooperative
/// slices.
pub struct MainThreadPoster {
    shared: Arc<Shared>,
}

struct Shared {
    queue: PendingPostQueue,
    active: Mutex<bool>,
    scheduler: Arc<dyn MainLoopScheduler>,
    bus: WeakBus,
}

impl MainThreadPoster {
    pub fn new(bus: &EventBus, scheduler: Arc<dyn MainLoopScheduler>) -> Arc<Self> {
        Arc::new(Self {
            shared: Arc::new(Shared {
                queue: PendingPostQueue::default(),
                active: Mutex::new(false),
                scheduler,
                bus: bus.downgrade(),
            }),
        })
    }
}

impl Poster for MainThreadPoster {
    fn enqueue(&self, pending: PendingPost) {
        self.shared.queue.enqueue(pending);
        let mut active = self.shared.active.lock();
        if !*active {
            *active = true;
            drop(active);
            Shared::schedule_drain(&self.shared);
        }
    }
}

impl Shared {
    fn schedule_drain(shared: &Arc<Shared>) {
        let tick = Arc::clone(shared);
        shared.scheduler.schedule(Box::new(move || tick.drain()));
    }

    fn drain(self: Arc<Self>) {
        let started = Instant::now();
        let mut rescheduled = false;
        let outcome = catch_unwind(AssertUnwindSafe(|| loop {
            let pending = match self.queue.poll() {
                Some(pending) => pending,
                None => {
                    // Recheck under the flag lock so an enqueue racing
                    // the park cannot strand its post.
                    let mut active = self.active.lock();
                    match self.queue.poll() {
                        Some(pending) => {
                            drop(active);
                            pending
                        }
                        None => {
                            *active = false;
                            return;
                        }
                    }
                }
            };
            match self.bus.upgrade() {
                Some(bus) => bus.invoke_subscriber(pending),
                None => {
                    *self.active.lock() = false;
                    return;
                }
            }
            if started.elapsed() >= MAX_DRAIN_SLICE {
                rescheduled = true;
                Shared::schedule_drain(&self);
                return;
            }
        }));
        if let Err(payload) = outcome {
            if !rescheduled {
                *self.active.lock() = false;
            }
            resume_unwind(payload);
        }
    }
}
