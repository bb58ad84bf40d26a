//! # The bus facade and dispatcher.
//!
//! [`EventBus`] ties the subsystems together: handler discovery at
//! registration, hierarchy expansion and priority-ordered dispatch at
//! post time, sticky replay, cancellation, and the thread-mode policy
//! that routes each delivery inline or through a poster.
//!
//! ## Dispatch flow
//! ```text
//! post(event)
//!   └─► per-thread queue ──► drain (outermost post only)
//!         └─► expand event type ──► per-type subscription snapshot
//!               └─► for each subscription, by priority:
//!                     Posting      invoke inline
//!                     Main         inline on main, else main poster
//!                     MainOrdered  main poster, else inline
//!                     Background   serial poster from main, else inline
//!                     Async        async poster, always
//! ```
//!
//! A handler that posts again on the same thread appends to the queue;
//! the nested event dispatches after the current one finishes. Handlers
//! that panic are isolated per the builder's panic policy.
//!
//! The bus handle is a cheap clone; all clones share one instance.

use std::any::{Any, TypeId};
use std::fmt;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;
use tracing::Level;

use crate::builder::EventBusBuilder;
use crate::error::EventBusError;
use crate::event::{Event, NoSubscriberEvent, Projection, SubscriberPanicEvent};
use crate::executor::Executor;
use crate::finder::HandlerFinder;
use crate::handler::{HandlerDescriptor, ThreadMode};
use crate::hierarchy;
use crate::logging::{Logger, TracingLogger};
use crate::posters::{
    AsyncPoster, BackgroundPoster, MainThreadSupport, PendingPost, Poster,
};
use crate::posting;
use crate::registry::{Registry, Subscription};
use crate::sticky::StickyStore;
use crate::subscriber::Subscriber;

static NEXT_BUS_ID: AtomicU64 = AtomicU64::new(0);
static DEFAULT_INSTANCE: OnceLock<EventBus> = OnceLock::new();

/// In-process publish/subscribe bus dispatching by runtime event type.
///
/// Events are posted with [`post`](EventBus::post) and delivered to every
/// registered handler whose declared event type matches the event's type
/// or one of its declared supertypes. Handles are cheap clones sharing
/// one instance; each instance is an isolated delivery scope.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

/// Non-owning bus handle used by posters.
pub(crate) struct WeakBus(Weak<BusInner>);

impl WeakBus {
    pub(crate) fn upgrade(&self) -> Option<EventBus> {
        self.0.upgrade().map(|inner| EventBus { inner })
    }
}

struct BusInner {
    id: u64,
    registry: Mutex<Registry>,
    sticky: StickyStore,
    finder: HandlerFinder,
    main_thread_support: Option<Arc<dyn MainThreadSupport>>,
    main_poster: OnceLock<Arc<dyn Poster>>,
    background_poster: BackgroundPoster,
    async_poster: AsyncPoster,
    logger: Arc<dyn Logger>,
    event_inheritance: bool,
    log_subscriber_panics: bool,
    log_no_subscriber_events: bool,
    send_subscriber_panic_event: bool,
    send_no_subscriber_event: bool,
    rethrow_subscriber_panics: bool,
}

impl EventBus {
    /// Builds a bus with default options.
    pub fn new() -> Self {
        EventBusBuilder::default().build()
    }

    /// Starts configuring a bus.
    pub fn builder() -> EventBusBuilder {
        EventBusBuilder::default()
    }

    /// The process-wide default instance, built on first use with default
    /// options unless one was installed through
    /// [`EventBusBuilder::install_default_instance`].
    pub fn default_instance() -> &'static EventBus {
        DEFAULT_INSTANCE.get_or_init(EventBus::new)
    }

    pub(crate) fn install_default(bus: EventBus) -> Result<EventBus, EventBusError> {
        DEFAULT_INSTANCE
            .set(bus.clone())
            .map_err(|_| EventBusError::DefaultInstanceAlreadySet)?;
        Ok(bus)
    }

    pub(crate) fn from_builder(builder: EventBusBuilder) -> EventBus {
        let executor: Arc<dyn Executor> = builder.executor.unwrap_or_else(default_executor);
        let logger: Arc<dyn Logger> =
            builder.logger.unwrap_or_else(|| Arc::new(TracingLogger));
        let inner = Arc::new_cyclic(|weak: &Weak<BusInner>| BusInner {
            id: NEXT_BUS_ID.fetch_add(1, Ordering::Relaxed),
            registry: Mutex::new(Registry::default()),
            sticky: StickyStore::default(),
            finder: HandlerFinder::new(
                builder.indexes,
                builder.strict_handler_verification,
                builder.ignore_registered_indexes,
            ),
            main_thread_support: builder.main_thread_support,
            main_poster: OnceLock::new(),
            background_poster: BackgroundPoster::new(WeakBus(weak.clone()), Arc::clone(&executor)),
            async_poster: AsyncPoster::new(WeakBus(weak.clone()), Arc::clone(&executor)),
            logger,
            event_inheritance: builder.event_inheritance,
            log_subscriber_panics: builder.log_subscriber_panics,
            log_no_subscriber_events: builder.log_no_subscriber_events,
            send_subscriber_panic_event: builder.send_subscriber_panic_event,
            send_no_subscriber_event: builder.send_no_subscriber_event,
            rethrow_subscriber_panics: builder.rethrow_subscriber_panics,
        });
        let bus = EventBus { inner };
        if let Some(support) = bus.inner.main_thread_support.clone() {
            let poster = support.create_poster(&bus);
            let _ = bus.inner.main_poster.set(poster);
        }
        bus
    }

    pub(crate) fn downgrade(&self) -> WeakBus {
        WeakBus(Arc::downgrade(&self.inner))
    }

    /// Registers the subscriber to receive events until
    /// [`unregister`](EventBus::unregister). The bus retains the `Arc`
    /// for the whole registration.
    ///
    /// Fails with `NoHandlers` when the subscriber type declares no
    /// handlers, with `AlreadyRegistered` on a duplicate registration,
    /// and with `IllegalHandler` under strict verification.
    pub fn register<S: Subscriber>(&self, subscriber: Arc<S>) -> Result<(), EventBusError> {
        let subscriber: Arc<dyn Subscriber> = subscriber;
        let descriptors = self.inner.finder.find(subscriber.subscriber_info())?;
        let mut replays: Vec<StickyReplay> = Vec::new();
        {
            let mut registry = self.inner.registry.lock();
            for descriptor in descriptors.iter() {
                let subscription = registry.add(&subscriber, descriptor.clone())?;
                if descriptor.sticky() {
                    self.collect_sticky_replays(&subscription, descriptor, &mut replays);
                }
            }
        }
        // Sticky replay bypasses the posting pipeline: there is no
        // posting context, so cancel_event_delivery is inoperative here.
        if !replays.is_empty() {
            let is_main_thread = self.is_main_thread();
            for (subscription, event, path) in replays {
                self.post_to_subscription(&subscription, event, path, is_main_thread);
            }
        }
        Ok(())
    }

    fn collect_sticky_replays(
        &self,
        subscription: &Arc<Subscription>,
        descriptor: &HandlerDescriptor,
        replays: &mut Vec<StickyReplay>,
    ) {
        let declared = descriptor.event_info();
        if self.inner.event_inheritance {
            // A stored event replays whenever the handler's declared type
            // appears in the stored event's expansion.
            for event in self.inner.sticky.entries() {
                let types = hierarchy::expand(event.event_type());
                if let Some(matched) = types.iter().find(|t| t.info.id() == declared.id()) {
                    replays.push((
                        Arc::clone(subscription),
                        Arc::clone(&event),
                        Arc::clone(&matched.path),
                    ));
                }
            }
        } else if let Some(event) = self.inner.sticky.get(declared.id()) {
            replays.push((Arc::clone(subscription), event, hierarchy::identity_path()));
        }
    }

    /// Unregisters the subscriber from all event types. Unknown
    /// subscribers produce a warning, not an error.
    pub fn unregister<S: Subscriber>(&self, subscriber: &Arc<S>) {
        let id = Arc::as_ptr(subscriber) as *const () as usize;
        let known = self.inner.registry.lock().remove_all_for(id);
        if !known {
            self.inner.logger.log(
                Level::WARN,
                &format!(
                    "subscriber '{}' to unregister was not registered before",
                    subscriber.subscriber_info().subscriber_type
                ),
            );
        }
    }

    /// True between `register` and `unregister` of this subscriber.
    pub fn is_registered<S: Subscriber>(&self, subscriber: &Arc<S>) -> bool {
        let id = Arc::as_ptr(subscriber) as *const () as usize;
        self.inner.registry.lock().is_registered(id)
    }

    /// Posts the event to the bus.
    ///
    /// Events posted from inside a handler on the same thread are queued
    /// and dispatched after the current event completes.
    pub fn post<E: Event>(&self, event: E) {
        self.post_dyn(Arc::new(event));
    }

    /// Posts an already type-erased event.
    pub fn post_dyn(&self, event: Arc<dyn Event>) {
        let bus_id = self.inner.id;
        let is_main_thread = self.is_main_thread();
        let drain = posting::with_state(bus_id, |state| {
            state.queue.push_back(event);
            if state.is_posting {
                false
            } else {
                debug_assert!(!state.canceled, "cancel flag leaked from a previous dispatch");
                state.is_posting = true;
                state.is_main_thread = is_main_thread;
                true
            }
        });
        if !drain {
            return;
        }
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            while let Some(next) = posting::with_state(bus_id, |state| state.queue.pop_front()) {
                self.post_single_event(next);
            }
        }));
        posting::with_state(bus_id, |state| {
            state.is_posting = false;
            state.is_main_thread = false;
        });
        if let Err(payload) = outcome {
            resume_unwind(payload);
        }
    }

    /// Posts the event and retains it for replay to sticky handlers that
    /// register later. The newest event of each type wins.
    pub fn post_sticky<E: Event>(&self, event: E) {
        let event: Arc<dyn Event> = Arc::new(event);
        self.inner.sticky.put(Arc::clone(&event));
        // Posted after it is stored, in case a subscriber removes it
        // immediately.
        self.post_dyn(event);
    }

    /// Cancels further delivery of the event currently being dispatched.
    ///
    /// Valid only from inside a `Posting`-mode handler on the posting
    /// thread, and only for the event that handler is receiving.
    pub fn cancel_event_delivery(&self, event: &dyn Event) -> Result<(), EventBusError> {
        posting::with_state(self.inner.id, |state| {
            if !state.is_posting {
                return Err(EventBusError::NotPosting);
            }
            let current = state.current_event.as_ref().ok_or(EventBusError::WrongEvent)?;
            let canceled_addr = view_address(event.as_any());
            if view_address(current.as_any()) != canceled_addr
                && state.current_view != canceled_addr
            {
                return Err(EventBusError::WrongEvent);
            }
            let subscription =
                state.current_subscription.as_ref().ok_or(EventBusError::WrongEvent)?;
            if subscription.descriptor().mode() != ThreadMode::Posting {
                return Err(EventBusError::WrongThreadMode);
            }
            state.canceled = true;
            Ok(())
        })
    }

    /// The retained sticky event of type `E`, if any.
    pub fn sticky_event<E: Event>(&self) -> Option<Arc<E>> {
        self.inner.sticky.get(TypeId::of::<E>()).and_then(downcast_event::<E>)
    }

    /// Removes and returns the retained sticky event of type `E`.
    pub fn remove_sticky<E: Event>(&self) -> Option<Arc<E>> {
        self.inner.sticky.remove(TypeId::of::<E>()).and_then(downcast_event::<E>)
    }

    /// Removes the retained sticky event iff it equals `event`.
    pub fn remove_sticky_event<E: Event + PartialEq>(&self, event: &E) -> bool {
        self.inner.sticky.remove_if_equal(event)
    }

    /// Drops all retained sticky events.
    pub fn remove_all_sticky(&self) {
        self.inner.sticky.clear();
    }

    /// True when any subscription exists for `E` or one of the types its
    /// expansion reaches.
    pub fn has_subscriber_for<E: Event>(&self) -> bool {
        let types = hierarchy::expand(E::event_type_of());
        let registry = self.inner.registry.lock();
        types.iter().any(|entry| {
            registry
                .snapshot(entry.info.id())
                .is_some_and(|list| !list.is_empty())
        })
    }

    /// Invokes a queued delivery if its subscription is still active.
    ///
    /// Called by posters; recycles the pending post. Skipping retired
    /// subscriptions is the race defense between `unregister` and a
    /// delivery already enqueued on another thread.
    pub fn invoke_subscriber(&self, mut pending: PendingPost) {
        let delivery = pending.take();
        pending.release();
        if let Some((subscription, event, path)) = delivery {
            if subscription.is_active() {
                self.invoke_subscriber_now(&subscription, &event, &path);
            }
        }
    }

    fn post_single_event(&self, event: Arc<dyn Event>) {
        let info = event.event_type();
        let mut subscription_found = false;
        if self.inner.event_inheritance {
            let types = hierarchy::expand(info);
            for entry in types.iter() {
                subscription_found |= self.post_single_event_for_type(
                    &event,
                    entry.info.id(),
                    Arc::clone(&entry.path),
                );
            }
        } else {
            subscription_found =
                self.post_single_event_for_type(&event, info.id(), hierarchy::identity_path());
        }
        if !subscription_found {
            if self.inner.log_no_subscriber_events {
                self.inner.logger.log(
                    Level::DEBUG,
                    &format!("no subscribers registered for event {}", info.name),
                );
            }
            let id = info.id();
            if self.inner.send_no_subscriber_event
                && id != TypeId::of::<NoSubscriberEvent>()
                && id != TypeId::of::<SubscriberPanicEvent>()
            {
                self.post_dyn(Arc::new(NoSubscriberEvent {
                    event_bus: self.clone(),
                    original_event: event,
                }));
            }
        }
    }

    fn post_single_event_for_type(
        &self,
        event: &Arc<dyn Event>,
        event_id: TypeId,
        path: Arc<[Projection]>,
    ) -> bool {
        let snapshot = self.inner.registry.lock().snapshot(event_id);
        let Some(subscriptions) = snapshot else {
            return false;
        };
        if subscriptions.is_empty() {
            return false;
        }
        let bus_id = self.inner.id;
        let view_addr = view_address(hierarchy::apply(event.as_any(), &path));
        for subscription in subscriptions.iter() {
            let is_main_thread = posting::with_state(bus_id, |state| {
                state.current_event = Some(Arc::clone(event));
                state.current_subscription = Some(Arc::clone(subscription));
                state.current_view = view_addr;
                state.is_main_thread
            });
            let delivery = catch_unwind(AssertUnwindSafe(|| {
                self.post_to_subscription(
                    subscription,
                    Arc::clone(event),
                    Arc::clone(&path),
                    is_main_thread,
                );
            }));
            let aborted = posting::with_state(bus_id, |state| {
                let aborted = state.canceled;
                state.current_event = None;
                state.current_subscription = None;
                state.current_view = 0;
                state.canceled = false;
                aborted
            });
            if let Err(payload) = delivery {
                resume_unwind(payload);
            }
            if aborted {
                break;
            }
        }
        true
    }

    fn post_to_subscription(
        &self,
        subscription: &Arc<Subscription>,
        event: Arc<dyn Event>,
        path: Arc<[Projection]>,
        is_main_thread: bool,
    ) {
        match subscription.descriptor().mode() {
            ThreadMode::Posting => self.invoke_subscriber_now(subscription, &event, &path),
            ThreadMode::Main => {
                if is_main_thread {
                    self.invoke_subscriber_now(subscription, &event, &path);
                } else if let Some(poster) = self.inner.main_poster.get() {
                    poster.enqueue(PendingPost::obtain(Arc::clone(subscription), event, path));
                } else {
                    self.invoke_subscriber_now(subscription, &event, &path);
                }
            }
            ThreadMode::MainOrdered => {
                if let Some(poster) = self.inner.main_poster.get() {
                    poster.enqueue(PendingPost::obtain(Arc::clone(subscription), event, path));
                } else {
                    // Without main-thread support the ordering guarantee
                    // cannot be provided; degrade to inline.
                    self.invoke_subscriber_now(subscription, &event, &path);
                }
            }
            ThreadMode::Background => {
                if is_main_thread {
                    self.inner
                        .background_poster
                        .enqueue(PendingPost::obtain(Arc::clone(subscription), event, path));
                } else {
                    self.invoke_subscriber_now(subscription, &event, &path);
                }
            }
            ThreadMode::Async => {
                self.inner
                    .async_poster
                    .enqueue(PendingPost::obtain(Arc::clone(subscription), event, path));
            }
        }
    }

    fn invoke_subscriber_now(
        &self,
        subscription: &Arc<Subscription>,
        event: &Arc<dyn Event>,
        path: &[Projection],
    ) {
        if !subscription.is_active() {
            return;
        }
        let descriptor = subscription.descriptor();
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let event_view = hierarchy::apply(event.as_any(), path);
            let receiver_view =
                hierarchy::apply(subscription.subscriber().as_any(), &descriptor.receiver_path);
            (descriptor.def.invoke)(receiver_view, event_view);
        }));
        if let Err(payload) = outcome {
            self.handle_subscriber_panic(subscription, event, payload);
        }
    }

    fn handle_subscriber_panic(
        &self,
        subscription: &Arc<Subscription>,
        event: &Arc<dyn Event>,
        payload: Box<dyn Any + Send>,
    ) {
        if let Some(panic_event) = event.as_any().downcast_ref::<SubscriberPanicEvent>() {
            // Never re-post about a panic-event handler panicking; that
            // would recurse. Log both failures and stop.
            if self.inner.log_subscriber_panics {
                let message = panic_message(payload.as_ref());
                self.inner.logger.log(
                    Level::ERROR,
                    &format!(
                        "handler {} panicked while handling SubscriberPanicEvent: {message}",
                        subscription.descriptor().signature()
                    ),
                );
                self.inner.logger.log(
                    Level::ERROR,
                    &format!(
                        "initial event {} caused panic in subscriber '{}': {}",
                        panic_event.causing_event.event_type().name,
                        panic_event.causing_subscriber.subscriber_info().subscriber_type,
                        panic_event.panic_message
                    ),
                );
            }
            return;
        }
        if self.inner.rethrow_subscriber_panics {
            resume_unwind(payload);
        }
        let message = panic_message(payload.as_ref());
        if self.inner.log_subscriber_panics {
            self.inner.logger.log(
                Level::ERROR,
                &format!(
                    "handler {} panicked while handling {}: {message}",
                    subscription.descriptor().signature(),
                    event.event_type().name
                ),
            );
        }
        if self.inner.send_subscriber_panic_event {
            self.post_dyn(Arc::new(SubscriberPanicEvent {
                event_bus: self.clone(),
                panic_message: message,
                causing_event: Arc::clone(event),
                causing_subscriber: Arc::clone(subscription.subscriber()),
            }));
        }
    }

    fn is_main_thread(&self) -> bool {
        match &self.inner.main_thread_support {
            Some(support) => support.is_main_thread(),
            None => true,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EventBus[index_count={}, event_inheritance={}]",
            self.inner.finder.index_count(),
            self.inner.event_inheritance
        )
    }
}

type StickyReplay = (Arc<Subscription>, Arc<dyn Event>, Arc<[Projection]>);

fn downcast_event<E: Event>(event: Arc<dyn Event>) -> Option<Arc<E>> {
    event.as_any_arc().downcast::<E>().ok()
}

/// Data address of a type-erased event view, for identity comparison.
fn view_address(view: &(dyn Any + Send + Sync)) -> usize {
    view as *const (dyn Any + Send + Sync) as *const u8 as usize
}

/// Extract a human-readable message from a caught panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}

fn default_executor() -> Arc<dyn Executor> {
    #[cfg(feature = "tokio")]
    {
        Arc::new(crate::executor::TokioExecutor::default())
    }
    #[cfg(not(feature = "tokio"))]
    {
        Arc::new(crate::executor::InlineExecutor)
    }
}
