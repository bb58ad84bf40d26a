//! # Bus construction.
//!
//! [`EventBusBuilder`] collects the policy flags and host collaborators,
//! then builds an immutable [`EventBus`]. Every option has a default, so
//! `EventBus::new()` works out of the box; the builder exists for hosts
//! that need to inject an executor, a main-thread hook, precomputed
//! handler tables, or a different failure policy.

use std::sync::Arc;

use crate::bus::EventBus;
use crate::error::EventBusError;
use crate::executor::Executor;
use crate::logging::Logger;
use crate::posters::MainThreadSupport;
use crate::subscriber::SubscriberInfoIndex;

/// Builder for [`EventBus`] instances.
pub struct EventBusBuilder {
    pub(crate) event_inheritance: bool,
    pub(crate) log_subscriber_panics: bool,
    pub(crate) log_no_subscriber_events: bool,
    pub(crate) send_subscriber_panic_event: bool,
    pub(crate) send_no_subscriber_event: bool,
    pub(crate) rethrow_subscriber_panics: bool,
    pub(crate) strict_handler_verification: bool,
    pub(crate) ignore_registered_indexes: bool,
    pub(crate) executor: Option<Arc<dyn Executor>>,
    pub(crate) main_thread_support: Option<Arc<dyn MainThreadSupport>>,
    pub(crate) logger: Option<Arc<dyn Logger>>,
    pub(crate) indexes: Vec<Arc<dyn SubscriberInfoIndex>>,
}

impl Default for EventBusBuilder {
    fn default() -> Self {
        Self {
            event_inheritance: true,
            log_subscriber_panics: true,
            log_no_subscriber_events: true,
            send_subscriber_panic_event: true,
            send_no_subscriber_event: true,
            rethrow_subscriber_panics: false,
            strict_handler_verification: false,
            ignore_registered_indexes: false,
            executor: None,
            main_thread_support: None,
            logger: None,
            indexes: Vec::new(),
        }
    }
}

impl EventBusBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatch to handlers of declared supertypes and interfaces.
    /// Default: true.
    pub fn event_inheritance(mut self, enabled: bool) -> Self {
        self.event_inheritance = enabled;
        self
    }

    /// Log handler panics. Default: true.
    pub fn log_subscriber_panics(mut self, enabled: bool) -> Self {
        self.log_subscriber_panics = enabled;
        self
    }

    /// Log events that found no subscriber. Default: true.
    pub fn log_no_subscriber_events(mut self, enabled: bool) -> Self {
        self.log_no_subscriber_events = enabled;
        self
    }

    /// Re-post handler panics as
    /// [`SubscriberPanicEvent`](crate::SubscriberPanicEvent). Default: true.
    pub fn send_subscriber_panic_event(mut self, enabled: bool) -> Self {
        self.send_subscriber_panic_event = enabled;
        self
    }

    /// Re-post undelivered events as
    /// [`NoSubscriberEvent`](crate::NoSubscriberEvent). Default: true.
    pub fn send_no_subscriber_event(mut self, enabled: bool) -> Self {
        self.send_no_subscriber_event = enabled;
        self
    }

    /// Resume a handler's unwind instead of absorbing it. Default: false.
    pub fn rethrow_subscriber_panics(mut self, enabled: bool) -> Self {
        self.rethrow_subscriber_panics = enabled;
        self
    }

    /// Reject malformed handler table entries at registration instead of
    /// skipping them. Default: false.
    pub fn strict_handler_verification(mut self, enabled: bool) -> Self {
        self.strict_handler_verification = enabled;
        self
    }

    /// Ignore registered [`SubscriberInfoIndex`] providers and use only
    /// the types' own declared tables. Default: false.
    pub fn ignore_registered_indexes(mut self, enabled: bool) -> Self {
        self.ignore_registered_indexes = enabled;
        self
    }

    /// Executor running background and async deliveries. Default: the
    /// tokio blocking pool when the `tokio` feature is on, otherwise
    /// inline execution.
    pub fn executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Host main-thread hook. Absent by default: every thread counts as
    /// the main thread and main-mode handlers run inline.
    pub fn main_thread_support(mut self, support: Arc<dyn MainThreadSupport>) -> Self {
        self.main_thread_support = Some(support);
        self
    }

    /// Log sink. Default: forward to `tracing`.
    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Adds a precomputed handler table provider. Providers are consulted
    /// in insertion order, before a type's own table.
    pub fn add_index(mut self, index: Arc<dyn SubscriberInfoIndex>) -> Self {
        self.indexes.push(index);
        self
    }

    /// Builds the bus.
    pub fn build(self) -> EventBus {
        EventBus::from_builder(self)
    }

    /// Builds the bus and installs it as the process default returned by
    /// [`EventBus::default_instance`]. Fails when a default instance
    /// already exists.
    pub fn install_default_instance(self) -> Result<EventBus, EventBusError> {
        EventBus::install_default(self.build())
    }
}
