//! # Error types raised by the bus.
//!
//! Registration-time failures are surfaced to the caller through
//! [`EventBusError`]; dispatch-time failures (a panicking handler) are
//! absorbed by the configured panic policy instead and never appear here
//! unless rethrowing is enabled on the builder.
//!
//! `as_label` returns a short stable tag for use in logs and metrics.

use thiserror::Error;

/// Errors produced by bus operations.
///
/// Only operations that can fail fast return these: registration and
/// `cancel_event_delivery`. Posting never fails; a handler panic during
/// dispatch is handled according to the builder's panic policy.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum EventBusError {
    /// The subscriber type (including its declared supertypes) has no
    /// handler methods at all.
    #[error("subscriber '{subscriber_type}' and its supertypes declare no handler methods")]
    NoHandlers {
        /// Type name of the offending subscriber.
        subscriber_type: &'static str,
    },

    /// The same (subscriber, handler) pair was registered twice.
    #[error("subscriber '{subscriber_type}' already registered for event '{event_type}'")]
    AlreadyRegistered {
        /// Type name of the subscriber.
        subscriber_type: &'static str,
        /// Event type of the duplicate handler.
        event_type: &'static str,
    },

    /// Strict verification rejected a malformed handler table entry.
    #[error("illegal handler '{subscriber_type}::{method}': {reason}")]
    IllegalHandler {
        /// Type name of the subscriber that declared the entry.
        subscriber_type: &'static str,
        /// Method name as recorded in the table.
        method: &'static str,
        /// Human-readable cause.
        reason: &'static str,
    },

    /// `cancel_event_delivery` was called outside a handler running on
    /// the posting thread.
    #[error("cancel_event_delivery may only be called from a handler on the posting thread")]
    NotPosting,

    /// `cancel_event_delivery` was called for an event other than the
    /// one currently being delivered.
    #[error("only the event currently being delivered may be canceled")]
    WrongEvent,

    /// `cancel_event_delivery` was called from a handler whose thread
    /// mode is not `Posting`.
    #[error("only handlers running in ThreadMode::Posting may cancel delivery")]
    WrongThreadMode,

    /// A process default instance has already been installed.
    #[error("default event bus instance already exists")]
    DefaultInstanceAlreadySet,
}

impl EventBusError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            EventBusError::NoHandlers { .. } => "bus_no_handlers",
            EventBusError::AlreadyRegistered { .. } => "bus_already_registered",
            EventBusError::IllegalHandler { .. } => "bus_illegal_handler",
            EventBusError::NotPosting => "bus_cancel_not_posting",
            EventBusError::WrongEvent => "bus_cancel_wrong_event",
            EventBusError::WrongThreadMode => "bus_cancel_wrong_thread_mode",
            EventBusError::DefaultInstanceAlreadySet => "bus_default_instance_set",
        }
    }
}
