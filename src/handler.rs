//! # Handler metadata: thread modes, table entries, scan products.
//!
//! A handler is an inherent method `fn name(&self, event: &EventTy)` on a
//! subscriber type, recorded in the type's static handler table by
//! [`subscriber_info!`](crate::subscriber_info). [`HandlerDef`] is the raw
//! table entry; [`HandlerDescriptor`] is what the finder produces from it:
//! the entry plus the declaring type and the projection path from the
//! concrete subscriber to that declaring type.
//!
//! Descriptor identity is the canonical signature string
//! `DeclaringType#method(EventType)`, never the function pointer: two
//! table entries for the same inherited method must compare equal.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::event::{EventTypeInfo, Projection};
use crate::subscriber::SubscriberInfo;

/// Thread-delivery policy of a single handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadMode {
    /// Invoke inline on the posting thread. The default.
    Posting,
    /// Invoke on the host main thread; inline when already there.
    Main,
    /// Always enqueue on the host main thread, preserving queue order.
    MainOrdered,
    /// Invoke on the serial background worker; inline when the posting
    /// thread is already off the main thread.
    Background,
    /// Invoke on the shared executor, one job per delivery, unordered.
    Async,
}

/// Type-erased handler invocation thunk.
///
/// Receives the subscriber viewed as the declaring type and the event
/// viewed as the declared event type; downcasts both and calls the real
/// method. Generated by [`subscriber_info!`](crate::subscriber_info).
pub type InvokeFn = fn(&(dyn Any + Send + Sync), &(dyn Any + Send + Sync));

/// One entry of a subscriber type's static handler table.
pub struct HandlerDef {
    /// Method name, as declared.
    pub name: &'static str,
    /// Thunk yielding the declared event type's node.
    pub event: fn() -> &'static EventTypeInfo,
    /// Thread-delivery policy.
    pub mode: ThreadMode,
    /// Delivery priority; higher runs earlier. Default 0.
    pub priority: i32,
    /// Whether the handler receives the retained sticky event on
    /// registration.
    pub sticky: bool,
    /// Invocation thunk.
    pub invoke: InvokeFn,
}

impl HandlerDef {
    /// The declared event type's node.
    pub fn event_info(&self) -> &'static EventTypeInfo {
        (self.event)()
    }
}

impl fmt::Debug for HandlerDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDef")
            .field("name", &self.name)
            .field("event", &self.event_info().name)
            .field("mode", &self.mode)
            .field("priority", &self.priority)
            .field("sticky", &self.sticky)
            .finish()
    }
}

/// A scanned handler: table entry, declaring type, and the projection
/// path from the concrete subscriber type to the declaring type.
///
/// Immutable once constructed; cached per concrete subscriber type.
#[derive(Clone)]
pub struct HandlerDescriptor {
    pub(crate) def: &'static HandlerDef,
    pub(crate) declared_by: &'static SubscriberInfo,
    pub(crate) receiver_path: Arc<[Projection]>,
    signature: Arc<str>,
}

impl HandlerDescriptor {
    pub(crate) fn new(
        def: &'static HandlerDef,
        declared_by: &'static SubscriberInfo,
        receiver_path: Arc<[Projection]>,
    ) -> Self {
        let signature = format!(
            "{}#{}({})",
            declared_by.subscriber_type,
            def.name,
            def.event_info().name
        );
        Self { def, declared_by, receiver_path, signature: signature.into() }
    }

    /// Method name of the handler.
    pub fn name(&self) -> &'static str {
        self.def.name
    }

    /// Name of the type whose table declared the handler.
    pub fn declaring_type(&self) -> &'static str {
        self.declared_by.subscriber_type
    }

    /// The declared event type's node.
    pub fn event_info(&self) -> &'static EventTypeInfo {
        self.def.event_info()
    }

    /// Thread-delivery policy.
    pub fn mode(&self) -> ThreadMode {
        self.def.mode
    }

    /// Delivery priority; higher runs earlier.
    pub fn priority(&self) -> i32 {
        self.def.priority
    }

    /// Whether this handler replays sticky events on registration.
    pub fn sticky(&self) -> bool {
        self.def.sticky
    }

    /// Canonical signature: `DeclaringType#method(EventType)`.
    pub fn signature(&self) -> &str {
        &self.signature
    }
}

impl PartialEq for HandlerDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.signature == other.signature
    }
}

impl Eq for HandlerDescriptor {}

impl fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HandlerDescriptor({})", self.signature)
    }
}

#[doc(hidden)]
#[macro_export]
macro_rules! __handler_def {
    // All options consumed: emit the table entry with its thunk.
    ($sub:ident, $m:ident, $ev:ty, [$mode:expr, $prio:expr, $sticky:expr] []) => {{
        fn __invoke(
            subscriber: &(dyn ::core::any::Any + ::core::marker::Send + ::core::marker::Sync),
            event: &(dyn ::core::any::Any + ::core::marker::Send + ::core::marker::Sync),
        ) {
            if let (
                ::core::option::Option::Some(subscriber),
                ::core::option::Option::Some(event),
            ) = (subscriber.downcast_ref::<$sub>(), event.downcast_ref::<$ev>())
            {
                $sub::$m(subscriber, event);
            }
        }
        $crate::HandlerDef {
            name: ::core::stringify!($m),
            event: <$ev as $crate::Event>::event_type_of,
            mode: $mode,
            priority: $prio,
            sticky: $sticky,
            invoke: __invoke,
        }
    }};
    // mode = <ThreadMode variant>
    ($sub:ident, $m:ident, $ev:ty, [$mode:expr, $prio:expr, $sticky:expr] [mode = $new:ident $(, $($rest:tt)*)?]) => {
        $crate::__handler_def!($sub, $m, $ev, [$crate::ThreadMode::$new, $prio, $sticky] [$($($rest)*)?])
    };
    // priority = <i32>
    ($sub:ident, $m:ident, $ev:ty, [$mode:expr, $prio:expr, $sticky:expr] [priority = $new:expr $(, $($rest:tt)*)?]) => {
        $crate::__handler_def!($sub, $m, $ev, [$mode, $new, $sticky] [$($($rest)*)?])
    };
    // sticky
    ($sub:ident, $m:ident, $ev:ty, [$mode:expr, $prio:expr, $sticky:expr] [sticky $(, $($rest:tt)*)?]) => {
        $crate::__handler_def!($sub, $m, $ev, [$mode, $prio, true] [$($($rest)*)?])
    };
}
