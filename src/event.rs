//! # Event data model: typed events and their declared hierarchy.
//!
//! An event is any `'static + Send + Sync` value; its runtime type is the
//! dispatch key. Rust has no runtime subtyping, so the supertype/interface
//! relations the dispatcher honors are *declared* per event type through
//! the [`event_type!`] macro and recorded in a static [`EventTypeInfo`]
//! node per type.
//!
//! ## Hierarchy edges
//! Each edge pairs a target type with a *projection*: a function returning
//! the parent view of a concrete value. Two shapes exist:
//! - `extends Parent { field }` projects to an embedded base field, so a
//!   handler declared for `Parent` receives a genuine `&Parent`;
//! - `implements Marker` projects to a static instance of a unit struct,
//!   which is the Rust rendition of a stateless interface.
//!
//! ```text
//! event_type!(Shutdown);
//! event_type!(ServerPush extends Message { base } implements Urgent);
//!
//!        ServerPush ──extends──► Message          (&push.base)
//!             │
//!             └─────implements──► Urgent           (&static marker)
//! ```
//!
//! Handlers for `Message` and `Urgent` both fire when a `ServerPush` is
//! posted, each receiving a properly typed reference.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::bus::EventBus;
use crate::subscriber::Subscriber;

/// Re-borrows a type-erased value as one of its declared ancestor views.
///
/// Applied in sequence along a hierarchy walk; see [`EventTypeInfo`].
pub type Projection = fn(&(dyn Any + Send + Sync)) -> &(dyn Any + Send + Sync);

/// Static descriptor of one event type: its name, identity, and declared
/// hierarchy edges. One per event type, produced by [`event_type!`].
pub struct EventTypeInfo {
    /// Short type name, used in logs and handler signatures.
    pub name: &'static str,
    /// Thunk yielding the `TypeId` of the described type.
    pub type_id: fn() -> TypeId,
    /// Edge to the declared supertype, if any.
    pub supertype: Option<EventEdge>,
    /// Edges to the declared interfaces, in declaration order.
    pub interfaces: &'static [EventEdge],
}

impl EventTypeInfo {
    /// Runtime identity of the described type.
    pub fn id(&self) -> TypeId {
        (self.type_id)()
    }
}

impl fmt::Debug for EventTypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventTypeInfo").field("name", &self.name).finish()
    }
}

/// One declared hierarchy edge: the target type node plus the projection
/// that produces the target-typed view of a source value.
#[derive(Clone, Copy)]
pub struct EventEdge {
    /// Thunk yielding the target type's node.
    pub target: fn() -> &'static EventTypeInfo,
    /// Projection from the edge's source type to the target type.
    pub project: Projection,
}

/// A value deliverable through the bus.
///
/// Implement with [`event_type!`]; the macro wires the type node and the
/// downcast surface. Events carry no required shape, only identity.
pub trait Event: Any + Send + Sync {
    /// The static type node of this value's concrete type.
    fn event_type(&self) -> &'static EventTypeInfo;

    /// The static type node of `Self`.
    fn event_type_of() -> &'static EventTypeInfo
    where
        Self: Sized;

    /// Type-erased view used by projections and handler thunks.
    fn as_any(&self) -> &(dyn Any + Send + Sync);

    /// Type-erased shared handle, used by the typed sticky accessors.
    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Declares an event type and its place in the dispatch hierarchy.
///
/// Types named in the relation clauses must be in scope as bare
/// identifiers and themselves be declared with `event_type!`. Marker
/// interfaces (`implements I` without a field) must be unit structs.
///
/// ```ignore
/// event_type!(Tick);
/// event_type!(ServerPush extends Message { base });
/// event_type!(Alert implements Urgent, Audited { audit });
/// event_type!(ServerPush extends Message { base } implements Urgent);
/// ```
#[macro_export]
macro_rules! event_type {
    ($ty:ident) => {
        $crate::__event_impl!($ty, ::core::option::Option::None, &[]);
    };
    ($ty:ident extends $sup:ident { $field:ident }) => {
        $crate::__event_impl!(
            $ty,
            ::core::option::Option::Some($crate::__event_edge!($ty, $sup { $field })),
            &[]
        );
    };
    ($ty:ident implements $( $iface:ident $({ $ifield:ident })? ),+ $(,)?) => {
        $crate::__event_impl!(
            $ty,
            ::core::option::Option::None,
            &[ $( $crate::__event_edge!($ty, $iface $({ $ifield })?) ),+ ]
        );
    };
    ($ty:ident extends $sup:ident { $field:ident } implements $( $iface:ident $({ $ifield:ident })? ),+ $(,)?) => {
        $crate::__event_impl!(
            $ty,
            ::core::option::Option::Some($crate::__event_edge!($ty, $sup { $field })),
            &[ $( $crate::__event_edge!($ty, $iface $({ $ifield })?) ),+ ]
        );
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __event_impl {
    ($ty:ident, $sup:expr, $ifaces:expr) => {
        impl $crate::Event for $ty {
            fn event_type(&self) -> &'static $crate::EventTypeInfo {
                <Self as $crate::Event>::event_type_of()
            }

            fn event_type_of() -> &'static $crate::EventTypeInfo {
                static INFO: $crate::EventTypeInfo = $crate::EventTypeInfo {
                    name: ::core::stringify!($ty),
                    type_id: ::core::any::TypeId::of::<$ty>,
                    supertype: $sup,
                    interfaces: $ifaces,
                };
                &INFO
            }

            fn as_any(&self) -> &(dyn ::core::any::Any + ::core::marker::Send + ::core::marker::Sync) {
                self
            }

            fn as_any_arc(
                self: ::std::sync::Arc<Self>,
            ) -> ::std::sync::Arc<dyn ::core::any::Any + ::core::marker::Send + ::core::marker::Sync>
            {
                self
            }
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __event_edge {
    // Embedded parent or data-carrying interface: project to a field.
    ($ty:ident, $target:ident { $field:ident }) => {{
        fn __project(
            v: &(dyn ::core::any::Any + ::core::marker::Send + ::core::marker::Sync),
        ) -> &(dyn ::core::any::Any + ::core::marker::Send + ::core::marker::Sync) {
            match v.downcast_ref::<$ty>() {
                ::core::option::Option::Some(v) => &v.$field,
                ::core::option::Option::None => v,
            }
        }
        $crate::EventEdge {
            target: <$target as $crate::Event>::event_type_of,
            project: __project,
        }
    }};
    // Marker interface: project to a static unit instance.
    ($ty:ident, $target:ident) => {{
        fn __project(
            _v: &(dyn ::core::any::Any + ::core::marker::Send + ::core::marker::Sync),
        ) -> &(dyn ::core::any::Any + ::core::marker::Send + ::core::marker::Sync) {
            static MARKER: $target = $target;
            &MARKER
        }
        $crate::EventEdge {
            target: <$target as $crate::Event>::event_type_of,
            project: __project,
        }
    }};
}

/// Posted by the bus when an event found no matching subscription.
///
/// Not re-posted about itself or about [`SubscriberPanicEvent`], so a bus
/// with no subscribers at all stays quiet after one hop.
pub struct NoSubscriberEvent {
    /// The bus that performed the failed dispatch.
    pub event_bus: EventBus,
    /// The event that went undelivered.
    pub original_event: Arc<dyn Event>,
}

event_type!(NoSubscriberEvent);

/// Posted by the bus when a handler panicked while handling an event and
/// `send_subscriber_panic_event` is enabled.
pub struct SubscriberPanicEvent {
    /// The bus the failing handler was registered on.
    pub event_bus: EventBus,
    /// Rendered panic payload of the failing handler.
    pub panic_message: String,
    /// The event that was being delivered when the handler panicked.
    pub causing_event: Arc<dyn Event>,
    /// The subscriber owning the failing handler.
    pub causing_subscriber: Arc<dyn Subscriber>,
}

event_type!(SubscriberPanicEvent);
