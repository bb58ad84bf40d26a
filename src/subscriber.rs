//! # Subscriber contract and static handler tables.
//!
//! A subscriber is any object whose type declares a handler table with
//! [`subscriber_info!`]. Registration walks the table of the concrete
//! type and of every declared supertype, so handlers are inherited the
//! way methods are.
//!
//! ## Declaring handlers
//! ```ignore
//! struct ChatView { log: Mutex<Vec<String>> }
//!
//! impl ChatView {
//!     fn on_message(&self, event: &TextMessage) { /* ... */ }
//!     fn on_motd(&self, event: &Motd) { /* ... */ }
//! }
//!
//! subscriber_info! {
//!     ChatView;
//!     #[handle(mode = Main, priority = 10)]
//!     on_message => TextMessage;
//!     #[handle(sticky)]
//!     on_motd => Motd;
//! }
//! ```
//!
//! Each `method => EventType;` line records one handler. Recognized
//! options inside `#[handle(..)]`: `mode = <ThreadMode variant>`
//! (default `Posting`), `priority = <i32>` (default `0`), `sticky`
//! (default off). The named method must exist as an inherent
//! `fn method(&self, event: &EventType)`; a mismatch fails to compile.
//!
//! ## Rules
//! - Handlers take `&self`; subscribers keep mutable state behind
//!   interior mutability.
//! - Subscriber inheritance is embedding: declare
//!   `Child extends Parent { field };` and the parent's handlers fire on
//!   the embedded field. A child redeclaring the same method name for the
//!   same event type overrides the parent's entry.
//! - The bus strongly retains the subscriber `Arc` from `register` until
//!   `unregister`; dropping your own clone does not unsubscribe.

use std::any::{Any, TypeId};
use std::fmt;

use crate::event::Projection;
use crate::handler::HandlerDef;

/// An object that can be registered on the bus.
///
/// Implemented by [`subscriber_info!`]; implement by hand only to build
/// tables at runtime (for example from generated code).
pub trait Subscriber: Any + Send + Sync {
    /// The static handler table of this value's concrete type.
    fn subscriber_info(&self) -> &'static SubscriberInfo;

    /// The static handler table of `Self`.
    fn info() -> &'static SubscriberInfo
    where
        Self: Sized;

    /// Type-erased view used by handler thunks.
    fn as_any(&self) -> &(dyn Any + Send + Sync);
}

/// Static handler table of one subscriber type.
pub struct SubscriberInfo {
    /// Short type name, used in logs and handler signatures.
    pub subscriber_type: &'static str,
    /// Thunk yielding the `TypeId` of the described type.
    pub type_id: fn() -> TypeId,
    /// Declared handlers, in declaration order.
    pub handlers: &'static [HandlerDef],
    /// Edge to the declared supertype, if any.
    pub supertype: Option<SubscriberEdge>,
}

impl SubscriberInfo {
    /// Runtime identity of the described type.
    pub fn id(&self) -> TypeId {
        (self.type_id)()
    }
}

impl fmt::Debug for SubscriberInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberInfo")
            .field("subscriber_type", &self.subscriber_type)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

/// Supertype edge of a subscriber type: the parent's table plus the
/// projection producing the parent view of a concrete value.
#[derive(Clone, Copy)]
pub struct SubscriberEdge {
    /// Thunk yielding the parent type's table.
    pub target: fn() -> &'static SubscriberInfo,
    /// Projection from the child type to the embedded parent.
    pub project: Projection,
}

/// External provider of precomputed handler tables.
///
/// Consulted by the finder before a type's own table, in the order the
/// providers were added to the builder. Lets build-time generated tables
/// replace the declared ones without changing subscriber code.
pub trait SubscriberInfoIndex: Send + Sync {
    /// Returns the table for the given subscriber type, if this index
    /// knows it.
    fn subscriber_info(&self, subscriber_type: TypeId) -> Option<&'static SubscriberInfo>;
}

/// Declares the handler table of a subscriber type.
///
/// Each `method => EventType;` line records one handler, optionally
/// prefixed with `#[handle(..)]` options: `mode = <ThreadMode variant>`
/// (default `Posting`), `priority = <i32>` (default `0`), and `sticky`.
/// The named method must exist as an inherent
/// `fn method(&self, event: &EventType)`.
///
/// ```ignore
/// subscriber_info! {
///     ChatView;
///     #[handle(mode = Main, priority = 10)]
///     on_message => TextMessage;
///     on_reset => Reset;
/// }
/// subscriber_info! {
///     ChildView extends ChatView { base };
///     on_extra => Reset;
/// }
/// ```
#[macro_export]
macro_rules! subscriber_info {
    ($sub:ident ; $($body:tt)+) => {
        $crate::__subscriber_impl!($sub, ::core::option::Option::None, $($body)+);
    };
    ($sub:ident extends $sup:ident { $field:ident } ; $($body:tt)+) => {
        $crate::__subscriber_impl!(
            $sub,
            ::core::option::Option::Some($crate::SubscriberEdge {
                target: <$sup as $crate::Subscriber>::info,
                project: {
                    fn __project(
                        v: &(dyn ::core::any::Any + ::core::marker::Send + ::core::marker::Sync),
                    ) -> &(dyn ::core::any::Any + ::core::marker::Send + ::core::marker::Sync)
                    {
                        match v.downcast_ref::<$sub>() {
                            ::core::option::Option::Some(v) => &v.$field,
                            ::core::option::Option::None => v,
                        }
                    }
                    __project
                },
            }),
            $($body)+
        );
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __subscriber_impl {
    ($sub:ident, $sup:expr, $( $(#[handle($($opt:tt)*)])? $m:ident => $ev:ty ;)+) => {
        impl $crate::Subscriber for $sub {
            fn subscriber_info(&self) -> &'static $crate::SubscriberInfo {
                <Self as $crate::Subscriber>::info()
            }

            fn info() -> &'static $crate::SubscriberInfo {
                static INFO: $crate::SubscriberInfo = $crate::SubscriberInfo {
                    subscriber_type: ::core::stringify!($sub),
                    type_id: ::core::any::TypeId::of::<$sub>,
                    handlers: &[
                        $(
                            $crate::__handler_def!(
                                $sub, $m, $ev,
                                [$crate::ThreadMode::Posting, 0, false]
                                [$($($opt)*)?]
                            )
                        ),+
                    ],
                    supertype: $sup,
                };
                &INFO
            }

            fn as_any(&self) -> &(dyn ::core::any::Any + ::core::marker::Send + ::core::marker::Sync) {
                self
            }
        }
    };
}
