//! # typebus
//!
//! **Typebus** is an in-process publish/subscribe event bus.
//!
//! Events are plain values dispatched by their runtime type: any handler
//! whose declared event type matches the posted event's type, or one of
//! its declared supertypes and interfaces, receives it. Handlers choose a
//! thread-delivery policy, a priority, and whether they replay the
//! retained sticky event on registration.
//!
//! ## Features
//!
//! | Area            | Description                                                          | Key types / traits                           |
//! |-----------------|----------------------------------------------------------------------|----------------------------------------------|
//! | **Events**      | Typed events with a declared dispatch hierarchy.                     | [`Event`], [`event_type!`]                   |
//! | **Subscribers** | Objects with handler tables, inherited across embedded supertypes.   | [`Subscriber`], [`subscriber_info!`]         |
//! | **Dispatch**    | Priority order, reentrancy FIFO, cancellation, sticky replay.        | [`EventBus`], [`ThreadMode`]                 |
//! | **Delivery**    | Inline, main-thread, serial background, and parallel async posters.  | [`Poster`], [`MainThreadSupport`], [`Executor`] |
//! | **Errors**      | Fail-fast registration errors; policy-driven panic handling.         | [`EventBusError`], [`SubscriberPanicEvent`]  |
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::{Arc, Mutex};
//! use typebus::{event_type, subscriber_info, EventBus};
//!
//! struct TextMessage(String);
//! event_type!(TextMessage);
//!
//! #[derive(Default)]
//! struct ChatView {
//!     log: Mutex<Vec<String>>,
//! }
//!
//! impl ChatView {
//!     fn on_message(&self, event: &TextMessage) {
//!         self.log.lock().unwrap().push(event.0.clone());
//!     }
//! }
//!
//! subscriber_info! {
//!     ChatView;
//!     on_message => TextMessage;
//! }
//!
//! fn main() -> Result<(), typebus::EventBusError> {
//!     let bus = EventBus::new();
//!     let view = Arc::new(ChatView::default());
//!     bus.register(Arc::clone(&view))?;
//!     bus.post(TextMessage("hello".into()));
//!     assert_eq!(view.log.lock().unwrap().as_slice(), ["hello"]);
//!     bus.unregister(&view);
//!     Ok(())
//! }
//! ```
//!
//! ## Threading
//!
//! Every bus operation may be called from any thread. `Posting`-mode
//! handlers run inline on the posting thread; the other modes enqueue on
//! posters backed by the host's main loop and the injected [`Executor`].
//! Hosts with a main thread plug in a [`MainThreadSupport`]; without one,
//! main-mode handlers run inline.
//!
//! ---

mod builder;
mod bus;
mod error;
mod event;
mod executor;
mod finder;
mod handler;
mod hierarchy;
mod logging;
mod posters;
mod posting;
mod registry;
mod sticky;
mod subscriber;

// ---- Public re-exports ----

pub use builder::EventBusBuilder;
pub use bus::EventBus;
pub use error::EventBusError;
pub use event::{Event, EventEdge, EventTypeInfo, NoSubscriberEvent, Projection, SubscriberPanicEvent};
pub use executor::{Executor, InlineExecutor};
pub use handler::{HandlerDef, HandlerDescriptor, InvokeFn, ThreadMode};
pub use logging::{Logger, TracingLogger};
pub use posters::{MainLoopScheduler, MainThreadPoster, MainThreadSupport, PendingPost, Poster};
pub use registry::Subscription;
pub use subscriber::{Subscriber, SubscriberEdge, SubscriberInfo, SubscriberInfoIndex};

#[cfg(feature = "tokio")]
pub use executor::TokioExecutor;
