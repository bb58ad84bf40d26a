//! # Delivery posters: queued handler invocation off the posting thread.
//!
//! A poster accepts [`PendingPost`]s and invokes their handlers later,
//! possibly on another thread. Three implementations cover the queued
//! thread modes:
//!
//! ```text
//!   dispatch ──► ThreadMode::Main        ──► host poster (main loop)
//!            ──► ThreadMode::MainOrdered ──► host poster (main loop)
//!            ──► ThreadMode::Background  ──► BackgroundPoster ─► executor (serial)
//!            ──► ThreadMode::Async       ──► AsyncPoster ─────► executor (parallel)
//! ```
//!
//! Every poster hands its pending posts back to
//! [`EventBus::invoke_subscriber`](crate::EventBus::invoke_subscriber),
//! which recycles the pending post and skips subscriptions retired
//! between enqueue and invocation.

mod async_pool;
mod background;
mod main_thread;
mod pending;

pub(crate) use async_pool::AsyncPoster;
pub(crate) use background::BackgroundPoster;

pub use main_thread::{MainLoopScheduler, MainThreadPoster, MainThreadSupport};
pub use pending::PendingPost;

/// Accepts pending posts for later invocation.
///
/// Hosts implement this for their main-loop poster; the built-in
/// background and async posters implement it for the executor.
pub trait Poster: Send + Sync {
    /// Enqueues one delivery. Must not invoke the handler inline.
    fn enqueue(&self, pending: PendingPost);
}
