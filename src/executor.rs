//! # Executor collaborator.
//!
//! Background and async deliveries run as opaque jobs on an injected
//! [`Executor`]. The bus owns no threads of its own; it only ever submits
//! drain jobs here. A bus used purely with posting-mode handlers never
//! touches the executor.

#[cfg(feature = "tokio")]
use std::fmt;

/// Sink for opaque delivery jobs.
pub trait Executor: Send + Sync {
    /// Submits one job. Implementations must not run the job inline on
    /// the calling thread unless inline execution is their documented
    /// behavior (see [`InlineExecutor`]).
    fn execute(&self, job: Box<dyn FnOnce() + Send + 'static>);
}

/// Runs jobs on tokio's blocking pool.
///
/// Captures the current runtime handle at construction when one exists;
/// otherwise the handle is resolved per job, which panics outside a
/// runtime the same way `tokio::spawn` does.
#[cfg(feature = "tokio")]
pub struct TokioExecutor {
    handle: Option<tokio::runtime::Handle>,
}

#[cfg(feature = "tokio")]
impl TokioExecutor {
    /// Binds to the given runtime handle.
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle: Some(handle) }
    }
}

#[cfg(feature = "tokio")]
impl Default for TokioExecutor {
    fn default() -> Self {
        Self { handle: tokio::runtime::Handle::try_current().ok() }
    }
}

#[cfg(feature = "tokio")]
impl Executor for TokioExecutor {
    fn execute(&self, job: Box<dyn FnOnce() + Send + 'static>) {
        match &self.handle {
            Some(handle) => {
                handle.spawn_blocking(job);
            }
            None => {
                tokio::runtime::Handle::current().spawn_blocking(job);
            }
        }
    }
}

#[cfg(feature = "tokio")]
impl fmt::Debug for TokioExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokioExecutor").finish()
    }
}

/// Runs jobs inline on the submitting thread.
///
/// Degrades background and async delivery to synchronous calls; useful
/// in tests and in hosts without a worker pool.
#[derive(Debug, Default)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn execute(&self, job: Box<dyn FnOnce() + Send + 'static>) {
        job();
    }
}
