//! # Logger collaborator.
//!
//! The bus reports through an injected [`Logger`] sink so hosts can route
//! its messages anywhere. The default sink forwards to `tracing` at the
//! matching severity.

use tracing::Level;

/// Severity-leveled log sink.
pub trait Logger: Send + Sync {
    fn log(&self, level: Level, message: &str);
}

/// Default sink: forwards to the `tracing` macros.
#[derive(Debug, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: Level, message: &str) {
        if level == Level::ERROR {
            tracing::error!(target: "typebus", "{message}");
        } else if level == Level::WARN {
            tracing::warn!(target: "typebus", "{message}");
        } else if level == Level::INFO {
            tracing::info!(target: "typebus", "{message}");
        } else if level == Level::DEBUG {
            tracing::debug!(target: "typebus", "{message}");
        } else {
            tracing::trace!(target: "typebus", "{message}");
        }
    }
}
