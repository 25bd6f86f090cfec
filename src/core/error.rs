//! Error types for the host-loop adapter.

use thiserror::Error;

/// Errors produced by the adapter, poller, and scheduler engine.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// A deferred interrupt (e.g. Ctrl+C) was consumed by the iteration
    /// driver. Fatal: terminates the current run.
    #[error("interrupt received")]
    Interrupted,
    /// The host run-loop exited with a non-zero status that carried no
    /// recorded error. Fatal.
    #[error("host run-loop exited with code {0}")]
    HostLoopExit(i32),
    /// The underlying multiplexer wait failed.
    #[error("multiplexer failure: {0}")]
    Io(#[from] std::io::Error),
    /// An operation was invoked in the wrong mode or state.
    #[error("usage error: {0}")]
    Usage(String),
    /// The poller has been closed and cannot serve further waits.
    #[error("poller is closed")]
    PollerClosed,
    /// Internal failure (worker thread gone, channel closed, etc.).
    #[error("internal error: {0}")]
    Internal(String),
}

impl AdapterError {
    /// Whether this error belongs to the fatal class that aborts the
    /// current iteration and terminates the run.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Interrupted | Self::HostLoopExit(_))
    }

    /// Shorthand for a usage error with a descriptive message.
    pub(crate) fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }
}

/// Result alias used throughout the crate.
pub type AdapterResult<T> = Result<T, AdapterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(AdapterError::Interrupted.is_fatal());
        assert!(AdapterError::HostLoopExit(1).is_fatal());
        assert!(!AdapterError::usage("nope").is_fatal());
        assert!(!AdapterError::PollerClosed.is_fatal());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            format!("{}", AdapterError::HostLoopExit(2)),
            "host run-loop exited with code 2"
        );
        assert_eq!(
            format!("{}", AdapterError::usage("stop() requires a running loop")),
            "usage error: stop() requires a running loop"
        );
    }
}
