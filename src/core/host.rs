//! The host run-loop seam.
//!
//! The host run-loop is externally owned and reentrant: application code may
//! launch nested invocations of it (modal dialogs being the canonical
//! example). This crate never implements a GUI toolkit; it only requires the
//! three capabilities below, and ships a headless implementation in
//! [`infra::host`](crate::infra::host) for tests and toolkit-free embedders.

use crate::core::error::AdapterError;
use crate::core::scheduler::Callback;

/// Queued-dispatch and nested-invocation surface of a host run-loop.
///
/// Implementations wrap e.g. a GUI toolkit's queued signal/event mechanism.
pub trait HostRuntime: Send + Sync + 'static {
    /// Post a callback to be invoked later on the host run-loop's thread.
    ///
    /// Must be callable from any thread, must never invoke the callback
    /// synchronously, and must preserve posting order.
    fn post(&self, callback: Callback);

    /// Create a nested run-loop invocation.
    ///
    /// The returned loop is run (and blocks) on the host thread; posted
    /// callbacks keep being dispatched while it runs.
    fn nested(&self) -> Box<dyn NestedLoop>;

    /// Deliver a fatal adapter error into the host's own error channel.
    ///
    /// Called in GUEST mode, where there is no `run_forever` caller to
    /// surface the error to. What happens next is host-defined; the default
    /// implementation logs the error and drops it.
    fn raise_error(&self, error: AdapterError) {
        tracing::error!(%error, "fatal error raised into host run-loop");
    }
}

/// One nested invocation of the host run-loop.
pub trait NestedLoop {
    /// Run the loop until [`LoopExit::exit`] is called on its exit handle,
    /// returning the status code passed to `exit`.
    fn run(&mut self) -> i32;

    /// Obtain a handle that can terminate this invocation early.
    fn exit_handle(&self) -> std::sync::Arc<dyn LoopExit>;
}

/// Terminates a [`NestedLoop`] with a status code observable by its runner.
pub trait LoopExit: Send + Sync {
    /// Request the loop to exit with `code`. Idempotent; the first call
    /// wins. Callable from any thread.
    fn exit(&self, code: i32);
}
