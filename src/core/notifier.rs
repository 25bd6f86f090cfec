//! Cross-thread notification onto the host run-loop's thread.
//!
//! A notifier is created for each start/stop cycle of an adapter. Its
//! [`notify`](Notifier::notify) is thread-safe and posts one invocation of
//! the adapter's iteration driver through the host's queued dispatch, so
//! the call never re-enters synchronously and cannot starve other host
//! callbacks.
//!
//! Every posted invocation carries the adapter generation current at
//! scheduling time; if the adapter has moved on (the loop was stopped and
//! possibly restarted) by the time it fires, the invocation is a silent
//! no-op. The notifier also owns the deferred-interrupt guard for its
//! lifetime: the pending-interrupt flag is consumed at the top of every
//! delivery, before any scheduler work.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::core::adapter::AdapterInner;
use crate::core::error::AdapterError;
use crate::core::host::HostRuntime;
use crate::core::interrupt::{InterruptGuard, InterruptSource, InterruptWake};

/// Generation-tagged channel between the poller worker and the adapter.
pub struct Notifier {
    host: Arc<dyn HostRuntime>,
    /// Back-reference to the adapter; forms an ownership cycle with the
    /// adapter's own notifier slot that [`close`](Notifier::close) breaks.
    adapter: Mutex<Option<Arc<AdapterInner>>>,
    guard: Mutex<InterruptGuard>,
}

impl Notifier {
    pub(crate) fn new(
        host: Arc<dyn HostRuntime>,
        adapter: Arc<AdapterInner>,
        interrupts: Arc<dyn InterruptSource>,
        wake: InterruptWake,
    ) -> Arc<Self> {
        Arc::new(Self {
            host,
            adapter: Mutex::new(Some(adapter)),
            guard: Mutex::new(InterruptGuard::install(interrupts, wake)),
        })
    }

    /// Schedule one invocation of the adapter's iteration driver on the
    /// host thread. Thread-safe; a no-op after [`close`](Notifier::close).
    pub fn notify(self: &Arc<Self>) {
        let Some(adapter) = self.adapter.lock().clone() else {
            trace!("notification dropped: notifier closed");
            return;
        };
        let generation = adapter.generation();
        let this = Arc::clone(self);
        self.host
            .post(Box::new(move || this.on_notified(generation)));
    }

    /// A notifier with no adapter attached; posts are silently dropped.
    /// Lets the poller's state machine be exercised without a full adapter.
    #[cfg(test)]
    pub(crate) fn detached(host: Arc<dyn HostRuntime>) -> Arc<Self> {
        use crate::core::interrupt::NoInterrupts;
        Arc::new(Self {
            host,
            adapter: Mutex::new(None),
            guard: Mutex::new(InterruptGuard::install(Arc::new(NoInterrupts), Arc::new(|| {}))),
        })
    }

    /// Detach from the adapter, stop producing further invocations, and
    /// restore the interrupt handler. Idempotent.
    pub fn close(&self) {
        *self.adapter.lock() = None;
        self.guard.lock().restore();
    }

    /// Queued-dispatch target. Runs on the host thread.
    fn on_notified(&self, generation: u64) {
        let Some(adapter) = self.adapter.lock().clone() else {
            trace!("stale notification: notifier closed");
            return;
        };
        if adapter.generation() != generation {
            trace!(
                queued = generation,
                current = adapter.generation(),
                "stale notification discarded"
            );
            return;
        }
        // Deferred interrupts are observed here and only here, before any
        // scheduler work, and routed through the fatal-termination path.
        if self.guard.lock().take_pending() {
            adapter.handle_fatal(AdapterError::Interrupted);
            return;
        }
        if let Err(e) = adapter.iterate() {
            warn!(error = %e, "iteration rejected");
        }
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("attached", &self.adapter.lock().is_some())
            .finish()
    }
}
