//! Deferred-interrupt handling.
//!
//! An interrupt signal (Ctrl+C) can arrive while the poller's worker thread
//! is blocked in a wait; acting on it at that point would tear state down at
//! an arbitrary spot. Instead, delivery is deferred: the signal path sets a
//! flag and wakes the outstanding wait, and the flag is consumed at exactly
//! one safe re-entry point, the top of the next notifier callback, where it
//! becomes
//! [`AdapterError::Interrupted`](crate::core::AdapterError::Interrupted)
//! routed through the adapter's fatal-termination path. The wake step keeps
//! a flag raised against a parked wait from sitting unobserved.
//!
//! Signal delivery itself is a platform collaborator behind
//! [`InterruptSource`]; see [`infra::signal`](crate::infra::signal) for the
//! unix implementation and a manual test source.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

/// Thread-safe hook an interrupt source invokes after setting the pending
/// flag, to unpark the adapter's outstanding wait.
pub type InterruptWake = Arc<dyn Fn() + Send + Sync + 'static>;

/// Process signal delivery seam.
pub trait InterruptSource: Send + Sync + 'static {
    /// Arrange for an interrupt signal to set `flag` and then invoke `wake`
    /// instead of its default action. Must install only if the platform
    /// default disposition is currently active (never override user
    /// customization); returns whether installation happened.
    fn install(&self, flag: Arc<AtomicBool>, wake: InterruptWake) -> bool;

    /// Restore the platform default disposition. Called once per
    /// successful [`install`](Self::install).
    fn restore(&self);
}

/// An [`InterruptSource`] that never installs anything. The default for
/// adapters that leave signal handling to the application.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoInterrupts;

impl InterruptSource for NoInterrupts {
    fn install(&self, _flag: Arc<AtomicBool>, _wake: InterruptWake) -> bool {
        false
    }

    fn restore(&self) {}
}

/// Owns the deferred-interrupt flag for one notifier lifetime.
pub struct InterruptGuard {
    source: Arc<dyn InterruptSource>,
    flag: Arc<AtomicBool>,
    installed: bool,
}

impl InterruptGuard {
    /// Install deferred delivery through `source`. `wake` is invoked by
    /// the source after each flag set, unparking the outstanding wait.
    pub fn install(source: Arc<dyn InterruptSource>, wake: InterruptWake) -> Self {
        let flag = Arc::new(AtomicBool::new(false));
        let installed = source.install(Arc::clone(&flag), wake);
        if installed {
            debug!("deferred interrupt handler installed");
        }
        Self {
            source,
            flag,
            installed,
        }
    }

    /// Consume the pending-interrupt flag. Returns true at most once per
    /// set; callers treat true as a synthetic interrupt.
    pub fn take_pending(&self) -> bool {
        self.flag.swap(false, Ordering::SeqCst)
    }

    /// Restore the platform default handler if one was installed.
    pub fn restore(&mut self) {
        if self.installed {
            self.source.restore();
            self.installed = false;
            debug!("interrupt handler restored to platform default");
        }
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        self.restore();
    }
}

impl std::fmt::Debug for InterruptGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterruptGuard")
            .field("installed", &self.installed)
            .field("pending", &self.flag.load(Ordering::SeqCst))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::signal::ManualInterrupts;

    fn no_wake() -> InterruptWake {
        Arc::new(|| {})
    }

    #[test]
    fn test_no_interrupts_never_installs() {
        let guard = InterruptGuard::install(Arc::new(NoInterrupts), no_wake());
        assert!(!guard.take_pending());
    }

    #[test]
    fn test_flag_consumed_once() {
        let source = Arc::new(ManualInterrupts::default());
        let guard = InterruptGuard::install(
            Arc::clone(&source) as Arc<dyn InterruptSource>,
            no_wake(),
        );
        assert!(!guard.take_pending());
        assert!(source.trigger());
        assert!(guard.take_pending());
        assert!(!guard.take_pending());
    }

    #[test]
    fn test_trigger_invokes_the_wake_hook() {
        let woken = Arc::new(AtomicBool::new(false));
        let w = Arc::clone(&woken);
        let source = Arc::new(ManualInterrupts::default());
        let guard = InterruptGuard::install(
            Arc::clone(&source) as Arc<dyn InterruptSource>,
            Arc::new(move || w.store(true, Ordering::SeqCst)),
        );
        assert!(source.trigger());
        // The source must set the flag and then unpark the wait.
        assert!(woken.load(Ordering::SeqCst));
        assert!(guard.take_pending());
    }

    #[test]
    fn test_restore_detaches_source() {
        let source = Arc::new(ManualInterrupts::default());
        let mut guard = InterruptGuard::install(
            Arc::clone(&source) as Arc<dyn InterruptSource>,
            no_wake(),
        );
        guard.restore();
        assert!(!source.trigger());
    }
}
