//! Interrupt sources: real SIGINT deferral and a manual test source.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
#[cfg(unix)]
use std::thread;

use parking_lot::Mutex;

use crate::core::interrupt::{InterruptSource, InterruptWake};

/// Deferred SIGINT delivery (unix).
///
/// While installed, the first Ctrl+C sets the pending flag and wakes the
/// adapter's outstanding wait, so the flag is consumed at the next safe
/// re-entry point even when the poller worker is parked. A second Ctrl+C
/// arriving before the first is consumed falls through to the platform
/// default action, so a wedged process stays killable.
///
/// Installation is skipped when SIGINT already has a non-default
/// disposition; an application's own handler is never displaced. Delivery
/// runs on a small watcher thread, since the wake hook is not
/// async-signal-safe.
#[cfg(unix)]
#[derive(Default)]
pub struct SigintDeferral {
    watcher: Mutex<Option<(signal_hook::iterator::Handle, thread::JoinHandle<()>)>>,
}

#[cfg(unix)]
impl InterruptSource for SigintDeferral {
    fn install(&self, flag: Arc<AtomicBool>, wake: InterruptWake) -> bool {
        use signal_hook::consts::SIGINT;

        if !sigint_default_disposition() {
            return false;
        }
        let Ok(mut signals) = signal_hook::iterator::Signals::new([SIGINT]) else {
            return false;
        };
        let handle = signals.handle();
        let spawned = thread::Builder::new()
            .name("interloop-sigint".to_string())
            .spawn(move || {
                for _ in signals.forever() {
                    if flag.swap(true, Ordering::SeqCst) {
                        // Second Ctrl+C with the first still pending.
                        let _ = signal_hook::low_level::emulate_default_handler(SIGINT);
                    } else {
                        wake();
                    }
                }
            });
        match spawned {
            Ok(worker) => {
                *self.watcher.lock() = Some((handle, worker));
                true
            }
            Err(_) => {
                handle.close();
                false
            }
        }
    }

    fn restore(&self) {
        if let Some((handle, worker)) = self.watcher.lock().take() {
            handle.close();
            let _ = worker.join();
        }
    }
}

#[cfg(unix)]
impl std::fmt::Debug for SigintDeferral {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigintDeferral")
            .field("installed", &self.watcher.lock().is_some())
            .finish()
    }
}

/// Whether SIGINT currently has the platform default disposition.
#[cfg(unix)]
fn sigint_default_disposition() -> bool {
    let mut action = std::mem::MaybeUninit::<libc::sigaction>::uninit();
    // Query-only sigaction; the new-action pointer is null.
    #[allow(unsafe_code)]
    let queried = unsafe {
        if libc::sigaction(libc::SIGINT, std::ptr::null(), action.as_mut_ptr()) != 0 {
            return false;
        }
        action.assume_init()
    };
    queried.sa_sigaction == libc::SIG_DFL
}

/// An [`InterruptSource`] triggered by hand, for tests.
#[derive(Default)]
pub struct ManualInterrupts {
    hooks: Mutex<Option<(Arc<AtomicBool>, InterruptWake)>>,
}

impl ManualInterrupts {
    /// Simulate one interrupt: set the pending flag, then wake. Returns
    /// whether a receiver was installed.
    pub fn trigger(&self) -> bool {
        let hooks = self.hooks.lock().clone();
        match hooks {
            Some((flag, wake)) => {
                flag.store(true, Ordering::SeqCst);
                wake();
                true
            }
            None => false,
        }
    }
}

impl InterruptSource for ManualInterrupts {
    fn install(&self, flag: Arc<AtomicBool>, wake: InterruptWake) -> bool {
        *self.hooks.lock() = Some((flag, wake));
        true
    }

    fn restore(&self) {
        *self.hooks.lock() = None;
    }
}

impl std::fmt::Debug for ManualInterrupts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualInterrupts")
            .field("installed", &self.hooks.lock().is_some())
            .finish()
    }
}
