//! Non-blocking wrapper around a blocking readiness wait.
//!
//! The poller never blocks the host thread. If readiness (or a pending
//! result from an earlier wait) is available it returns it immediately;
//! otherwise it hands the real wait to its single resident worker thread
//! and answers [`Select::Yielded`]. The worker stores the result, flips the
//! state back to IDLE and fires the notifier, whose callback re-enters the
//! iteration driver and consumes the pending result on the next
//! [`select`](Poller::select).
//!
//! # State machine
//!
//! ```text
//! [new] -> IDLE --select (ready, zero timeout, or no notifier)--> IDLE
//!          IDLE --select (no readiness, notifier attached)-----> BUSY
//!          BUSY --(wait finishes or is woken)------------------> IDLE
//!          IDLE --close--> CLOSED        BUSY --close--> (wake, wait) -> CLOSED
//! ```
//!
//! Exactly one wait is ever outstanding: re-entering `select` while BUSY is
//! a caller logic error and panics.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use crate::config::PollerConfig;
use crate::core::error::{AdapterError, AdapterResult};
use crate::core::mux::{Event, Interest, Multiplexer, Token};
use crate::core::notifier::Notifier;

/// Observable poller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    /// No wait is outstanding.
    Idle,
    /// The worker thread is blocked in a wait whose result has not been
    /// consumed yet.
    Busy,
    /// Terminal.
    Closed,
}

/// Result of a [`Poller::select`] call.
#[derive(Debug)]
pub enum Select {
    /// Readiness events. Empty on an uneventful timeout; a consumed wake
    /// appears as a [`Token::WAKE`](crate::core::Token::WAKE) event.
    Ready(Vec<Event>),
    /// No result this turn; the worker owns the wait and the notifier will
    /// fire when it finishes.
    Yielded,
}

/// State + single-slot result gate shared with the worker thread.
struct Gate {
    state: PollerState,
    /// Outcome of the last worker wait, consumed exactly once.
    pending: Option<std::io::Result<Vec<Event>>>,
}

struct Shared {
    /// Lock order: `notifier` before `gate`, everywhere.
    notifier: Mutex<Option<Arc<Notifier>>>,
    gate: Mutex<Gate>,
    idle_cv: Condvar,
}

struct WaitRequest {
    timeout: Option<Duration>,
}

/// Never-blocking readiness poller with one worker thread.
pub struct Poller {
    mux: Arc<dyn Multiplexer>,
    shared: Arc<Shared>,
    request_tx: Mutex<Option<Sender<WaitRequest>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Poller {
    /// Create a poller over `mux` and spawn its worker thread.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError::Internal` if the worker thread cannot be
    /// spawned.
    pub fn new(mux: Arc<dyn Multiplexer>, config: &PollerConfig) -> AdapterResult<Self> {
        let shared = Arc::new(Shared {
            notifier: Mutex::new(None),
            gate: Mutex::new(Gate {
                state: PollerState::Idle,
                pending: None,
            }),
            idle_cv: Condvar::new(),
        });
        let (request_tx, request_rx) = bounded::<WaitRequest>(1);
        let worker = {
            let mux = Arc::clone(&mux);
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name(config.thread_name.clone())
                .stack_size(config.thread_stack_size)
                .spawn(move || worker_loop(&mux, &shared, &request_rx))
                .map_err(|e| {
                    AdapterError::Internal(format!("failed to spawn poller worker: {e}"))
                })?
        };
        Ok(Self {
            mux,
            shared,
            request_tx: Mutex::new(Some(request_tx)),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Current state (for diagnostics and tests).
    #[must_use]
    pub fn state(&self) -> PollerState {
        self.shared.gate.lock().state
    }

    /// Wait for readiness without blocking the calling thread.
    ///
    /// # Errors
    ///
    /// Propagates multiplexer failures and returns
    /// `AdapterError::PollerClosed` after [`close`](Self::close).
    ///
    /// # Panics
    ///
    /// Panics if called while a wait is outstanding; the caller must only
    /// re-invoke after being notified.
    pub fn select(&self, timeout: Option<Duration>) -> AdapterResult<Select> {
        {
            let mut gate = self.shared.gate.lock();
            match gate.state {
                PollerState::Closed => return Err(AdapterError::PollerClosed),
                PollerState::Busy => {
                    panic!("Poller::select called while a wait is outstanding")
                }
                PollerState::Idle => {}
            }
            // Consume the previous worker result exactly once.
            if let Some(result) = gate.pending.take() {
                return Ok(Select::Ready(result?));
            }
        }

        // With no notifier attached (NATIVE mode) or a zero timeout, the
        // real wait is performed synchronously.
        let notifier_attached = self.shared.notifier.lock().is_some();
        if !notifier_attached || timeout == Some(Duration::ZERO) {
            return Ok(Select::Ready(self.mux.wait(timeout)?));
        }

        // Zero-timeout probe: skip the worker when work is already there.
        let probe = self.mux.wait(Some(Duration::ZERO))?;
        if !probe.is_empty() {
            return Ok(Select::Ready(probe));
        }

        self.shared.gate.lock().state = PollerState::Busy;
        let sent = {
            let tx = self.request_tx.lock();
            tx.as_ref()
                .map(|tx| tx.send(WaitRequest { timeout }).is_ok())
                .unwrap_or(false)
        };
        if !sent {
            self.shared.gate.lock().state = PollerState::Idle;
            return Err(AdapterError::Internal("poller worker is gone".into()));
        }
        debug!(?timeout, "wait handed to poller worker");
        Ok(Select::Yielded)
    }

    /// Install or remove the notifier.
    ///
    /// If a wait is outstanding, the *current* notifier is woken and this
    /// call blocks until the poller is IDLE before installing `notifier`,
    /// so two notifiers can never fire for the same wait.
    pub fn set_notifier(&self, notifier: Option<Arc<Notifier>>) {
        self.unblock_and_wait_idle();
        *self.shared.notifier.lock() = notifier;
    }

    /// Register a readiness source, unblocking any outstanding wait first.
    ///
    /// # Errors
    ///
    /// Propagates multiplexer failures.
    pub fn register(&self, token: Token, interest: Interest) -> AdapterResult<()> {
        self.unblock_and_wait_idle();
        self.mux.register(token, interest).map_err(AdapterError::from)
    }

    /// Change the interest of a source, unblocking any outstanding wait
    /// first.
    ///
    /// # Errors
    ///
    /// Propagates multiplexer failures.
    pub fn modify(&self, token: Token, interest: Interest) -> AdapterResult<()> {
        self.unblock_and_wait_idle();
        self.mux.modify(token, interest).map_err(AdapterError::from)
    }

    /// Remove a source, unblocking any outstanding wait first.
    ///
    /// # Errors
    ///
    /// Propagates multiplexer failures.
    pub fn unregister(&self, token: Token) -> AdapterResult<()> {
        self.unblock_and_wait_idle();
        self.mux.unregister(token).map_err(AdapterError::from)
    }

    /// Latching wake of the multiplexer (any thread).
    pub fn wake(&self) {
        if let Err(e) = self.mux.wake() {
            warn!(error = %e, "multiplexer wake failed");
        }
    }

    /// Shut down the worker thread and release the multiplexer.
    ///
    /// If a wait is outstanding it is woken first and this call blocks
    /// until the worker retires it; a dangling worker is never left behind.
    ///
    /// # Errors
    ///
    /// Propagates a failed wake and reports a panicked worker.
    pub fn close(&self) -> AdapterResult<()> {
        {
            let mut gate = self.shared.gate.lock();
            match gate.state {
                PollerState::Closed => return Ok(()),
                PollerState::Busy => {
                    self.mux.wake()?;
                    while gate.state == PollerState::Busy {
                        self.shared.idle_cv.wait(&mut gate);
                    }
                }
                PollerState::Idle => {}
            }
            gate.state = PollerState::Closed;
            gate.pending = None;
        }
        *self.shared.notifier.lock() = None;
        // Dropping the sender ends the worker's recv loop.
        *self.request_tx.lock() = None;
        if let Some(handle) = self.worker.lock().take() {
            handle
                .join()
                .map_err(|_| AdapterError::Internal("poller worker panicked".into()))?;
        }
        info!("poller closed");
        Ok(())
    }

    /// Wake any outstanding wait and block until the poller is IDLE.
    fn unblock_and_wait_idle(&self) {
        let mut gate = self.shared.gate.lock();
        assert!(
            gate.state != PollerState::Closed,
            "poller already closed"
        );
        if gate.state == PollerState::Busy {
            self.wake();
            while gate.state == PollerState::Busy {
                self.shared.idle_cv.wait(&mut gate);
            }
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        // Best-effort shutdown for pollers dropped without close(): end the
        // request loop, unblock any outstanding wait, and reap the worker.
        *self.request_tx.lock() = None;
        if let Err(e) = self.mux.wake() {
            warn!(error = %e, "multiplexer wake failed during drop");
        }
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }
    }
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller").field("state", &self.state()).finish()
    }
}

fn worker_loop(mux: &Arc<dyn Multiplexer>, shared: &Arc<Shared>, requests: &Receiver<WaitRequest>) {
    debug!("poller worker started");
    while let Ok(request) = requests.recv() {
        let result = mux.wait(request.timeout);
        // Snapshot the notifier before flipping IDLE: set_notifier may swap
        // it the moment the state changes, and the notifier installed at
        // the time the wait started is the one that must fire.
        let notifier = shared.notifier.lock().clone();
        {
            let mut gate = shared.gate.lock();
            debug_assert_eq!(gate.state, PollerState::Busy, "worker finished a wait while not BUSY");
            gate.pending = Some(result);
            gate.state = PollerState::Idle;
            shared.idle_cv.notify_all();
        }
        if let Some(n) = notifier {
            n.notify();
        }
    }
    debug!("poller worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::host::QueueHost;
    use crate::infra::mux::ManualMultiplexer;

    fn fixture() -> (Arc<ManualMultiplexer>, Poller, Arc<Notifier>) {
        let mux = Arc::new(ManualMultiplexer::new());
        let poller = Poller::new(
            Arc::clone(&mux) as Arc<dyn Multiplexer>,
            &PollerConfig::default(),
        )
        .unwrap();
        let notifier = Notifier::detached(QueueHost::new());
        (mux, poller, notifier)
    }

    fn wait_until_idle(poller: &Poller) {
        for _ in 0..1000 {
            if poller.state() == PollerState::Idle {
                return;
            }
            thread::sleep(Duration::from_millis(1));
        }
        panic!("poller did not return to IDLE");
    }

    #[test]
    fn test_select_is_synchronous_without_notifier() {
        let (_mux, poller, _notifier) = fixture();
        let select = poller.select(Some(Duration::ZERO)).unwrap();
        assert!(matches!(select, Select::Ready(ref events) if events.is_empty()));
        assert_eq!(poller.state(), PollerState::Idle);
        poller.close().unwrap();
    }

    #[test]
    fn test_select_yields_and_pending_is_consumed_once() {
        let (mux, poller, notifier) = fixture();
        poller.set_notifier(Some(notifier));
        assert!(matches!(poller.select(None).unwrap(), Select::Yielded));
        assert_eq!(poller.state(), PollerState::Busy);

        mux.wake().unwrap();
        wait_until_idle(&poller);

        // First select after the wait consumes the stored result: the wake
        // that retired the worker, delivered as an event.
        let select = poller.select(Some(Duration::ZERO)).unwrap();
        match select {
            Select::Ready(events) => {
                assert_eq!(events.len(), 1);
                assert_eq!(events[0].token, Token::WAKE);
            }
            Select::Yielded => panic!("expected the stored worker result"),
        }
        poller.set_notifier(None);
        poller.close().unwrap();
    }

    #[test]
    fn test_latched_wake_is_delivered_not_absorbed() {
        let (mux, poller, notifier) = fixture();
        poller.set_notifier(Some(notifier));
        mux.wake().unwrap();
        // A wake latched before select must terminate the pass as
        // readiness; consuming it on the way to the worker would strand
        // the wait with nothing left to wake it.
        let select = poller.select(None).unwrap();
        match select {
            Select::Ready(events) => {
                assert_eq!(events.len(), 1);
                assert_eq!(events[0].token, Token::WAKE);
            }
            Select::Yielded => panic!("latched wake was handed to the worker"),
        }
        assert_eq!(poller.state(), PollerState::Idle);
        poller.set_notifier(None);
        poller.close().unwrap();
    }

    #[test]
    fn test_ready_probe_skips_the_worker() {
        let (mux, poller, notifier) = fixture();
        poller.register(Token(1), Interest::Readable).unwrap();
        poller.set_notifier(Some(notifier));
        mux.set_ready(Token(1), Interest::Readable);
        let select = poller.select(None).unwrap();
        match select {
            Select::Ready(events) => {
                assert_eq!(events.len(), 1);
                assert_eq!(events[0].token, Token(1));
            }
            Select::Yielded => panic!("expected immediate readiness"),
        }
        assert_eq!(poller.state(), PollerState::Idle);
        poller.set_notifier(None);
        poller.close().unwrap();
    }

    #[test]
    #[should_panic(expected = "while a wait is outstanding")]
    fn test_select_while_busy_panics() {
        let (_mux, poller, notifier) = fixture();
        poller.set_notifier(Some(notifier));
        assert!(matches!(poller.select(None).unwrap(), Select::Yielded));
        let _ = poller.select(None);
    }

    #[test]
    fn test_close_while_busy_retires_the_wait() {
        let (_mux, poller, notifier) = fixture();
        poller.set_notifier(Some(notifier));
        assert!(matches!(poller.select(None).unwrap(), Select::Yielded));
        poller.close().unwrap();
        assert_eq!(poller.state(), PollerState::Closed);
        assert!(matches!(
            poller.select(None),
            Err(AdapterError::PollerClosed)
        ));
    }

    #[test]
    fn test_registration_unblocks_an_outstanding_wait() {
        let (_mux, poller, notifier) = fixture();
        poller.set_notifier(Some(notifier));
        assert!(matches!(poller.select(None).unwrap(), Select::Yielded));
        // register() must wake the wait and block until IDLE.
        poller.register(Token(9), Interest::Writable).unwrap();
        assert_eq!(poller.state(), PollerState::Idle);
        poller.set_notifier(None);
        poller.close().unwrap();
    }

    #[test]
    fn test_close_is_idempotent() {
        let (_mux, poller, _notifier) = fixture();
        poller.close().unwrap();
        poller.close().unwrap();
    }
}
