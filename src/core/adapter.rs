//! The host-loop adapter: mode state machine and iteration driver.
//!
//! A [`HostAdapter`] lets a cooperative scheduler engine make progress while
//! a foreign, reentrant host run-loop owns the thread. It drives exactly one
//! scheduler pass per host-loop callback, reschedules itself through the
//! [`Notifier`], and never blocks the host thread.
//!
//! # Modes
//!
//! - **OWNER**: [`run_forever`](HostAdapter::run_forever) creates a nested
//!   host run-loop invocation itself and drives it to completion. External
//!   `start()`/`stop()` bracketing is not used; `stop()` requests exit.
//! - **GUEST**: the caller creates and drives the host run-loop;
//!   [`start`](HostAdapter::start)/[`stop`](HostAdapter::stop) toggle the
//!   *logical* running state, independent of the host loop's physical
//!   lifetime.
//! - **NATIVE**: no host run-loop is involved; `run_forever` degrades to a
//!   plain blocking loop. Intended for bounded teardown after the host
//!   run-loop is gone.
//!
//! # Loop states
//!
//! ```text
//!            bound thread    closed
//! RUNNING    Some            false
//! STOPPED    None            false
//! CLOSED     None            true
//! ```
//!
//! # Fatal-error asymmetry
//!
//! In OWNER and NATIVE modes a fatal error (deferred interrupt, host-loop
//! failure) surfaces synchronously from the call that started the run. In
//! GUEST mode there is no such caller: the adapter cleans up immediately and
//! hands the error to [`HostRuntime::raise_error`], where it surfaces at a
//! later point defined by the host toolkit.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use futures::channel::oneshot;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::error::{AdapterError, AdapterResult};
use crate::core::host::{HostRuntime, LoopExit};
use crate::core::interrupt::InterruptSource;
use crate::core::notifier::Notifier;
use crate::core::scheduler::{
    Callback, IterationOutcome, PassOutcome, SchedulerCore, TaskFuture, TaskHandle, TimerHandle,
};

/// Operating mode, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// The adapter creates and drives a host run-loop invocation itself.
    Owner,
    /// The caller drives an externally created host run-loop; the adapter
    /// only reacts to callbacks.
    Guest,
    /// No host run-loop; plain blocking scheduler, used for teardown.
    Native,
}

/// Derived lifecycle state of an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Not running and not closed.
    Stopped,
    /// A thread identity is bound and the adapter is not closed.
    Running,
    /// Terminal.
    Closed,
}

/// Mutable run state, guarded by one mutex.
struct RunState {
    /// Host thread identity while RUNNING.
    thread: Option<ThreadId>,
    closed: bool,
    stopping: bool,
    notifier: Option<Arc<Notifier>>,
    /// Exit handle of the nested run-loop driven by OWNER `run_forever`.
    nested_exit: Option<Arc<dyn LoopExit>>,
    /// At most one pending modal callback.
    modal: Option<Callback>,
    /// Error recorded on the fatal path, surfaced by `run_forever`.
    fatal: Option<AdapterError>,
}

pub(crate) struct AdapterInner {
    mode: Mode,
    core: Arc<dyn SchedulerCore>,
    host: Option<Arc<dyn HostRuntime>>,
    interrupts: Arc<dyn InterruptSource>,
    /// Bumped on every start and every cleanup; stale notifications carry
    /// an older value and are discarded.
    generation: AtomicU64,
    /// True exactly while a scheduler pass executes on the host thread.
    processing: AtomicBool,
    state: Mutex<RunState>,
}

impl AdapterInner {
    pub(crate) fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Whether the caller is inside a scheduler pass on the bound thread.
    fn is_inside_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
            && self.state.lock().thread == Some(thread::current().id())
    }

    /// Called after a state mutation from interleaved or foreign code:
    /// wakes a RUNNING loop's outstanding wait so the mutation is observed
    /// before the wait would otherwise expire. The mutation must already
    /// be visible when the wake lands.
    fn wake_if_external(&self) {
        let running = self.state.lock().thread.is_some();
        if running && !self.is_inside_processing() {
            self.core.wake();
        }
    }

    /// Bind the thread, create the notifier, and schedule the first pass.
    fn startup(self: &Arc<Self>) -> AdapterResult<()> {
        let host = self
            .host
            .clone()
            .ok_or_else(|| AdapterError::usage("a host runtime is required in OWNER/GUEST mode"))?;
        {
            let mut st = self.state.lock();
            if st.closed {
                return Err(AdapterError::usage("cannot start a closed loop"));
            }
            if st.thread.is_some() {
                return Err(AdapterError::usage("loop is already running"));
            }
            st.thread = Some(thread::current().id());
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
        // A deferred interrupt must be able to unpark an outstanding wait;
        // the flag alone would sit unobserved until the next notification.
        let wake_core = {
            let core = Arc::clone(&self.core);
            Arc::new(move || core.wake())
        };
        let notifier = Notifier::new(
            host,
            Arc::clone(self),
            Arc::clone(&self.interrupts),
            wake_core,
        );
        self.state.lock().notifier = Some(Arc::clone(&notifier));
        self.core.set_notifier(Some(Arc::clone(&notifier)));
        notifier.notify();
        info!(mode = ?self.mode, generation = self.generation(), "logical loop started");
        Ok(())
    }

    /// Stop the logical loop: detach and close the notifier, invalidate
    /// queued notifications, unbind the thread.
    fn cleanup(&self) {
        self.core.set_notifier(None);
        let notifier = self.state.lock().notifier.take();
        if let Some(n) = notifier {
            n.close();
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
        let mut st = self.state.lock();
        st.stopping = false;
        st.thread = None;
        st.modal = None;
        info!("logical loop stopped");
    }

    /// One iteration: a single scheduler pass plus the bookkeeping that
    /// keeps the adapter live without starving the host run-loop.
    pub(crate) fn iterate(&self) -> AdapterResult<()> {
        {
            let st = self.state.lock();
            if st.closed {
                return Err(AdapterError::usage("iterate() on a closed loop"));
            }
            if st.thread.is_none() {
                return Err(AdapterError::usage("iterate() on a loop that is not running"));
            }
        }
        match self.step() {
            Err(e) => {
                self.handle_fatal(e);
                Ok(())
            }
            // The poller worker owns the wait; it will notify on completion.
            Ok(IterationOutcome::Yielded) => Ok(()),
            Ok(IterationOutcome::Deferred(callback)) => {
                // Re-arm before running the callback so that if it launches
                // a nested host run-loop, iterations keep flowing inside it.
                self.notify_next();
                callback();
                Ok(())
            }
            Ok(IterationOutcome::Progressed) => {
                if self.state.lock().stopping {
                    let exit = self.state.lock().nested_exit.clone();
                    if let Some(exit) = exit {
                        // OWNER: quit the nested loop; run_forever cleans up.
                        exit.exit(0);
                    } else {
                        // GUEST: no caller will clean up for us.
                        self.cleanup();
                    }
                } else {
                    // Always one round trip through the host queue before
                    // the next pass; this is what prevents starvation.
                    self.notify_next();
                }
                Ok(())
            }
        }
    }

    /// Run one scheduler pass and fold adapter-level state into the
    /// iteration outcome.
    fn step(&self) -> AdapterResult<IterationOutcome> {
        let stopping = self.state.lock().stopping;
        self.processing.store(true, Ordering::SeqCst);
        let result = self.core.run_once(stopping);
        self.processing.store(false, Ordering::SeqCst);
        let pass = result?;
        if let Some(callback) = self.state.lock().modal.take() {
            return Ok(IterationOutcome::Deferred(callback));
        }
        Ok(match pass {
            PassOutcome::Progressed => IterationOutcome::Progressed,
            PassOutcome::Yielded => IterationOutcome::Yielded,
        })
    }

    /// Terminate the run abnormally with `error`.
    pub(crate) fn handle_fatal(&self, error: AdapterError) {
        warn!(%error, "fatal error: terminating run");
        let exit = self.state.lock().nested_exit.clone();
        match exit {
            Some(exit) => {
                // OWNER: record the error and quit the nested run-loop;
                // run_forever surfaces it.
                self.state.lock().fatal = Some(error);
                exit.exit(1);
            }
            None => {
                // GUEST: clean up now, then hand the error to the host's
                // own channel.
                self.cleanup();
                if let Some(host) = &self.host {
                    host.raise_error(error);
                }
            }
        }
    }

    fn notify_next(&self) {
        if let Some(n) = self.state.lock().notifier.clone() {
            n.notify();
        }
    }
}

/// Adapter between a cooperative scheduler engine and a foreign host
/// run-loop. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct HostAdapter {
    inner: Arc<AdapterInner>,
}

impl HostAdapter {
    /// Create an OWNER-mode adapter.
    pub fn owner(core: Arc<dyn SchedulerCore>, host: Arc<dyn HostRuntime>) -> Self {
        Self::with_parts(
            Mode::Owner,
            core,
            Some(host),
            Arc::new(crate::core::interrupt::NoInterrupts),
        )
    }

    /// Create a GUEST-mode adapter.
    pub fn guest(core: Arc<dyn SchedulerCore>, host: Arc<dyn HostRuntime>) -> Self {
        Self::with_parts(
            Mode::Guest,
            core,
            Some(host),
            Arc::new(crate::core::interrupt::NoInterrupts),
        )
    }

    /// Create a NATIVE-mode adapter (no host run-loop; blocking waits).
    pub fn native(core: Arc<dyn SchedulerCore>) -> Self {
        Self::with_parts(
            Mode::Native,
            core,
            None,
            Arc::new(crate::core::interrupt::NoInterrupts),
        )
    }

    pub(crate) fn with_parts(
        mode: Mode,
        core: Arc<dyn SchedulerCore>,
        host: Option<Arc<dyn HostRuntime>>,
        interrupts: Arc<dyn InterruptSource>,
    ) -> Self {
        Self {
            inner: Arc::new(AdapterInner {
                mode,
                core,
                host,
                interrupts,
                generation: AtomicU64::new(0),
                processing: AtomicBool::new(false),
                state: Mutex::new(RunState {
                    thread: None,
                    closed: false,
                    stopping: false,
                    notifier: None,
                    nested_exit: None,
                    modal: None,
                    fatal: None,
                }),
            }),
        }
    }

    /// The adapter's operating mode.
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.inner.mode
    }

    /// Derived lifecycle state.
    #[must_use]
    pub fn state(&self) -> LoopState {
        let st = self.inner.state.lock();
        if st.closed {
            LoopState::Closed
        } else if st.thread.is_some() {
            LoopState::Running
        } else {
            LoopState::Stopped
        }
    }

    /// Whether the logical loop is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() == LoopState::Running
    }

    /// The scheduler engine this adapter drives.
    #[must_use]
    pub fn core(&self) -> Arc<dyn SchedulerCore> {
        Arc::clone(&self.inner.core)
    }

    /// Run the loop until [`stop`](Self::stop) is requested.
    ///
    /// OWNER: launches a nested host run-loop invocation and drives it to
    /// completion; a fatal error surfaces here. NATIVE: plain blocking
    /// loop. GUEST: usage error, since the caller drives the host loop.
    ///
    /// # Errors
    ///
    /// Usage errors for GUEST mode or a loop that is closed/already
    /// running; fatal-class errors recorded during the run.
    pub fn run_forever(&self) -> AdapterResult<()> {
        match self.inner.mode {
            Mode::Guest => Err(AdapterError::usage(
                "run_forever() cannot be called in GUEST mode",
            )),
            Mode::Native => self.run_native(),
            Mode::Owner => self.run_owner(),
        }
    }

    fn run_owner(&self) -> AdapterResult<()> {
        let host = self
            .inner
            .host
            .clone()
            .ok_or_else(|| AdapterError::usage("a host runtime is required in OWNER mode"))?;
        self.inner.startup()?;
        let mut nested = host.nested();
        self.inner.state.lock().nested_exit = Some(nested.exit_handle());
        let code = nested.run();
        debug!(code, "owner-mode nested run-loop exited");
        self.inner.state.lock().nested_exit = None;
        let fatal = self.inner.state.lock().fatal.take();
        self.inner.cleanup();
        if code == 0 {
            Ok(())
        } else {
            Err(fatal.unwrap_or(AdapterError::HostLoopExit(code)))
        }
    }

    fn run_native(&self) -> AdapterResult<()> {
        {
            let mut st = self.inner.state.lock();
            if st.closed {
                return Err(AdapterError::usage("cannot run a closed loop"));
            }
            if st.thread.is_some() {
                return Err(AdapterError::usage("loop is already running"));
            }
            st.thread = Some(thread::current().id());
        }
        // No notifier: every poller wait is synchronous and blocking.
        self.inner.core.set_notifier(None);
        self.inner.processing.store(true, Ordering::SeqCst);
        let result = loop {
            let stopping = self.inner.state.lock().stopping;
            match self.inner.core.run_once(stopping) {
                Ok(PassOutcome::Progressed) => {
                    if self.inner.state.lock().stopping {
                        break Ok(());
                    }
                }
                Ok(PassOutcome::Yielded) => {
                    break Err(AdapterError::Internal(
                        "scheduler yielded without a notifier".into(),
                    ));
                }
                Err(e) => break Err(e),
            }
        };
        self.inner.processing.store(false, Ordering::SeqCst);
        let mut st = self.inner.state.lock();
        st.stopping = false;
        st.thread = None;
        st.modal = None;
        result
    }

    /// Start the logical loop (GUEST mode only). The caller is responsible
    /// for driving the host run-loop afterwards.
    ///
    /// # Errors
    ///
    /// Usage error outside GUEST mode, or if closed/already running.
    pub fn start(&self) -> AdapterResult<()> {
        if self.inner.mode != Mode::Guest {
            return Err(AdapterError::usage(
                "start() can only be called in GUEST mode",
            ));
        }
        self.inner.startup()
    }

    /// Request the loop to stop.
    ///
    /// OWNER/NATIVE: may be called at any time; a stopped loop will run
    /// exactly one pass and stop the next time it runs. GUEST: requires a
    /// running loop; called from interleaved or foreign code it wakes any
    /// outstanding wait and stops the logical loop immediately, since there
    /// may be no host loop left to run another iteration.
    ///
    /// # Errors
    ///
    /// Usage error for GUEST mode on a non-running loop.
    pub fn stop(&self) -> AdapterResult<()> {
        match self.inner.mode {
            Mode::Owner | Mode::Native => {
                // Flag first: the woken pass must already see it.
                self.inner.state.lock().stopping = true;
                self.inner.wake_if_external();
                Ok(())
            }
            Mode::Guest => {
                if !self.is_running() {
                    return Err(AdapterError::usage(
                        "stop() requires a running loop in GUEST mode",
                    ));
                }
                // Mid-pass, the iteration driver performs the cleanup once
                // the pass ends; otherwise there may be no iteration left
                // to run and the loop stops here and now.
                if self.inner.processing.load(Ordering::SeqCst) {
                    self.inner.state.lock().stopping = true;
                } else {
                    self.inner.state.lock().stopping = true;
                    self.inner.core.wake();
                    self.inner.cleanup();
                }
                Ok(())
            }
        }
    }

    /// Close the adapter and release the engine's poller.
    ///
    /// Only legal while STOPPED; idempotent once closed.
    ///
    /// # Errors
    ///
    /// Usage error if the loop is running; engine close failures.
    pub fn close(&self) -> AdapterResult<()> {
        {
            let mut st = self.inner.state.lock();
            if st.thread.is_some() {
                return Err(AdapterError::usage("cannot close a running loop"));
            }
            if st.closed {
                return Ok(());
            }
            st.closed = true;
        }
        self.inner.core.close()
    }

    /// Schedule a callback for the next pass (wakes an outstanding wait if
    /// called from interleaved or foreign code).
    pub fn call_soon(&self, callback: Callback) {
        self.inner.core.call_soon(callback);
        self.inner.wake_if_external();
    }

    /// Schedule a callback after `delay`.
    pub fn call_later(&self, delay: Duration, callback: Callback) -> TimerHandle {
        let handle = self.inner.core.call_later(delay, callback);
        self.inner.wake_if_external();
        handle
    }

    /// Schedule a callback at the absolute instant `when`.
    pub fn call_at(&self, when: Instant, callback: Callback) -> TimerHandle {
        let handle = self.inner.core.call_at(when, callback);
        self.inner.wake_if_external();
        handle
    }

    /// Create a task whose first step runs at the next pass.
    pub fn spawn(&self, future: TaskFuture) -> TaskHandle {
        let handle = self.inner.core.spawn(future);
        self.inner.wake_if_external();
        handle
    }

    /// Create a task and execute its first step synchronously, so all side
    /// effects up to the first suspension point are visible when this
    /// returns. Intended for toolkit-callback wrappers that must leave
    /// observable state consistent immediately.
    pub fn run_task(&self, future: TaskFuture) -> TaskHandle {
        let handle = self.inner.core.spawn_eager(future);
        self.inner.wake_if_external();
        handle
    }

    /// Schedule `callback` to run as interleaved code immediately after the
    /// current iteration unwinds.
    ///
    /// Because the next notification is re-armed before the callback runs,
    /// the callback may launch a nested host run-loop (a modal dialog)
    /// without stalling the scheduler.
    ///
    /// # Errors
    ///
    /// Usage error when not called from inside a running pass, when a modal
    /// callback is already pending, or in NATIVE mode.
    pub fn exec_interleaved(&self, callback: Callback) -> AdapterResult<()> {
        let inner = &self.inner;
        if inner.mode == Mode::Native {
            return Err(AdapterError::usage(
                "exec_interleaved() requires a host run-loop",
            ));
        }
        if !inner.is_inside_processing() {
            return Err(AdapterError::usage(
                "exec_interleaved() must be called from a scheduler callback or task",
            ));
        }
        {
            let mut st = inner.state.lock();
            if st.modal.is_some() {
                return Err(AdapterError::usage(
                    "a modal callback is already scheduled and pending",
                ));
            }
            st.modal = Some(callback);
        }
        inner.core.defer_current_pass();
        Ok(())
    }

    /// Run `f` as interleaved code and await its result from a task.
    ///
    /// The returned future resolves once `f` has run; `f` may launch a
    /// nested host run-loop while the scheduler keeps making progress.
    ///
    /// # Errors
    ///
    /// Same usage errors as [`exec_interleaved`](Self::exec_interleaved).
    pub fn modal<T, F>(&self, f: F) -> AdapterResult<ModalHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.exec_interleaved(Box::new(move || {
            let _ = tx.send(f());
        }))?;
        Ok(ModalHandle { rx })
    }

    /// Drive one iteration by hand. Normally invoked by the notifier; public
    /// so hosts with unusual dispatch can wire the callback themselves.
    ///
    /// # Errors
    ///
    /// Usage error on a closed or non-running loop.
    pub fn iterate(&self) -> AdapterResult<()> {
        self.inner.iterate()
    }
}

impl std::fmt::Debug for HostAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostAdapter")
            .field("mode", &self.inner.mode)
            .field("state", &self.state())
            .finish()
    }
}

/// Future resolving to the result of a modal callback.
#[derive(Debug)]
pub struct ModalHandle<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Future for ModalHandle<T> {
    type Output = AdapterResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|r| {
            r.map_err(|_| AdapterError::Internal("modal callback dropped without running".into()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scheduler::TaskFlags;
    use crate::infra::host::QueueHost;
    use std::sync::atomic::AtomicUsize;

    /// Engine double: records wakes and call order, makes no progress of
    /// its own.
    #[derive(Default)]
    struct NullCore {
        wakes: AtomicUsize,
        ops: Mutex<Vec<&'static str>>,
    }

    impl SchedulerCore for NullCore {
        fn run_once(&self, _stopping: bool) -> AdapterResult<PassOutcome> {
            Ok(PassOutcome::Progressed)
        }
        fn call_soon(&self, _callback: Callback) {
            self.ops.lock().push("call_soon");
        }
        fn call_later(&self, _delay: Duration, _callback: Callback) -> TimerHandle {
            TimerHandle::new()
        }
        fn call_at(&self, _when: Instant, _callback: Callback) -> TimerHandle {
            TimerHandle::new()
        }
        fn spawn(&self, _future: TaskFuture) -> TaskHandle {
            TaskHandle::new(0, Arc::new(TaskFlags::default()))
        }
        fn spawn_eager(&self, _future: TaskFuture) -> TaskHandle {
            TaskHandle::new(0, Arc::new(TaskFlags::default()))
        }
        fn cancel_all_tasks(&self) {}
        fn defer_current_pass(&self) {}
        fn wake(&self) {
            self.wakes.fetch_add(1, Ordering::SeqCst);
            self.ops.lock().push("wake");
        }
        fn set_notifier(&self, _notifier: Option<Arc<Notifier>>) {}
        fn close(&self) -> AdapterResult<()> {
            Ok(())
        }
    }

    fn guest_double() -> (Arc<NullCore>, HostAdapter) {
        let core = Arc::new(NullCore::default());
        let adapter = HostAdapter::guest(
            Arc::clone(&core) as Arc<dyn SchedulerCore>,
            QueueHost::new(),
        );
        (core, adapter)
    }

    #[test]
    fn test_guest_state_transitions() {
        let (_core, adapter) = guest_double();
        assert_eq!(adapter.state(), LoopState::Stopped);
        adapter.start().unwrap();
        assert_eq!(adapter.state(), LoopState::Running);
        adapter.stop().unwrap();
        assert_eq!(adapter.state(), LoopState::Stopped);
        adapter.close().unwrap();
        assert_eq!(adapter.state(), LoopState::Closed);
        adapter.close().unwrap();
    }

    #[test]
    fn test_double_start_rejected() {
        let (_core, adapter) = guest_double();
        adapter.start().unwrap();
        assert!(matches!(adapter.start(), Err(AdapterError::Usage(_))));
        adapter.stop().unwrap();
        adapter.close().unwrap();
    }

    #[test]
    fn test_scheduling_from_foreign_code_wakes_a_running_loop() {
        let (core, adapter) = guest_double();
        adapter.call_soon(Box::new(|| {}));
        // Not running: nothing to wake.
        assert_eq!(core.wakes.load(Ordering::SeqCst), 0);
        adapter.start().unwrap();
        adapter.call_soon(Box::new(|| {}));
        assert_eq!(core.wakes.load(Ordering::SeqCst), 1);
        adapter.stop().unwrap();
        adapter.close().unwrap();
    }

    #[test]
    fn test_foreign_scheduling_enqueues_before_waking() {
        let (core, adapter) = guest_double();
        adapter.start().unwrap();
        adapter.call_soon(Box::new(|| {}));
        // The woken pass must find the callback already queued.
        assert_eq!(*core.ops.lock(), vec!["call_soon", "wake"]);
        adapter.stop().unwrap();
        adapter.close().unwrap();
    }

    #[test]
    fn test_generation_advances_per_start_and_stop() {
        let (_core, adapter) = guest_double();
        let g0 = adapter.inner.generation();
        adapter.start().unwrap();
        let g1 = adapter.inner.generation();
        assert!(g1 > g0);
        adapter.stop().unwrap();
        assert!(adapter.inner.generation() > g1);
        adapter.close().unwrap();
    }

    #[test]
    fn test_mode_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Mode::Owner).unwrap(), "\"owner\"");
        let mode: Mode = serde_json::from_str("\"native\"").unwrap();
        assert_eq!(mode, Mode::Native);
    }
}
