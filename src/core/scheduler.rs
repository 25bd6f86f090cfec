//! The scheduler-engine seam.
//!
//! The adapter drives a cooperative scheduler (ready queue, timer heap,
//! tasks) exactly one pass at a time. The engine is injectable behind
//! [`SchedulerCore`] so the adapter can be tested against doubles; the
//! crate's own engine lives in [`runtime::CoreLoop`](crate::runtime::CoreLoop).
//!
//! Pass results are sum types, never control-flow unwinds: "no progress
//! available this turn" is [`PassOutcome::Yielded`], and a pending modal
//! request is folded into [`IterationOutcome::Deferred`] by the adapter.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;

use crate::core::error::AdapterResult;
use crate::core::notifier::Notifier;

/// A deferred zero-argument callback.
pub type Callback = Box<dyn FnOnce() + Send + 'static>;

/// The future type accepted for task execution.
pub type TaskFuture = BoxFuture<'static, ()>;

/// Result of one scheduler pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// The pass ran to completion (callbacks, timers, readiness).
    Progressed,
    /// No result was ready; the poller handed the wait to its worker and
    /// the pass must not be re-entered until the notifier fires.
    Yielded,
}

/// Result of one adapter iteration, after folding in adapter-level state.
pub enum IterationOutcome {
    /// A full pass completed.
    Progressed,
    /// The pass yielded to the host run-loop; the poller worker will
    /// notify when the wait finishes.
    Yielded,
    /// A modal request was issued during the pass; the carried callback
    /// must run as interleaved code after the iteration unwinds.
    Deferred(Callback),
}

impl std::fmt::Debug for IterationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Progressed => f.write_str("Progressed"),
            Self::Yielded => f.write_str("Yielded"),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// Cancellation handle for a scheduled timer.
#[derive(Debug, Clone)]
pub struct TimerHandle {
    cancelled: Arc<AtomicBool>,
}

impl TimerHandle {
    pub(crate) fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(crate) fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Cancel the timer. A cancelled timer's callback never runs.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether [`cancel`](Self::cancel) has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Completion/cancellation flags shared between a task and its handle.
#[derive(Debug, Default)]
pub struct TaskFlags {
    pub(crate) finished: AtomicBool,
    pub(crate) cancelled: AtomicBool,
}

/// Handle to a spawned task.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    id: u64,
    flags: Arc<TaskFlags>,
}

impl TaskHandle {
    pub(crate) fn new(id: u64, flags: Arc<TaskFlags>) -> Self {
        Self { id, flags }
    }

    /// The engine-assigned task id.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Whether the task has run to completion (or been cancelled and
    /// subsequently dropped).
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.flags.finished.load(Ordering::SeqCst)
    }

    /// Request cancellation. The task's future is dropped at its next
    /// scheduled step instead of being polled.
    pub fn cancel(&self) {
        self.flags.cancelled.store(true, Ordering::SeqCst);
    }
}

/// The cooperative scheduler engine driven by the adapter.
///
/// All methods are callable from any thread; engines must protect their own
/// state. The mutate-then-wake contract for cross-thread scheduling is
/// the *adapter's* job, not the engine's.
pub trait SchedulerCore: Send + Sync + 'static {
    /// Run exactly one scheduler pass: poll readiness once (with the time
    /// until the next due timer as the wait budget), fire due timers, and
    /// drain the callbacks that were ready when the pass started.
    ///
    /// `stopping` forces a zero-timeout poll so a stop request is honored
    /// after one final pass.
    fn run_once(&self, stopping: bool) -> AdapterResult<PassOutcome>;

    /// Schedule a callback for the next pass.
    fn call_soon(&self, callback: Callback);

    /// Schedule a callback after `delay`.
    fn call_later(&self, delay: Duration, callback: Callback) -> TimerHandle;

    /// Schedule a callback at the absolute instant `when`.
    fn call_at(&self, when: Instant, callback: Callback) -> TimerHandle;

    /// Create a task and schedule its first step for the next pass.
    fn spawn(&self, future: TaskFuture) -> TaskHandle;

    /// Create a task and execute its first step synchronously on the
    /// calling thread. While the step runs, the new task is the innermost
    /// entry of the engine's task-context stack.
    fn spawn_eager(&self, future: TaskFuture) -> TaskHandle;

    /// Cancel every live task (teardown helper).
    fn cancel_all_tasks(&self);

    /// Cut the current pass short: no further ready entries are dispatched
    /// until the next pass. Used by the modal/interleave mechanism.
    fn defer_current_pass(&self);

    /// Wake the poller's outstanding wait, if any (latching).
    fn wake(&self);

    /// Install or remove the notifier on the engine's poller. Installing
    /// `None` blocks until any outstanding wait has been woken and retired.
    fn set_notifier(&self, notifier: Option<Arc<Notifier>>);

    /// Release the engine's poller and worker thread. Only legal while no
    /// wait is outstanding and no notifier is installed.
    fn close(&self) -> AdapterResult<()>;
}
