//! The crate's own scheduler engine.
//!
//! [`CoreLoop`] is a cooperative single-threaded scheduler: a ready queue,
//! a timer heap and a table of readiness handlers, drained one pass at a
//! time through [`SchedulerCore::run_once`]. It owns a [`Poller`] so a pass
//! never blocks the calling thread while a notifier is attached.
//!
//! A pass dispatches only the entries that were ready when the pass
//! started; entries queued during the pass run in the next pass. This is
//! the fairness property the adapter relies on to interleave scheduler work
//! with host-loop work.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::config::PollerConfig;
use crate::core::error::AdapterResult;
use crate::core::mux::{Event, Interest, Multiplexer, Token};
use crate::core::notifier::Notifier;
use crate::core::poller::{Poller, Select};
use crate::core::scheduler::{
    Callback, PassOutcome, SchedulerCore, TaskFuture, TaskHandle, TimerHandle,
};
use crate::runtime::task::Task;

/// Callback invoked with each readiness event for a registered source.
pub type IoHandler = Box<dyn FnMut(Event) + Send + 'static>;

/// One scheduled timer. Ordered by `(when, seq)` so equal deadlines fire
/// in scheduling order.
struct TimerEntry {
    when: Instant,
    seq: u64,
    cancelled: Arc<AtomicBool>,
    callback: Callback,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.when == other.when && self.seq == other.seq
    }
}

impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.when, self.seq).cmp(&(other.when, other.seq))
    }
}

struct EngineState {
    ready: VecDeque<Callback>,
    timers: BinaryHeap<Reverse<TimerEntry>>,
    io: HashMap<Token, Arc<Mutex<IoHandler>>>,
    closed: bool,
}

impl EngineState {
    /// Deadline of the earliest live timer, dropping cancelled heads.
    fn next_deadline(&mut self) -> Option<Instant> {
        while let Some(Reverse(head)) = self.timers.peek() {
            if head.cancelled.load(Ordering::SeqCst) {
                self.timers.pop();
            } else {
                return Some(head.when);
            }
        }
        None
    }

    /// Move every due, non-cancelled timer callback onto the ready queue.
    fn collect_due_timers(&mut self, now: Instant) {
        while let Some(Reverse(head)) = self.timers.peek() {
            if head.cancelled.load(Ordering::SeqCst) {
                self.timers.pop();
            } else if head.when <= now {
                let Some(Reverse(entry)) = self.timers.pop() else {
                    break;
                };
                self.ready.push_back(entry.callback);
            } else {
                break;
            }
        }
    }
}

/// Cooperative single-threaded scheduler engine.
pub struct CoreLoop {
    /// Self-reference handed to task-step closures and wakers.
    weak: Weak<Self>,
    poller: Poller,
    state: Mutex<EngineState>,
    tasks: Mutex<HashMap<u64, Arc<Task>>>,
    /// (thread, task id) pairs of the tasks currently being stepped,
    /// innermost last per thread. Eager spawns may step on any thread, so
    /// entries are scoped to the thread that pushed them.
    context: Mutex<Vec<(ThreadId, u64)>>,
    /// Pass-cut flag: once set, no further ready entries are dispatched
    /// this pass.
    cut: AtomicBool,
    timer_seq: AtomicU64,
    task_seq: AtomicU64,
}

impl CoreLoop {
    /// Create an engine over `mux`, spawning the poller's worker thread.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError::Internal` if the worker cannot be spawned.
    pub fn new(mux: Arc<dyn Multiplexer>, config: &PollerConfig) -> AdapterResult<Arc<Self>> {
        let poller = Poller::new(mux, config)?;
        Ok(Arc::new_cyclic(|weak| Self {
            weak: weak.clone(),
            poller,
            state: Mutex::new(EngineState {
                ready: VecDeque::new(),
                timers: BinaryHeap::new(),
                io: HashMap::new(),
                closed: false,
            }),
            tasks: Mutex::new(HashMap::new()),
            context: Mutex::new(Vec::new()),
            cut: AtomicBool::new(false),
            timer_seq: AtomicU64::new(0),
            task_seq: AtomicU64::new(0),
        }))
    }

    /// Register a readiness source with a handler invoked per event.
    ///
    /// Wakes any outstanding wait so the new source takes effect at once.
    ///
    /// # Errors
    ///
    /// Propagates multiplexer failures; the handler is not retained on
    /// failure.
    pub fn register_io(
        &self,
        token: Token,
        interest: Interest,
        handler: IoHandler,
    ) -> AdapterResult<()> {
        self.state
            .lock()
            .io
            .insert(token, Arc::new(Mutex::new(handler)));
        if let Err(e) = self.poller.register(token, interest) {
            self.state.lock().io.remove(&token);
            return Err(e);
        }
        Ok(())
    }

    /// Change the interest of a registered source.
    ///
    /// # Errors
    ///
    /// Propagates multiplexer failures.
    pub fn modify_io(&self, token: Token, interest: Interest) -> AdapterResult<()> {
        self.poller.modify(token, interest)
    }

    /// Remove a readiness source and drop its handler.
    ///
    /// # Errors
    ///
    /// Propagates multiplexer failures.
    pub fn unregister_io(&self, token: Token) -> AdapterResult<()> {
        self.state.lock().io.remove(&token);
        self.poller.unregister(token)
    }

    /// Whether any spawned task has not yet finished.
    #[must_use]
    pub fn has_live_tasks(&self) -> bool {
        !self.tasks.lock().is_empty()
    }

    /// Id of the task currently being stepped by the calling thread, if
    /// any. Nested stepping (an eager task created from inside another
    /// task) reports the innermost one; steps in progress on other threads
    /// are not visible.
    #[must_use]
    pub fn current_task_id(&self) -> Option<u64> {
        let tid = thread::current().id();
        self.context
            .lock()
            .iter()
            .rev()
            .find_map(|&(owner, id)| (owner == tid).then_some(id))
    }

    fn new_task(&self, future: TaskFuture) -> Arc<Task> {
        let id = self.task_seq.fetch_add(1, Ordering::SeqCst);
        let task = Task::new(id, future, self.weak.clone());
        self.tasks.lock().insert(id, Arc::clone(&task));
        debug!(task = id, "task created");
        task
    }

    /// Queue one step of `task` for the next pass and wake the poller.
    /// The wake latches, so a step queued between passes is never lost.
    pub(crate) fn schedule_step(&self, task: Arc<Task>) {
        let engine = self.weak.clone();
        self.state.lock().ready.push_back(Box::new(move || {
            if let Some(engine) = engine.upgrade() {
                engine.step_task(&task);
            }
        }));
        self.poller.wake();
    }

    /// Poll `task` once. Drops the future instead if cancellation was
    /// requested. Re-entrant steps of the *same* task are no-ops.
    fn step_task(&self, task: &Arc<Task>) {
        if task.take_cancelled() {
            task.drop_future();
            self.retire_task(task.id());
            return;
        }
        let Some(mut future) = task.take_future() else {
            return;
        };
        let tid = thread::current().id();
        self.context.lock().push((tid, task.id()));
        let waker = futures::task::waker(Arc::clone(task));
        let mut cx = Context::from_waker(&waker);
        let poll = future.as_mut().poll(&mut cx);
        {
            // Pop this thread's innermost entry; a step concurrently in
            // progress on another thread keeps its own.
            let mut ctx = self.context.lock();
            if let Some(at) = ctx.iter().rposition(|&(owner, _)| owner == tid) {
                ctx.remove(at);
            }
        }
        match poll {
            Poll::Ready(()) => {
                trace!(task = task.id(), "task finished");
                self.retire_task(task.id());
            }
            Poll::Pending => task.put_back(future),
        }
    }

    fn retire_task(&self, id: u64) {
        if let Some(task) = self.tasks.lock().remove(&id) {
            task.mark_finished();
        }
    }
}

impl SchedulerCore for CoreLoop {
    fn run_once(&self, stopping: bool) -> AdapterResult<PassOutcome> {
        self.cut.store(false, Ordering::SeqCst);

        let timeout = {
            let mut st = self.state.lock();
            if stopping || !st.ready.is_empty() {
                Some(Duration::ZERO)
            } else {
                st.next_deadline()
                    .map(|when| when.saturating_duration_since(Instant::now()))
            }
        };

        let events = match self.poller.select(timeout)? {
            Select::Yielded => return Ok(PassOutcome::Yielded),
            Select::Ready(events) => events,
        };

        let ntodo = {
            let mut st = self.state.lock();
            for event in events {
                // A source unregistered after the wait started may still
                // report; its events are dropped here.
                if let Some(handler) = st.io.get(&event.token).cloned() {
                    st.ready
                        .push_back(Box::new(move || (&mut *handler.lock())(event)));
                }
            }
            st.collect_due_timers(Instant::now());
            st.ready.len()
        };

        // Only entries present at this point run in this pass; anything
        // queued by a callback below waits for the next pass.
        trace!(ntodo, "dispatching pass");
        for _ in 0..ntodo {
            if self.cut.load(Ordering::SeqCst) {
                break;
            }
            let Some(callback) = self.state.lock().ready.pop_front() else {
                break;
            };
            callback();
        }
        Ok(PassOutcome::Progressed)
    }

    fn call_soon(&self, callback: Callback) {
        self.state.lock().ready.push_back(callback);
    }

    fn call_later(&self, delay: Duration, callback: Callback) -> TimerHandle {
        self.call_at(Instant::now() + delay, callback)
    }

    fn call_at(&self, when: Instant, callback: Callback) -> TimerHandle {
        let handle = TimerHandle::new();
        let entry = TimerEntry {
            when,
            seq: self.timer_seq.fetch_add(1, Ordering::SeqCst),
            cancelled: handle.flag(),
            callback,
        };
        self.state.lock().timers.push(Reverse(entry));
        handle
    }

    fn spawn(&self, future: TaskFuture) -> TaskHandle {
        let task = self.new_task(future);
        let handle = task.handle();
        self.schedule_step(task);
        handle
    }

    fn spawn_eager(&self, future: TaskFuture) -> TaskHandle {
        let task = self.new_task(future);
        let handle = task.handle();
        // First step runs here and now, so side effects up to the first
        // suspension point are visible to the caller.
        self.step_task(&task);
        handle
    }

    fn cancel_all_tasks(&self) {
        let tasks: Vec<Arc<Task>> = self.tasks.lock().values().cloned().collect();
        debug!(count = tasks.len(), "cancelling all tasks");
        for task in tasks {
            task.request_cancel();
            self.schedule_step(task);
        }
    }

    fn defer_current_pass(&self) {
        self.cut.store(true, Ordering::SeqCst);
    }

    fn wake(&self) {
        self.poller.wake();
    }

    fn set_notifier(&self, notifier: Option<Arc<Notifier>>) {
        self.poller.set_notifier(notifier);
    }

    fn close(&self) -> AdapterResult<()> {
        {
            let mut st = self.state.lock();
            if st.closed {
                return Ok(());
            }
            st.closed = true;
            st.ready.clear();
            st.timers.clear();
            st.io.clear();
        }
        self.tasks.lock().clear();
        self.poller.close()
    }
}

impl std::fmt::Debug for CoreLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.state.lock();
        f.debug_struct("CoreLoop")
            .field("ready", &st.ready.len())
            .field("timers", &st.timers.len())
            .field("io", &st.io.len())
            .field("tasks", &self.tasks.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::mux::ManualMultiplexer;
    use std::sync::atomic::AtomicUsize;

    fn engine() -> Arc<CoreLoop> {
        CoreLoop::new(Arc::new(ManualMultiplexer::new()), &PollerConfig::default()).unwrap()
    }

    #[test]
    fn test_call_soon_runs_in_next_pass() {
        let engine = engine();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        engine.call_soon(Box::new(move || {
            h.fetch_add(1, Ordering::SeqCst);
        }));
        let outcome = engine.run_once(false).unwrap();
        assert!(matches!(outcome, PassOutcome::Progressed));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        engine.close().unwrap();
    }

    #[test]
    fn test_entries_queued_during_pass_wait_for_next_pass() {
        let engine = engine();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let chained = Arc::clone(&engine);
        engine.call_soon(Box::new(move || {
            h.fetch_add(1, Ordering::SeqCst);
            let h2 = Arc::clone(&h);
            chained.call_soon(Box::new(move || {
                h2.fetch_add(10, Ordering::SeqCst);
            }));
        }));
        engine.run_once(false).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        engine.run_once(false).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 11);
        engine.close().unwrap();
    }

    #[test]
    fn test_cancelled_timer_never_fires() {
        let engine = engine();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let timer = engine.call_later(
            Duration::ZERO,
            Box::new(move || {
                h.fetch_add(1, Ordering::SeqCst);
            }),
        );
        timer.cancel();
        // The latched wake keeps the pass from blocking on an empty agenda.
        engine.wake();
        engine.run_once(false).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        engine.close().unwrap();
    }

    #[test]
    fn test_timers_fire_in_deadline_order() {
        let engine = engine();
        let order = Arc::new(Mutex::new(Vec::new()));
        let now = Instant::now();
        for (label, offset) in [(2u8, 20u64), (1, 10), (3, 30)] {
            let order = Arc::clone(&order);
            engine.call_at(
                now + Duration::from_millis(offset),
                Box::new(move || order.lock().push(label)),
            );
        }
        std::thread::sleep(Duration::from_millis(50));
        engine.run_once(false).unwrap();
        assert_eq!(*order.lock(), vec![1, 2, 3]);
        engine.close().unwrap();
    }

    #[test]
    fn test_pass_cut_leaves_remaining_entries_queued() {
        let engine = engine();
        let hits = Arc::new(AtomicUsize::new(0));
        let cutter = Arc::clone(&engine);
        let h1 = Arc::clone(&hits);
        engine.call_soon(Box::new(move || {
            h1.fetch_add(1, Ordering::SeqCst);
            cutter.defer_current_pass();
        }));
        let h2 = Arc::clone(&hits);
        engine.call_soon(Box::new(move || {
            h2.fetch_add(10, Ordering::SeqCst);
        }));
        engine.run_once(false).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        engine.run_once(false).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 11);
        engine.close().unwrap();
    }

    #[test]
    fn test_spawn_eager_runs_first_step_synchronously() {
        let engine = engine();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let handle = engine.spawn_eager(Box::pin(async move {
            h.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(handle.is_finished());
        assert!(!engine.has_live_tasks());
        engine.close().unwrap();
    }

    #[test]
    fn test_spawn_defers_first_step_to_next_pass() {
        let engine = engine();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let handle = engine.spawn(Box::pin(async move {
            h.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(!handle.is_finished());
        engine.run_once(false).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(handle.is_finished());
        engine.close().unwrap();
    }

    #[test]
    fn test_cancelled_task_is_dropped_without_polling() {
        let engine = engine();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let handle = engine.spawn(Box::pin(async move {
            h.fetch_add(1, Ordering::SeqCst);
        }));
        handle.cancel();
        engine.run_once(false).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(!engine.has_live_tasks());
        engine.close().unwrap();
    }

    #[test]
    fn test_task_context_is_scoped_to_the_stepping_thread() {
        let engine = engine();
        let (started_tx, started_rx) = crossbeam_channel::bounded::<u64>(0);
        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
        let remote_id = Arc::new(Mutex::new(None));
        let recorded = Arc::new(Mutex::new(None));

        let spawner = Arc::clone(&engine);
        let id_slot = Arc::clone(&remote_id);
        let rec = Arc::clone(&recorded);
        let outer = engine.spawn_eager(Box::pin(async move {
            let remote = Arc::clone(&spawner);
            std::thread::spawn(move || {
                let observer = Arc::clone(&remote);
                remote.spawn_eager(Box::pin(async move {
                    started_tx
                        .send(observer.current_task_id().unwrap())
                        .unwrap();
                    release_rx.recv().unwrap();
                    *rec.lock() = observer.current_task_id();
                }));
            });
            // Return only once the remote step is mid-poll on its thread.
            *id_slot.lock() = Some(started_rx.recv().unwrap());
        }));

        // The outer task is done; this thread steps nothing, even though
        // the remote step is still in progress.
        assert!(outer.is_finished());
        assert_eq!(engine.current_task_id(), None);

        release_tx.send(()).unwrap();
        for _ in 0..1000 {
            if !engine.has_live_tasks() {
                break;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(!engine.has_live_tasks());
        assert_eq!(*recorded.lock(), remote_id.lock().take());
        engine.close().unwrap();
    }

    #[test]
    fn test_io_handler_runs_on_readiness() {
        let mux = Arc::new(ManualMultiplexer::new());
        let engine =
            CoreLoop::new(Arc::clone(&mux) as Arc<dyn Multiplexer>, &PollerConfig::default())
                .unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        engine
            .register_io(
                Token(7),
                Interest::Readable,
                Box::new(move |event| {
                    assert_eq!(event.token, Token(7));
                    h.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();
        mux.set_ready(Token(7), Interest::Readable);
        engine.run_once(false).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        engine.close().unwrap();
    }
}
