//! Task bookkeeping for the scheduler engine.
//!
//! A task pairs a boxed future with shared completion/cancellation flags.
//! Waking a task queues one step callback on its engine; the step itself is
//! always executed by the engine so the task-context stack stays accurate.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};

use futures::task::ArcWake;
use parking_lot::Mutex;

use crate::core::scheduler::{TaskFlags, TaskFuture, TaskHandle};
use crate::runtime::core_loop::CoreLoop;

pub(crate) struct Task {
    id: u64,
    /// Taken while being polled; `None` also after completion.
    future: Mutex<Option<TaskFuture>>,
    flags: Arc<TaskFlags>,
    engine: Weak<CoreLoop>,
}

impl Task {
    pub(crate) fn new(id: u64, future: TaskFuture, engine: Weak<CoreLoop>) -> Arc<Self> {
        Arc::new(Self {
            id,
            future: Mutex::new(Some(future)),
            flags: Arc::new(TaskFlags::default()),
            engine,
        })
    }

    pub(crate) const fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn handle(&self) -> TaskHandle {
        TaskHandle::new(self.id, Arc::clone(&self.flags))
    }

    pub(crate) fn take_future(&self) -> Option<TaskFuture> {
        self.future.lock().take()
    }

    pub(crate) fn put_back(&self, future: TaskFuture) {
        *self.future.lock() = Some(future);
    }

    pub(crate) fn drop_future(&self) {
        *self.future.lock() = None;
    }

    pub(crate) fn request_cancel(&self) {
        self.flags.cancelled.store(true, Ordering::SeqCst);
    }

    pub(crate) fn take_cancelled(&self) -> bool {
        self.flags.cancelled.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_finished(&self) {
        self.flags.finished.store(true, Ordering::SeqCst);
    }
}

impl ArcWake for Task {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        if let Some(engine) = arc_self.engine.upgrade() {
            engine.schedule_step(Arc::clone(arc_self));
        }
    }
}
