//! A host runtime backed by a plain callback queue.
//!
//! [`QueueHost`] stands in for a GUI toolkit's event dispatch: callbacks
//! posted from any thread are executed in order by whoever pumps the queue,
//! and nested run-loop invocations share the queue the way modal dialogs
//! share a toolkit's event loop. It is the reference [`HostRuntime`] for
//! tests, demos and headless embeddings.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::debug;

use crate::core::error::AdapterError;
use crate::core::host::{HostRuntime, LoopExit, NestedLoop};
use crate::core::scheduler::Callback;

/// Queue-pumping host runtime.
pub struct QueueHost {
    tx: Sender<Callback>,
    rx: Receiver<Callback>,
    errors: Mutex<Vec<AdapterError>>,
}

impl QueueHost {
    /// Create a host with an empty queue.
    #[must_use]
    pub fn new() -> Arc<Self> {
        let (tx, rx) = unbounded();
        Arc::new(Self {
            tx,
            rx,
            errors: Mutex::new(Vec::new()),
        })
    }

    /// Run the next queued callback, waiting up to `timeout` for one to
    /// arrive. Returns whether a callback ran.
    pub fn pump_one(&self, timeout: Duration) -> bool {
        match self.rx.recv_timeout(timeout) {
            Ok(callback) => {
                callback();
                true
            }
            Err(_) => false,
        }
    }

    /// Pump until `done()` reports true or `budget` elapses. Returns the
    /// final value of `done()`.
    pub fn pump_until(&self, budget: Duration, mut done: impl FnMut() -> bool) -> bool {
        let deadline = std::time::Instant::now() + budget;
        while !done() {
            let now = std::time::Instant::now();
            if now >= deadline {
                return false;
            }
            self.pump_one(deadline - now);
        }
        true
    }

    /// Errors handed to [`HostRuntime::raise_error`] so far, in order.
    pub fn take_errors(&self) -> Vec<AdapterError> {
        std::mem::take(&mut *self.errors.lock())
    }
}

impl HostRuntime for QueueHost {
    fn post(&self, callback: Callback) {
        // A send failure means the host is gone; the callback is dropped,
        // matching a toolkit discarding events after shutdown.
        let _ = self.tx.send(callback);
    }

    fn nested(&self) -> Box<dyn NestedLoop> {
        Box::new(QueueNestedLoop {
            rx: self.rx.clone(),
            exit: Arc::new(QueueLoopExit {
                code: Mutex::new(None),
                tx: self.tx.clone(),
            }),
        })
    }

    fn raise_error(&self, error: AdapterError) {
        debug!(%error, "host captured adapter error");
        self.errors.lock().push(error);
    }
}

impl std::fmt::Debug for QueueHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueHost")
            .field("queued", &self.rx.len())
            .finish()
    }
}

struct QueueLoopExit {
    code: Mutex<Option<i32>>,
    tx: Sender<Callback>,
}

impl LoopExit for QueueLoopExit {
    fn exit(&self, code: i32) {
        let mut slot = self.code.lock();
        // First exit wins; later calls for the same invocation are no-ops.
        if slot.is_none() {
            *slot = Some(code);
            // Unblock the loop if it is parked in recv.
            let _ = self.tx.send(Box::new(|| {}));
        }
    }
}

struct QueueNestedLoop {
    rx: Receiver<Callback>,
    exit: Arc<QueueLoopExit>,
}

impl NestedLoop for QueueNestedLoop {
    fn run(&mut self) -> i32 {
        loop {
            if let Some(code) = self.exit.code.lock().take() {
                return code;
            }
            match self.rx.recv() {
                Ok(callback) => callback(),
                // All senders gone with no exit requested.
                Err(_) => return -1,
            }
        }
    }

    fn exit_handle(&self) -> Arc<dyn LoopExit> {
        Arc::clone(&self.exit) as Arc<dyn LoopExit>
    }
}
