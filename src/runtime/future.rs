//! Futures built on the adapter's timer facility.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::task::AtomicWaker;

use crate::core::adapter::HostAdapter;
use crate::core::scheduler::TimerHandle;

struct SleepState {
    done: AtomicBool,
    waker: AtomicWaker,
}

/// Future that resolves after a fixed delay on the adapter's timer heap.
/// Dropping it cancels the underlying timer.
#[must_use = "futures do nothing unless polled"]
pub struct Sleep {
    state: Arc<SleepState>,
    timer: TimerHandle,
}

/// Resolve after `duration`, timed by `adapter`'s scheduler.
pub fn sleep(adapter: &HostAdapter, duration: Duration) -> Sleep {
    let state = Arc::new(SleepState {
        done: AtomicBool::new(false),
        waker: AtomicWaker::new(),
    });
    let shared = Arc::clone(&state);
    let timer = adapter.call_later(
        duration,
        Box::new(move || {
            shared.done.store(true, Ordering::SeqCst);
            shared.waker.wake();
        }),
    );
    Sleep { state, timer }
}

impl Future for Sleep {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.state.done.load(Ordering::SeqCst) {
            return Poll::Ready(());
        }
        self.state.waker.register(cx.waker());
        // Re-check: the timer may have fired between the load and the
        // waker registration.
        if self.state.done.load(Ordering::SeqCst) {
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }
}

impl Drop for Sleep {
    fn drop(&mut self) {
        if !self.state.done.load(Ordering::SeqCst) {
            self.timer.cancel();
        }
    }
}

impl std::fmt::Debug for Sleep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sleep")
            .field("done", &self.state.done.load(Ordering::SeqCst))
            .finish()
    }
}
