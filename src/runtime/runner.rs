//! Bracketed adapter lifecycle with bounded teardown.
//!
//! A [`Runner`] starts a GUEST-mode adapter on construction and guarantees
//! orderly shutdown on [`finish`](Runner::finish) (or best-effort on drop):
//! the logical loop is stopped, every live task is cancelled and drained to
//! completion, and the engine's poller is closed. The drain runs under a
//! fresh NATIVE-mode adapter over the same engine, since by teardown time
//! there may be no host run-loop left to drive iterations.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::PollerConfig;
use crate::core::adapter::HostAdapter;
use crate::core::error::AdapterResult;
use crate::core::host::HostRuntime;
use crate::core::mux::Multiplexer;
use crate::core::scheduler::SchedulerCore;
use crate::runtime::core_loop::CoreLoop;

/// Owns a GUEST adapter from start to drained shutdown.
pub struct Runner {
    adapter: HostAdapter,
    core: Arc<CoreLoop>,
    finished: bool,
}

impl Runner {
    /// Create the engine, start a GUEST adapter over it, and hand both to
    /// the caller. The host run-loop must be driven by the caller.
    ///
    /// # Errors
    ///
    /// Engine construction failures and start usage errors.
    pub fn new(
        host: Arc<dyn HostRuntime>,
        mux: Arc<dyn Multiplexer>,
        config: &PollerConfig,
    ) -> AdapterResult<Self> {
        let core = CoreLoop::new(mux, config)?;
        let adapter = HostAdapter::guest(
            Arc::clone(&core) as Arc<dyn SchedulerCore>,
            host,
        );
        adapter.start()?;
        Ok(Self {
            adapter,
            core,
            finished: false,
        })
    }

    /// The adapter under management.
    #[must_use]
    pub fn adapter(&self) -> &HostAdapter {
        &self.adapter
    }

    /// The engine under management.
    #[must_use]
    pub fn core(&self) -> &Arc<CoreLoop> {
        &self.core
    }

    /// Stop the loop, cancel and drain all tasks, and close the engine.
    ///
    /// # Errors
    ///
    /// Teardown-run and close failures.
    pub fn finish(mut self) -> AdapterResult<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> AdapterResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        if self.adapter.is_running() {
            self.adapter.stop()?;
        }
        info!("draining tasks for shutdown");
        self.core.cancel_all_tasks();
        let teardown = HostAdapter::native(Arc::clone(&self.core) as Arc<dyn SchedulerCore>);
        arm_drain_check(&teardown, &self.core);
        teardown.run_forever()?;
        // Mark the managed adapter closed too, so a retained clone cannot
        // be restarted over the released engine.
        self.adapter.close()?;
        teardown.close()
    }
}

impl Drop for Runner {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(error = %e, "runner shutdown failed");
        }
    }
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("finished", &self.finished)
            .field("adapter", &self.adapter)
            .finish()
    }
}

/// Schedule a per-pass check that stops the teardown loop once every task
/// has been dropped or run to completion. Tasks spawned while draining (by
/// destructors, for instance) are cancelled as they appear.
fn arm_drain_check(adapter: &HostAdapter, core: &Arc<CoreLoop>) {
    let a = adapter.clone();
    let c = Arc::clone(core);
    adapter.call_soon(Box::new(move || {
        if c.has_live_tasks() {
            c.cancel_all_tasks();
            arm_drain_check(&a, &c);
        } else if let Err(e) = a.stop() {
            warn!(error = %e, "teardown stop rejected");
        }
    }));
}
