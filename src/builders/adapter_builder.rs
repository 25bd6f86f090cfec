//! Fluent construction of adapters.

use std::sync::Arc;

use crate::config::PollerConfig;
use crate::core::adapter::{HostAdapter, Mode};
use crate::core::error::{AdapterError, AdapterResult};
use crate::core::host::HostRuntime;
use crate::core::interrupt::{InterruptSource, NoInterrupts};
use crate::core::mux::Multiplexer;
use crate::core::scheduler::SchedulerCore;
use crate::runtime::core_loop::CoreLoop;

/// Builder for a [`HostAdapter`] and its engine.
///
/// By default the builder constructs a [`CoreLoop`] over the supplied
/// multiplexer; [`scheduler`](Self::scheduler) injects a ready-made engine
/// instead, which is how tests substitute a double.
pub struct AdapterBuilder {
    mode: Mode,
    host: Option<Arc<dyn HostRuntime>>,
    mux: Option<Arc<dyn Multiplexer>>,
    scheduler: Option<Arc<dyn SchedulerCore>>,
    interrupts: Arc<dyn InterruptSource>,
    poller: PollerConfig,
}

impl AdapterBuilder {
    /// Start a builder for the given mode.
    #[must_use]
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            host: None,
            mux: None,
            scheduler: None,
            interrupts: Arc::new(NoInterrupts),
            poller: PollerConfig::default(),
        }
    }

    /// Host runtime to dispatch through (required except in NATIVE mode).
    #[must_use]
    pub fn host(mut self, host: Arc<dyn HostRuntime>) -> Self {
        self.host = Some(host);
        self
    }

    /// Multiplexer for the engine built by this builder.
    #[must_use]
    pub fn multiplexer(mut self, mux: Arc<dyn Multiplexer>) -> Self {
        self.mux = Some(mux);
        self
    }

    /// Use an existing engine instead of building one.
    #[must_use]
    pub fn scheduler(mut self, scheduler: Arc<dyn SchedulerCore>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Interrupt source for deferred Ctrl+C handling. Defaults to none.
    #[must_use]
    pub fn interrupts(mut self, interrupts: Arc<dyn InterruptSource>) -> Self {
        self.interrupts = interrupts;
        self
    }

    /// Poller worker settings for the engine built by this builder.
    #[must_use]
    pub fn poller_config(mut self, poller: PollerConfig) -> Self {
        self.poller = poller;
        self
    }

    /// Build the adapter.
    ///
    /// # Errors
    ///
    /// Usage errors for missing collaborators or invalid configuration;
    /// engine construction failures.
    pub fn build(self) -> AdapterResult<HostAdapter> {
        if self.mode != Mode::Native && self.host.is_none() {
            return Err(AdapterError::usage(
                "OWNER and GUEST modes require a host runtime",
            ));
        }
        let core = match self.scheduler {
            Some(core) => core,
            None => {
                let mux = self.mux.ok_or_else(|| {
                    AdapterError::usage("a multiplexer (or an explicit scheduler) is required")
                })?;
                self.poller.validate()?;
                CoreLoop::new(mux, &self.poller)? as Arc<dyn SchedulerCore>
            }
        };
        Ok(HostAdapter::with_parts(
            self.mode,
            core,
            self.host,
            self.interrupts,
        ))
    }
}

impl std::fmt::Debug for AdapterBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterBuilder")
            .field("mode", &self.mode)
            .field("has_host", &self.host.is_some())
            .field("has_mux", &self.mux.is_some())
            .field("has_scheduler", &self.scheduler.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::host::QueueHost;
    use crate::infra::mux::ManualMultiplexer;

    #[test]
    fn test_guest_requires_host() {
        let result = AdapterBuilder::new(Mode::Guest)
            .multiplexer(Arc::new(ManualMultiplexer::new()))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_requires_mux_or_scheduler() {
        let result = AdapterBuilder::new(Mode::Native).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builds_guest_adapter() {
        let adapter = AdapterBuilder::new(Mode::Guest)
            .host(QueueHost::new())
            .multiplexer(Arc::new(ManualMultiplexer::new()))
            .build()
            .unwrap();
        assert_eq!(adapter.mode(), Mode::Guest);
        adapter.close().unwrap();
    }

    #[test]
    fn test_rejects_invalid_poller_config() {
        let result = AdapterBuilder::new(Mode::Native)
            .multiplexer(Arc::new(ManualMultiplexer::new()))
            .poller_config(PollerConfig {
                thread_name: String::new(),
                thread_stack_size: 128 * 1024,
            })
            .build();
        assert!(result.is_err());
    }
}
