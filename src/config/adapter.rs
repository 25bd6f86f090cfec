//! Configuration types, loadable from JSON.

use serde::{Deserialize, Serialize};

use crate::core::adapter::Mode;
use crate::core::error::{AdapterError, AdapterResult};

/// Smallest worker stack accepted by [`PollerConfig::validate`].
pub const MIN_POLLER_STACK_SIZE: usize = 16 * 1024;

/// Poller worker thread settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    /// Name given to the worker thread.
    pub thread_name: String,
    /// Worker stack size in bytes. The worker only parks in the
    /// multiplexer, so the default is small.
    pub thread_stack_size: usize,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            thread_name: "interloop-poller".to_string(),
            thread_stack_size: 128 * 1024,
        }
    }
}

impl PollerConfig {
    /// Check the configuration for values the poller cannot run with.
    ///
    /// # Errors
    ///
    /// Usage errors describing the offending field.
    pub fn validate(&self) -> AdapterResult<()> {
        if self.thread_name.is_empty() {
            return Err(AdapterError::usage("poller thread_name must not be empty"));
        }
        if self.thread_stack_size < MIN_POLLER_STACK_SIZE {
            return Err(AdapterError::usage(format!(
                "poller thread_stack_size must be at least {MIN_POLLER_STACK_SIZE} bytes, got {}",
                self.thread_stack_size
            )));
        }
        Ok(())
    }
}

/// Full adapter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Operating mode; fixed for the adapter's lifetime.
    pub mode: Mode,
    /// Poller worker settings.
    pub poller: PollerConfig,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Guest,
            poller: PollerConfig::default(),
        }
    }
}

impl AdapterConfig {
    /// Parse and validate a configuration from JSON.
    ///
    /// # Errors
    ///
    /// Usage errors for malformed JSON or invalid field values.
    pub fn from_json_str(json: &str) -> AdapterResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| AdapterError::usage(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for invalid values.
    ///
    /// # Errors
    ///
    /// Usage errors describing the offending field.
    pub fn validate(&self) -> AdapterResult<()> {
        self.poller.validate()
    }
}
