//! Tracing setup for embedders and tests.
//!
//! The adapter emits `tracing` events throughout its lifecycle (pass
//! outcomes, stale notifications, worker hand-offs). Nothing is visible
//! until a subscriber is installed; hosts that already run one keep it.

use tracing_subscriber::EnvFilter;

/// Install a default `RUST_LOG`-driven fmt subscriber if the embedding
/// application has not installed one of its own. Safe to call from every
/// test or entry point; later calls are no-ops.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let filter = EnvFilter::from_default_env();
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
