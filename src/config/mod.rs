//! Configuration loading and validation.

pub mod adapter;

pub use adapter::{AdapterConfig, PollerConfig, MIN_POLLER_STACK_SIZE};
