//! Builders for the crate's main entry points.

pub mod adapter_builder;

pub use adapter_builder::AdapterBuilder;
