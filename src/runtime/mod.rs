//! The crate's scheduler engine and the conveniences built on it.

pub mod core_loop;
pub mod future;
pub mod runner;
pub(crate) mod task;

pub use core_loop::{CoreLoop, IoHandler};
pub use future::{sleep, Sleep};
pub use runner::Runner;
