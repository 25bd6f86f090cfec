//! Concrete collaborators: a queue-pumping host runtime, an in-memory
//! multiplexer, and interrupt sources.

pub mod host;
pub mod mux;
pub mod signal;

pub use host::QueueHost;
pub use mux::ManualMultiplexer;
pub use signal::ManualInterrupts;
#[cfg(unix)]
pub use signal::SigintDeferral;
