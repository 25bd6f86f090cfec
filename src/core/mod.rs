//! Core adapter machinery: the mode state machine, the never-blocking
//! poller, the generation-tagged notifier, and the trait seams for the
//! host runtime, the multiplexer, the scheduler engine, and interrupt
//! delivery.

pub mod adapter;
pub mod error;
pub mod host;
pub mod interrupt;
pub mod mux;
pub mod notifier;
pub mod poller;
pub mod scheduler;

pub use adapter::{HostAdapter, LoopState, ModalHandle, Mode};
pub use error::{AdapterError, AdapterResult};
pub use host::{HostRuntime, LoopExit, NestedLoop};
pub use interrupt::{InterruptGuard, InterruptSource, InterruptWake, NoInterrupts};
pub use mux::{Event, Interest, Multiplexer, Token};
pub use notifier::Notifier;
pub use poller::{Poller, PollerState, Select};
pub use scheduler::{
    Callback, IterationOutcome, PassOutcome, SchedulerCore, TaskFuture, TaskHandle, TimerHandle,
};
