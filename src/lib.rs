//! # Interloop
//!
//! A host-loop adapter that lets a cooperative single-threaded scheduler
//! make progress while a foreign, reentrant run-loop (a GUI toolkit's event
//! loop, typically) owns the thread.
//!
//! ## Core Problem Solved
//!
//! A GUI event loop and a cooperative scheduler both want to own the same
//! thread. Blocking the event loop freezes the interface; blocking the
//! scheduler starves its tasks. This library interleaves the two:
//!
//! - **Never-blocking polling**: the scheduler's readiness wait is handed
//!   to a dedicated worker thread whenever it would block, and the result
//!   is delivered back through the host's own event queue
//! - **One pass per callback**: each host-loop callback runs exactly one
//!   scheduler pass, so host events are dispatched between passes
//! - **Modal without starvation**: interleaved callbacks may run nested
//!   host loops (modal dialogs) while the scheduler keeps ticking
//! - **Deferred Ctrl+C**: an interrupt arriving at an arbitrary moment is
//!   parked in a flag and consumed at a single safe re-entry point
//!
//! ## Modes
//!
//! An adapter runs in one of three modes, fixed at construction:
//!
//! - **OWNER**: [`run_forever`](core::HostAdapter::run_forever) drives a
//!   nested host run-loop invocation itself
//! - **GUEST**: the application owns the host loop;
//!   [`start`](core::HostAdapter::start)/[`stop`](core::HostAdapter::stop)
//!   toggle the logical loop
//! - **NATIVE**: no host loop; plain blocking execution for teardown
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use interloop::builders::AdapterBuilder;
//! use interloop::core::Mode;
//! use interloop::infra::{ManualMultiplexer, QueueHost};
//!
//! let host = QueueHost::new();
//! let adapter = AdapterBuilder::new(Mode::Guest)
//!     .host(Arc::clone(&host) as _)
//!     .multiplexer(Arc::new(ManualMultiplexer::new()))
//!     .build()?;
//!
//! adapter.start()?;
//! adapter.run_task(Box::pin(async { /* ... */ }));
//! // ... pump the host loop ...
//! adapter.stop()?;
//! adapter.close()?;
//! ```
//!
//! For complete examples, see:
//! - `tests/adapter_test.rs` - Full integration tests
//! - `README.md` - Comprehensive documentation

#![deny(warnings)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core adapter machinery: modes, poller, notifier, and trait seams.
pub mod core;
/// Configuration models for adapters and the poller worker.
pub mod config;
/// Builders to construct adapters from configuration.
pub mod builders;
/// Concrete collaborators: queue host, manual multiplexer, signal sources.
pub mod infra;
/// The scheduler engine and the conveniences built on it.
pub mod runtime;
/// Shared utilities.
pub mod util;
