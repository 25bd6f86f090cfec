//! The blocking I/O multiplexer seam.
//!
//! A [`Multiplexer`] is the one blocking primitive this crate wraps: a
//! POSIX-`select`-like "wait for readiness or timeout" call plus a wake
//! mechanism that can force an in-progress wait to return early. The
//! [`Poller`](crate::core::Poller) owns exactly one of these and is the only
//! component allowed to call [`Multiplexer::wait`].

use std::io;
use std::time::Duration;

/// Identifies a registered readiness source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(pub usize);

impl Token {
    /// Reserved token under which a consumed wake is delivered. Never
    /// valid for registration.
    pub const WAKE: Self = Self(usize::MAX);
}

/// The readiness kinds a source can be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    /// Readable readiness only.
    Readable,
    /// Writable readiness only.
    Writable,
    /// Both readable and writable readiness.
    Both,
}

impl Interest {
    /// Whether `self` covers the given readiness kind.
    #[must_use]
    pub const fn covers(self, other: Self) -> bool {
        matches!(
            (self, other),
            (Self::Both, _) | (Self::Readable, Self::Readable) | (Self::Writable, Self::Writable)
        )
    }
}

/// A single readiness report produced by [`Multiplexer::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    /// The source that became ready.
    pub token: Token,
    /// The readiness that occurred.
    pub ready: Interest,
}

/// Blocking readiness multiplexer.
///
/// # Contract
///
/// - `wait` blocks the calling thread until at least one event is ready,
///   the timeout elapses (`Ok(vec![])`), or a wake is consumed. `None`
///   means no timeout.
/// - `wake` must be callable from any thread, must never block, and must
///   *latch*: a wake issued while no wait is in progress causes the next
///   `wait` to return immediately (self-pipe semantics). Consecutive wakes
///   may coalesce. A consumed wake is reported as a readiness event for
///   [`Token::WAKE`], never as a bare timeout: callers must be able to
///   tell a wake apart from an uneventful expiry.
/// - `register`/`modify`/`unregister` must only be called while no wait is
///   in progress; the [`Poller`](crate::core::Poller) enforces this.
pub trait Multiplexer: Send + Sync + 'static {
    /// Register a readiness source under `token`.
    fn register(&self, token: Token, interest: Interest) -> io::Result<()>;
    /// Change the interest of a registered source.
    fn modify(&self, token: Token, interest: Interest) -> io::Result<()>;
    /// Remove a registered source.
    fn unregister(&self, token: Token) -> io::Result<()>;
    /// Block until readiness, timeout, or wake.
    fn wait(&self, timeout: Option<Duration>) -> io::Result<Vec<Event>>;
    /// Force an in-progress (or the next) `wait` to return early.
    fn wake(&self) -> io::Result<()>;
}
