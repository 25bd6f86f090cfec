//! An in-memory multiplexer with readiness injected by hand.
//!
//! [`ManualMultiplexer`] implements the full [`Multiplexer`] contract,
//! including the latching wake, without touching any OS descriptor.
//! Readiness is one-shot: an event injected with
//! [`set_ready`](ManualMultiplexer::set_ready) is delivered by exactly one
//! wait and then forgotten.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::core::mux::{Event, Interest, Multiplexer, Token};

struct MuxState {
    registered: HashMap<Token, Interest>,
    ready: Vec<Event>,
    /// Latched wake; consumed by the next wait that finds nothing ready.
    woken: bool,
}

/// Hand-driven in-memory multiplexer.
pub struct ManualMultiplexer {
    state: Mutex<MuxState>,
    cv: Condvar,
    wakes: AtomicUsize,
}

impl ManualMultiplexer {
    /// Create an empty multiplexer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MuxState {
                registered: HashMap::new(),
                ready: Vec::new(),
                woken: false,
            }),
            cv: Condvar::new(),
            wakes: AtomicUsize::new(0),
        }
    }

    /// Inject a readiness event for `token`. Dropped unless the token is
    /// registered with an interest covering `ready`.
    pub fn set_ready(&self, token: Token, ready: Interest) {
        let mut st = self.state.lock();
        if st
            .registered
            .get(&token)
            .is_some_and(|interest| interest.covers(ready))
        {
            st.ready.push(Event { token, ready });
            self.cv.notify_all();
        }
    }

    /// Number of [`wake`](Multiplexer::wake) calls so far.
    #[must_use]
    pub fn wake_count(&self) -> usize {
        self.wakes.load(Ordering::SeqCst)
    }
}

impl Default for ManualMultiplexer {
    fn default() -> Self {
        Self::new()
    }
}

impl Multiplexer for ManualMultiplexer {
    fn register(&self, token: Token, interest: Interest) -> io::Result<()> {
        if token == Token::WAKE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "token is reserved for wake delivery",
            ));
        }
        let mut st = self.state.lock();
        if st.registered.contains_key(&token) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("token {} is already registered", token.0),
            ));
        }
        st.registered.insert(token, interest);
        Ok(())
    }

    fn modify(&self, token: Token, interest: Interest) -> io::Result<()> {
        let mut st = self.state.lock();
        match st.registered.get_mut(&token) {
            Some(slot) => {
                *slot = interest;
                Ok(())
            }
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("token {} is not registered", token.0),
            )),
        }
    }

    fn unregister(&self, token: Token) -> io::Result<()> {
        let mut st = self.state.lock();
        if st.registered.remove(&token).is_none() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("token {} is not registered", token.0),
            ));
        }
        st.ready.retain(|event| event.token != token);
        Ok(())
    }

    fn wait(&self, timeout: Option<Duration>) -> io::Result<Vec<Event>> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut st = self.state.lock();
        loop {
            if !st.ready.is_empty() {
                return Ok(std::mem::take(&mut st.ready));
            }
            if st.woken {
                st.woken = false;
                return Ok(vec![Event {
                    token: Token::WAKE,
                    ready: Interest::Readable,
                }]);
            }
            match deadline {
                Some(deadline) => {
                    if Instant::now() >= deadline {
                        return Ok(Vec::new());
                    }
                    self.cv.wait_until(&mut st, deadline);
                }
                None => self.cv.wait(&mut st),
            }
        }
    }

    fn wake(&self) -> io::Result<()> {
        self.wakes.fetch_add(1, Ordering::SeqCst);
        self.state.lock().woken = true;
        self.cv.notify_all();
        Ok(())
    }
}

impl std::fmt::Debug for ManualMultiplexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.state.lock();
        f.debug_struct("ManualMultiplexer")
            .field("registered", &st.registered.len())
            .field("ready", &st.ready.len())
            .field("woken", &st.woken)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wake_latches_and_is_delivered_as_an_event() {
        let mux = ManualMultiplexer::new();
        mux.wake().unwrap();
        // The latched wake makes an unbounded wait return immediately,
        // reporting the wake under the reserved token.
        let events = mux.wait(None).unwrap();
        assert_eq!(
            events,
            vec![Event {
                token: Token::WAKE,
                ready: Interest::Readable,
            }]
        );
        // Consumed: the next zero-timeout wait times out empty.
        let events = mux.wait(Some(Duration::ZERO)).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_wake_token_is_not_registerable() {
        let mux = ManualMultiplexer::new();
        let err = mux.register(Token::WAKE, Interest::Readable).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_readiness_is_one_shot() {
        let mux = ManualMultiplexer::new();
        mux.register(Token(1), Interest::Readable).unwrap();
        mux.set_ready(Token(1), Interest::Readable);
        let events = mux.wait(Some(Duration::ZERO)).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].token, Token(1));
        assert!(mux.wait(Some(Duration::ZERO)).unwrap().is_empty());
    }

    #[test]
    fn test_readiness_requires_covering_interest() {
        let mux = ManualMultiplexer::new();
        mux.register(Token(2), Interest::Readable).unwrap();
        mux.set_ready(Token(2), Interest::Writable);
        assert!(mux.wait(Some(Duration::ZERO)).unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mux = ManualMultiplexer::new();
        mux.register(Token(3), Interest::Readable).unwrap();
        let err = mux.register(Token(3), Interest::Writable).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
    }

    #[test]
    fn test_unregister_discards_pending_events() {
        let mux = ManualMultiplexer::new();
        mux.register(Token(4), Interest::Both).unwrap();
        mux.set_ready(Token(4), Interest::Readable);
        mux.unregister(Token(4)).unwrap();
        assert!(mux.wait(Some(Duration::ZERO)).unwrap().is_empty());
    }
}
