//! Listener-set event model (§9 "Events on data-carrying objects").
//!
//! The teacher's source (and the spec it was distilled from) uses
//! multicast event delegates. Rust has no such concept, so clients and
//! servers instead hold an explicit `Vec` of listeners with add/remove
//! operations; each listener runs serially per event per object, and a
//! listener that panics never unwinds into the dispatch loop — the panic
//! is caught and logged (or, for the server's `ClientAccepted` handler,
//! routed to `ClientException` per §4.H).

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

/// A single listener, boxed so a client/server can hold a heterogeneous
/// set of closures.
pub type Listener<E> = Arc<dyn Fn(E) + Send + Sync>;

/// An ordered set of listeners for one event type, invoked serially.
#[derive(Default)]
pub struct Listeners<E> {
    inner: Mutex<Vec<Listener<E>>>,
}

impl<E: Clone> Listeners<E> {
    pub fn new() -> Self {
        Listeners {
            inner: Mutex::new(Vec::new()),
        }
    }

    /// Registers `listener`, returning a token that can be passed to
    /// [`Listeners::remove`].
    pub fn add(&self, listener: Listener<E>) -> usize {
        let mut guard = self.inner.lock().unwrap();
        guard.push(listener);
        guard.len() - 1
    }

    /// Removes the listener at `token`, if still present. Tokens are
    /// stable for the lifetime of the listener set (removal leaves a hole
    /// rather than shifting later tokens).
    pub fn remove(&self, token: usize) {
        let mut guard = self.inner.lock().unwrap();
        if token < guard.len() {
            guard.remove(token);
        }
    }

    /// Invokes every registered listener with a clone of `event`, serially,
    /// in registration order. A listener that panics is caught and logged;
    /// it does not stop the remaining listeners from firing and never
    /// unwinds into the caller.
    pub fn emit(&self, event: E) {
        let listeners = self.inner.lock().unwrap().clone();
        for listener in listeners {
            let event = event.clone();
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                log::error!("event listener panicked; continuing dispatch to remaining listeners");
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }

    /// Like [`Listeners::emit`], but instead of logging a panicking
    /// listener and moving on, reports how many panicked so the caller
    /// can route the failure elsewhere (the TCP server's
    /// `ClientException`, per §4.H, rather than a bare log line).
    pub fn emit_reporting(&self, event: E) -> usize {
        let listeners = self.inner.lock().unwrap().clone();
        let mut panicked = 0;
        for listener in listeners {
            let event = event.clone();
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                panicked += 1;
            }
        }
        panicked
    }
}
