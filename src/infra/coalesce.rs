//! Last-request-wins coalescing for checkout recomputations.
//!
//! A request whose key equals the one in flight is dropped. Any other key
//! supersedes the in-flight request; when the older request completes late,
//! [`Coalescer::finish`] reports it as stale and its result is discarded.
//! A [`Ticket`] dropped without being finished (an aborted recompute) releases
//! its key, so the same inputs can run again.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::domain::RecomputeKey;

#[derive(Debug, Default)]
struct InFlight {
    key: Option<RecomputeKey>,
    generation: u64,
}

type Shared = Arc<Mutex<InFlight>>;

fn lock(state: &Shared) -> MutexGuard<'_, InFlight> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone, Debug, Default)]
pub struct Coalescer {
    state: Shared,
}

/// Proof that a recomputation was admitted; hand it back to `finish`.
#[derive(Debug)]
pub struct Ticket {
    key: RecomputeKey,
    generation: u64,
    state: Shared,
    released: bool,
}

impl Ticket {
    pub fn key(&self) -> &RecomputeKey {
        &self.key
    }

    /// Clears the in-flight key if this ticket is still the latest one.
    fn release(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.released = true;
        let mut state = lock(&self.state);
        if state.generation == self.generation {
            state.key = None;
            true
        } else {
            false
        }
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        if !self.released && self.release() {
            tracing::debug!(key = self.key.short(), "recomputation abandoned before finishing");
        }
    }
}

#[derive(Debug)]
pub enum Admission {
    Started(Ticket),
    Duplicate,
}

impl Coalescer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn admit(&self, key: RecomputeKey) -> Admission {
        let mut state = lock(&self.state);
        if state.key.as_ref() == Some(&key) {
            tracing::debug!(key = key.short(), "identical recomputation already in flight");
            return Admission::Duplicate;
        }
        if let Some(previous) = &state.key {
            tracing::debug!(
                superseded = previous.short(),
                key = key.short(),
                "recomputation superseded"
            );
        }
        state.generation += 1;
        state.key = Some(key.clone());
        Admission::Started(Ticket {
            key,
            generation: state.generation,
            state: Arc::clone(&self.state),
            released: false,
        })
    }

    /// `true` when the ticket is still the latest admitted one.
    pub fn finish(&self, mut ticket: Ticket) -> bool {
        let current = ticket.release();
        if !current {
            tracing::info!(
                key = ticket.key.short(),
                "dropping superseded recomputation result"
            );
        }
        current
    }

    pub fn in_flight(&self) -> Option<RecomputeKey> {
        lock(&self.state).key.clone()
    }
}
