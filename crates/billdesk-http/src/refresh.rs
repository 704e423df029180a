//! Single-flight refresh bookkeeping.
//!
//! The gate owns the "refresh in flight" flag and the FIFO queue of requests
//! waiting for new tokens. All state sits behind one mutex that is never held
//! across an await point.
//!
//! Every request samples an [`Epoch`] before it is sent. When its 401 comes
//! back the epoch tells whether tokens were rotated or the session ended in
//! the meantime.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

use billdesk_core::Result;

use crate::request::{ApiRequest, ApiResponse};

/// A request parked until the refresh cycle settles.
pub(crate) struct PendingRequest {
    pub request: ApiRequest,
    pub reply: oneshot::Sender<Result<ApiResponse>>,
}

/// Refresh and session-end counters observed when a request was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct Epoch {
    /// Successful refreshes.
    generation: u64,
    /// Sessions ended by a failed refresh.
    terminations: u64,
}

/// Outcome of asking the gate to park a request after a 401.
pub(crate) enum Admission {
    /// The session ended after the request was sent; its 401 is final.
    Ended,
    /// A refresh completed after the request was sent; replay with the
    /// stored token instead of waiting.
    Rotated,
    /// The request is queued. `leader` is set for the caller that must start
    /// the refresh cycle.
    Queued {
        reply: oneshot::Receiver<Result<ApiResponse>>,
        leader: bool,
    },
}

#[derive(Default)]
struct GateState {
    in_flight: bool,
    epoch: Epoch,
    queue: VecDeque<PendingRequest>,
}

#[derive(Default)]
pub(crate) struct RefreshGate {
    state: Mutex<GateState>,
}

impl RefreshGate {
    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sampled before each attempt.
    pub fn epoch(&self) -> Epoch {
        self.lock().epoch
    }

    /// Whether a session ended after `seen` was sampled.
    pub fn ended_since(&self, seen: Epoch) -> bool {
        self.lock().epoch.terminations != seen.terminations
    }

    pub fn in_flight(&self) -> bool {
        self.lock().in_flight
    }

    pub fn pending(&self) -> usize {
        self.lock().queue.len()
    }

    /// Park `request`, which was sent during `seen`.
    pub fn admit(&self, request: ApiRequest, seen: Epoch) -> Admission {
        let mut state = self.lock();
        if state.epoch.terminations != seen.terminations {
            return Admission::Ended;
        }
        if state.epoch.generation != seen.generation {
            return Admission::Rotated;
        }

        let (tx, rx) = oneshot::channel();
        state.queue.push_back(PendingRequest { request, reply: tx });
        let leader = !state.in_flight;
        state.in_flight = true;
        Admission::Queued { reply: rx, leader }
    }

    /// Record a successful refresh. Requests sent before this point replay
    /// instead of queueing.
    pub fn complete(&self) {
        self.lock().epoch.generation += 1;
    }

    /// Pop the next queued request, or clear the flag when the queue is empty.
    pub fn next(&self) -> Option<PendingRequest> {
        let mut state = self.lock();
        let next = state.queue.pop_front();
        if next.is_none() {
            state.in_flight = false;
        }
        next
    }

    /// Record the end of the session, take every queued request and clear
    /// the flag. Requests sent before this point are rejected on 401.
    pub fn abort(&self) -> Vec<PendingRequest> {
        let mut state = self.lock();
        state.in_flight = false;
        state.epoch.terminations += 1;
        state.queue.drain(..).collect()
    }
}
