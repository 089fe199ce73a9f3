//! Per-client batch state and the single-flight guard.

use crate::demux::CorrelationRoutes;
use crate::types::{PartCallback, SubRequest};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lifecycle of a client.
///
/// `run` never clears the queue, so a finished batch leaves the client in
/// `Queuing` and a second `run` resends it. Only `reset` returns to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Idle,
    Queuing,
    InFlight,
}

#[derive(Default)]
pub(crate) struct BatchState {
    pub(crate) requests: Vec<SubRequest>,
    pub(crate) ids: HashSet<String>,
    pub(crate) callbacks: HashMap<String, PartCallback>,
    pub(crate) extension_data: HashMap<String, Value>,
    pub(crate) in_flight: bool,
}

impl BatchState {
    pub(crate) fn state(&self) -> ClientState {
        if self.in_flight {
            ClientState::InFlight
        } else if self.requests.is_empty() {
            ClientState::Idle
        } else {
            ClientState::Queuing
        }
    }

    /// Append an already validated request that has its correlation id assigned.
    pub(crate) fn push(&mut self, request: SubRequest) {
        let id = request.correlation_id().to_string();
        if let Some(callback) = &request.callback {
            self.callbacks.insert(id.clone(), callback.clone());
        }
        if let Some(data) = &request.extension_data {
            self.extension_data.insert(id.clone(), data.clone());
        }
        self.ids.insert(id);
        self.requests.push(request);
    }

    pub(crate) fn clear(&mut self) {
        self.requests.clear();
        self.ids.clear();
        self.callbacks.clear();
        self.extension_data.clear();
    }

    pub(crate) fn routes(&self) -> CorrelationRoutes {
        CorrelationRoutes {
            callbacks: self.callbacks.clone(),
            extension_data: self.extension_data.clone(),
            expected_ids: self.ids.clone(),
        }
    }
}

pub(crate) fn lock(state: &Mutex<BatchState>) -> MutexGuard<'_, BatchState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Marks a batch as in flight; clears the mark on drop, including when the
/// `run` future is cancelled.
pub(crate) struct InFlightGuard<'a> {
    state: &'a Mutex<BatchState>,
}

impl<'a> InFlightGuard<'a> {
    /// Returns `None` if another batch is already in flight.
    pub(crate) fn acquire(state: &'a Mutex<BatchState>) -> Option<Self> {
        let mut s = lock(state);
        if s.in_flight {
            return None;
        }
        s.in_flight = true;
        Some(Self { state })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        lock(self.state).in_flight = false;
    }
}
