//! Notification payloads raised by the worker thread

use std::time::Duration;

use crate::domain::LoopState;
use crate::error::LoopError;

/// Raised once per run-cycle pass, after that pass's batch has executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickEvent {
    /// Time since the previous tick's measurement point (loop entry for the first tick)
    pub elapsed: Duration,
}

impl TickEvent {
    pub fn new(elapsed: Duration) -> Self {
        Self { elapsed }
    }
}

/// Raised for every failure caught on the worker thread
#[derive(Debug, Clone)]
pub struct ExceptionEvent {
    /// The captured failure
    pub error: LoopError,
    /// `current_state` at the moment the failure was caught
    pub state: LoopState,
}

impl ExceptionEvent {
    pub fn new(state: LoopState, error: LoopError) -> Self {
        Self { error, state }
    }
}
