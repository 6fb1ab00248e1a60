//! Error types for bgloop
//!
//! Centralized error handling using thiserror.

use std::any::Any;
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::domain::LoopState;

/// Boxed error returned by fallible actions and subscribers
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// All error types that can occur in bgloop
#[derive(Debug, Clone, Error)]
pub enum LoopError {
    /// Operation called outside its legal originating state
    #[error("Illegal state: cannot {operation} while {state}")]
    IllegalState {
        operation: &'static str,
        state: LoopState,
    },

    /// Synchronous dispatch onto the loop thread
    #[error("Synchronous dispatch is not supported on a background loop")]
    SendNotSupported,

    /// An action or subscriber returned an error
    #[error("Action failed: {0}")]
    Action(Arc<dyn StdError + Send + Sync + 'static>),

    /// An action, subscriber or the worker itself panicked
    #[error("Panicked: {0}")]
    Panic(String),

    /// A queued item was dropped before the worker ran it
    #[error("Action abandoned before it was executed")]
    Abandoned,

    /// The worker exited before a start barrier could run
    #[error("Loop stopped before start completed")]
    StartAborted,

    /// An external wait exceeded its deadline
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// An external wait was cancelled by the caller
    #[error("Wait cancelled")]
    Cancelled,

    /// The worker thread could not be spawned
    #[error("Failed to spawn worker thread: {0}")]
    Spawn(Arc<std::io::Error>),
}

impl LoopError {
    /// Wrap an arbitrary error value returned by user code
    pub fn action<E: Into<BoxError>>(err: E) -> Self {
        LoopError::Action(Arc::from(err.into()))
    }

    /// Convert a panic payload from `catch_unwind` into an error
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        LoopError::Panic(message)
    }

    /// Returns true for `IllegalState`
    pub fn is_illegal_state(&self) -> bool {
        matches!(self, LoopError::IllegalState { .. })
    }
}

impl From<std::io::Error> for LoopError {
    fn from(err: std::io::Error) -> Self {
        LoopError::Spawn(Arc::new(err))
    }
}

/// Result type alias for bgloop operations
pub type Result<T> = std::result::Result<T, LoopError>;
