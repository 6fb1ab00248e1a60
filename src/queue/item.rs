//! Units of queued work

use std::panic::{AssertUnwindSafe, catch_unwind};

use tokio::sync::oneshot;

use crate::error::{BoxError, LoopError, Result};
use crate::queue::Completion;

/// Type-erased deferred work executed on the worker thread
pub type Action = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

/// Wrap an infallible closure; panics surface as `LoopError::Panic` when run
pub fn from_fn<F>(f: F) -> Action
where
    F: FnOnce() + Send + 'static,
{
    Box::new(move || {
        f();
        Ok(())
    })
}

/// Wrap a fallible closure; an `Err` surfaces as `LoopError::Action` when run
pub fn from_try_fn<F, E>(f: F) -> Action
where
    F: FnOnce() -> std::result::Result<(), E> + Send + 'static,
    E: Into<BoxError>,
{
    Box::new(move || f().map_err(LoopError::action))
}

/// An action plus, for invoke-and-await submissions, its completion sender
pub struct QueuedItem {
    action: Action,
    completion: Option<oneshot::Sender<Result<()>>>,
}

impl QueuedItem {
    /// Item with no completion notification
    pub fn fire_and_forget(action: Action) -> Self {
        Self {
            action,
            completion: None,
        }
    }

    /// Item bound to a completion handle resolved once it runs
    pub fn with_completion(action: Action) -> (Self, Completion) {
        let (tx, rx) = oneshot::channel();
        let item = Self {
            action,
            completion: Some(tx),
        };
        (item, Completion::new(rx))
    }

    pub fn has_completion(&self) -> bool {
        self.completion.is_some()
    }

    /// Execute the action, resolve the completion and hand back the outcome.
    ///
    /// Never panics: a panicking action is captured as `LoopError::Panic`.
    pub fn run(self) -> Result<()> {
        let outcome = match catch_unwind(AssertUnwindSafe(self.action)) {
            Ok(result) => result,
            Err(payload) => Err(LoopError::from_panic(payload)),
        };
        if let Some(tx) = self.completion {
            // The caller may have dropped its handle; the work still counts as done
            let _ = tx.send(outcome.clone());
        }
        outcome
    }
}

impl std::fmt::Debug for QueuedItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedItem")
            .field("has_completion", &self.has_completion())
            .finish_non_exhaustive()
    }
}
