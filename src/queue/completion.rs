//! Completion handle for invoke-and-await submissions

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::{LoopError, Result};

/// Resolves once the submitted action has run on the worker thread.
///
/// Dropping the handle abandons the wait, not the work: the action still runs.
#[must_use = "a Completion does nothing unless awaited or waited on"]
#[derive(Debug)]
pub struct Completion {
    rx: oneshot::Receiver<Result<()>>,
}

impl Completion {
    pub(crate) fn new(rx: oneshot::Receiver<Result<()>>) -> Self {
        Self { rx }
    }

    /// Block the calling thread until the action has run.
    ///
    /// Must not be called from inside an async runtime, nor from the loop's own
    /// worker thread (the item could never run).
    pub fn wait(self) -> Result<()> {
        self.rx.blocking_recv().unwrap_or(Err(LoopError::Abandoned))
    }
}

impl Future for Completion {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(LoopError::Abandoned)))
    }
}
