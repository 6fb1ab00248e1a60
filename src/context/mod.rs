//! Marshaling context
//!
//! A `SyncContext` is the dispatch target installed on a loop's worker thread.
//! Posting through it enqueues the callback on that same loop, so work started
//! on the loop thread (including futures spawned with `spawn`) always resumes
//! there. Synchronous dispatch is rejected outright.

mod task;

use std::future::Future;
use std::sync::Weak;

use log::warn;

use crate::engine::{self, BackgroundLoop, Inner};
use crate::error::{LoopError, Result};

use task::MarshaledTask;

/// Routes posted callbacks onto one background loop
#[derive(Clone)]
pub struct SyncContext {
    owner: Weak<Inner>,
}

impl SyncContext {
    pub(crate) fn new(owner: Weak<Inner>) -> Self {
        Self { owner }
    }

    /// The context installed on the calling thread; `None` off a loop's worker thread
    pub fn current() -> Option<SyncContext> {
        engine::current_context()
    }

    /// The loop this context dispatches to, if it still exists
    pub fn owner(&self) -> Option<BackgroundLoop> {
        self.owner.upgrade().map(BackgroundLoop::from_inner)
    }

    /// Returns true if this context dispatches to `lp`
    pub fn is_for(&self, lp: &BackgroundLoop) -> bool {
        Weak::ptr_eq(&self.owner, &lp.downgrade())
    }

    /// Queue `callback` on the owning loop without waiting for it
    pub fn post<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        match self.owner() {
            Some(lp) => lp.begin_invoke(callback),
            None => warn!("Dropping posted callback: its background loop no longer exists"),
        }
    }

    /// Synchronous dispatch; always fails with `LoopError::SendNotSupported`
    pub fn send<F>(&self, _callback: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        Err(LoopError::SendNotSupported)
    }

    /// Poll `future` on the owning loop's worker thread until it completes
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        MarshaledTask::spawn(self.clone(), future);
    }
}

impl PartialEq for SyncContext {
    fn eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.owner, &other.owner)
    }
}

impl Eq for SyncContext {}

impl std::fmt::Debug for SyncContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = self.owner().map(|lp| lp.name().to_string());
        f.debug_struct("SyncContext").field("owner", &name).finish()
    }
}
