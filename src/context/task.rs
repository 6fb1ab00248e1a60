//! Futures driven by a loop's worker thread.
//!
//! The waker of a marshaled task posts the next poll through the task's
//! `SyncContext`, so the future is only ever polled on the owning worker thread.

use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll, Wake, Waker};

use parking_lot::Mutex;

use crate::context::SyncContext;

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

pub(crate) struct MarshaledTask {
    future: Mutex<Option<BoxFuture>>,
    context: SyncContext,
    scheduled: AtomicBool,
}

impl MarshaledTask {
    pub(crate) fn spawn<F>(context: SyncContext, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let future: BoxFuture = Box::pin(future);
        let task = Arc::new(Self {
            future: Mutex::new(Some(future)),
            context,
            scheduled: AtomicBool::new(false),
        });
        task.schedule();
    }

    /// Post one poll, unless one is already queued
    fn schedule(self: &Arc<Self>) {
        if self.scheduled.swap(true, Ordering::AcqRel) {
            return;
        }
        let task = Arc::clone(self);
        self.context.post(move || task.poll());
    }

    fn poll(self: Arc<Self>) {
        self.scheduled.store(false, Ordering::Release);

        let waker = Waker::from(Arc::clone(&self));
        let mut cx = Context::from_waker(&waker);

        let mut slot = self.future.lock();
        let outcome = match slot.as_mut() {
            Some(future) => catch_unwind(AssertUnwindSafe(|| future.as_mut().poll(&mut cx))),
            None => return,
        };

        match outcome {
            Ok(Poll::Pending) => {}
            Ok(Poll::Ready(())) => *slot = None,
            Err(payload) => {
                // Never poll a future again after it panicked
                *slot = None;
                drop(slot);
                resume_unwind(payload);
            }
        }
    }

    #[cfg(test)]
    fn is_finished(&self) -> bool {
        self.future.lock().is_none()
    }
}

impl Wake for MarshaledTask {
    fn wake(self: Arc<Self>) {
        self.schedule();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.schedule();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::BackgroundLoop;

    #[test]
    fn test_spawn_posts_a_single_poll() {
        let lp = BackgroundLoop::default();
        MarshaledTask::spawn(lp.sync_context(), async {});
        assert_eq!(lp.pending_actions(), 1);
    }

    fn idle_task(context: SyncContext) -> Arc<MarshaledTask> {
        let future: BoxFuture = Box::pin(async {});
        Arc::new(MarshaledTask {
            future: Mutex::new(Some(future)),
            context,
            scheduled: AtomicBool::new(false),
        })
    }

    #[test]
    fn test_repeated_wakes_coalesce() {
        let lp = BackgroundLoop::default();
        let task = idle_task(lp.sync_context());

        task.schedule();
        task.schedule();
        Waker::from(Arc::clone(&task)).wake_by_ref();
        assert_eq!(lp.pending_actions(), 1);
    }

    #[test]
    fn test_poll_to_completion() {
        let task = idle_task(BackgroundLoop::default().sync_context());
        Arc::clone(&task).poll();
        assert!(task.is_finished());
    }
}
