//! Marshaling integration tests
//!
//! Work started on a loop's worker thread must come back to that thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, ThreadId};
use std::time::Duration;

use bgloop::{BackgroundLoop, LoopError, Result, SyncContext};
use parking_lot::Mutex;
use tokio::sync::oneshot;

const HEARTBEAT: Duration = Duration::from_millis(10);
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Thread id of the loop's worker
async fn worker_thread(lp: &BackgroundLoop) -> Result<ThreadId> {
    let id = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&id);
    lp.invoke_async(move || *slot.lock() = Some(thread::current().id()))
        .await?;
    let id = id.lock().take();
    Ok(id.expect("worker thread id recorded"))
}

/// The loop's context is installed for every callback the worker runs
#[tokio::test]
async fn test_context_installed_in_every_callback() -> Result<()> {
    let lp = BackgroundLoop::new("ambient", HEARTBEAT);
    let checks = Arc::new(Mutex::new(Vec::new()));

    let log = Arc::clone(&checks);
    lp.on_starting(move |lp| {
        log.lock().push(("starting", SyncContext::current() == Some(lp.sync_context())));
        Ok(())
    });
    let log = Arc::clone(&checks);
    lp.on_tick(move |lp, _| {
        log.lock().push(("tick", SyncContext::current() == Some(lp.sync_context())));
        Ok(())
    });
    let log = Arc::clone(&checks);
    lp.on_stopping(move |lp| {
        log.lock().push(("stopping", SyncContext::current() == Some(lp.sync_context())));
        Ok(())
    });

    lp.start_async().await?;

    let expected = lp.sync_context();
    let log = Arc::clone(&checks);
    lp.begin_invoke(move || {
        log.lock().push(("begin_invoke", SyncContext::current() == Some(expected)));
    });
    let expected = lp.sync_context();
    let log = Arc::clone(&checks);
    lp.invoke_async(move || {
        log.lock().push(("invoke_async", SyncContext::current() == Some(expected)));
    })
    .await?;

    lp.stop_async(STOP_TIMEOUT).await?;

    let checks = checks.lock();
    for kind in ["starting", "tick", "stopping", "begin_invoke", "invoke_async"] {
        assert!(checks.iter().any(|(k, _)| *k == kind), "no {} callback ran", kind);
    }
    assert!(checks.iter().all(|(_, installed)| *installed));
    assert!(SyncContext::current().is_none());
    Ok(())
}

/// `BackgroundLoop::current` names the loop on its own worker only
#[tokio::test]
async fn test_current_loop_on_worker() -> Result<()> {
    let lp = BackgroundLoop::new("current", HEARTBEAT);
    let other = BackgroundLoop::new("other", HEARTBEAT);
    lp.start_async().await?;

    let found = Arc::new(Mutex::new((false, false)));
    let slot = Arc::clone(&found);
    let (this, that) = (lp.clone(), other.clone());
    lp.invoke_async(move || {
        let current = BackgroundLoop::current();
        *slot.lock() = (
            current.as_ref().is_some_and(|c| c.ptr_eq(&this)),
            current.as_ref().is_some_and(|c| c.ptr_eq(&that)),
        );
    })
    .await?;
    lp.stop_async(STOP_TIMEOUT).await?;

    assert_eq!(*found.lock(), (true, false));
    assert!(BackgroundLoop::current().is_none());
    Ok(())
}

/// Callbacks posted from the worker come back to the worker
#[tokio::test]
async fn test_post_from_worker_returns_to_worker() -> Result<()> {
    let lp = BackgroundLoop::new("post", HEARTBEAT);
    lp.start_async().await?;
    let worker = worker_thread(&lp).await?;

    let (tx, rx) = oneshot::channel();
    lp.begin_invoke(move || {
        let context = SyncContext::current().expect("context on worker");
        context.post(move || {
            let _ = tx.send(thread::current().id());
        });
    });

    let posted_on = tokio::time::timeout(STOP_TIMEOUT, rx)
        .await
        .expect("posted callback ran")
        .expect("sender kept alive");
    assert_eq!(posted_on, worker);

    lp.stop_async(STOP_TIMEOUT).await?;
    Ok(())
}

/// Synchronous dispatch is refused even on the worker thread
#[tokio::test]
async fn test_send_rejected_on_worker() -> Result<()> {
    let lp = BackgroundLoop::new("send", HEARTBEAT);
    lp.start_async().await?;

    let rejected = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&rejected);
    lp.invoke_async(move || {
        let context = SyncContext::current().expect("context on worker");
        *slot.lock() = Some(matches!(context.send(|| {}), Err(LoopError::SendNotSupported)));
    })
    .await?;
    lp.stop_async(STOP_TIMEOUT).await?;

    assert_eq!(*rejected.lock(), Some(true));
    Ok(())
}

/// A spawned future resumes on the worker after awaiting work completed elsewhere
#[tokio::test]
async fn test_spawned_future_resumes_on_worker() -> Result<()> {
    let lp = BackgroundLoop::new("resume", HEARTBEAT);
    lp.start_async().await?;
    let worker = worker_thread(&lp).await?;

    let (input_tx, input_rx) = oneshot::channel::<u32>();
    let (report_tx, report_rx) = oneshot::channel();
    lp.spawn(async move {
        let before = thread::current().id();
        let value = input_rx.await.unwrap_or_default();
        let after = thread::current().id();
        let _ = report_tx.send((before, after, value, SyncContext::current().is_some()));
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    input_tx.send(7).expect("future still waiting");

    let (before, after, value, has_context) = tokio::time::timeout(STOP_TIMEOUT, report_rx)
        .await
        .expect("future completed")
        .expect("sender kept alive");
    assert_eq!(before, worker);
    assert_eq!(after, worker);
    assert_eq!(value, 7);
    assert!(has_context);

    lp.stop_async(STOP_TIMEOUT).await?;
    Ok(())
}

/// Futures spawned from inside the loop keep running there across several awaits
#[tokio::test]
async fn test_chained_awaits_stay_on_worker() -> Result<()> {
    let lp = BackgroundLoop::new("chain", HEARTBEAT);
    lp.start_async().await?;
    let worker = worker_thread(&lp).await?;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let (done_tx, done_rx) = oneshot::channel();
    let log = Arc::clone(&seen);
    lp.begin_invoke(move || {
        let context = SyncContext::current().expect("context on worker");
        let helper = BackgroundLoop::current().expect("loop on worker");
        context.spawn(async move {
            for _ in 0..3 {
                // Each step waits on work queued behind it on the same loop
                let _ = helper.invoke_async(|| {}).await;
                log.lock().push(thread::current().id());
            }
            let _ = done_tx.send(());
        });
    });

    tokio::time::timeout(STOP_TIMEOUT, done_rx)
        .await
        .expect("chain completed")
        .expect("sender kept alive");
    lp.stop_async(STOP_TIMEOUT).await?;

    let seen = seen.lock();
    assert_eq!(seen.len(), 3);
    assert!(seen.iter().all(|id| *id == worker));
    Ok(())
}

/// A panicking spawned future is reported like any failing action
#[tokio::test]
async fn test_panicking_future_is_reported() -> Result<()> {
    let lp = BackgroundLoop::new("panicking-future", HEARTBEAT);
    let reports = Arc::new(AtomicUsize::new(0));
    let count = Arc::clone(&reports);
    lp.on_thread_exception(move |_, _| {
        count.fetch_add(1, Ordering::SeqCst);
    });

    lp.start_async().await?;
    lp.spawn(async {
        std::future::ready(()).await;
        panic!("future failed");
    });
    lp.invoke_async(|| {}).await?;
    lp.stop_async(STOP_TIMEOUT).await?;

    assert_eq!(reports.load(Ordering::SeqCst), 1);
    Ok(())
}
