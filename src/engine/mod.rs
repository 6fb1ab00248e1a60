//! Background loop engine
//!
//! A `BackgroundLoop` owns one dedicated worker thread which:
//! - fires a Tick at least once per heartbeat, even with no work
//! - drains and runs actions handed over from any other thread, in order
//! - installs a `SyncContext` so marshaled callbacks come back to the same thread
//!
//! All user callbacks (Starting, Tick, ThreadException, Stopping and every queued
//! action) run serially on the worker thread. Failures inside the worker are
//! reported through the ThreadException notification and never cross back to
//! the calling thread.

mod ambient;
mod config;
mod subscribers;
mod worker;

pub use config::{DEFAULT_HEARTBEAT_MS, LoopConfig};
pub use subscribers::{
    ExceptionHandler, HandlerResult, LifecycleHandler, SubscriptionId, Subscribers, TickHandler,
};

pub(crate) use ambient::current_context;

use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{error, info, warn};
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::context::SyncContext;
use crate::domain::{AtomicLoopState, ExceptionEvent, LoopState, TickEvent};
use crate::error::{BoxError, LoopError, Result};
use crate::queue::{self, Action, ActionQueue, Completion, QueuedItem};
use crate::signal::{StopGate, WakeSignal};

use subscribers::Handlers;

/// Delay used by `wait_until_stopped` when shutdown is already done or imminent
pub const STOP_GRACE: Duration = Duration::from_millis(100);

/// Thread name used when the loop has no name
const FALLBACK_THREAD_NAME: &str = "bgloop";

pub(crate) struct Inner {
    name: String,
    heartbeat: Duration,
    current_state: AtomicLoopState,
    target_state: AtomicLoopState,
    queue: ActionQueue,
    wake: WakeSignal,
    stop_gate: Mutex<Option<Arc<StopGate>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    stopping_waiters: Mutex<Vec<oneshot::Sender<()>>>,
    handlers: Handlers,
    sync_context: SyncContext,
}

/// Handle to a background loop; clones refer to the same loop.
///
/// While running, the worker thread holds its own handle, so the loop lives
/// until it is stopped even if every external handle is dropped.
#[derive(Clone)]
pub struct BackgroundLoop {
    inner: Arc<Inner>,
}

impl BackgroundLoop {
    /// Create a loop with the given name and heartbeat
    pub fn new(name: impl Into<String>, heartbeat: Duration) -> Self {
        Self::with_config(&LoopConfig::new(name, heartbeat))
    }

    /// Create a loop from configuration
    pub fn with_config(config: &LoopConfig) -> Self {
        let inner = Arc::new_cyclic(|weak: &Weak<Inner>| Inner {
            name: config.name.clone(),
            heartbeat: config.heartbeat(),
            current_state: AtomicLoopState::new(LoopState::None),
            target_state: AtomicLoopState::new(LoopState::None),
            queue: ActionQueue::new(),
            wake: WakeSignal::new(false),
            stop_gate: Mutex::new(None),
            worker: Mutex::new(None),
            stopping_waiters: Mutex::new(Vec::new()),
            handlers: Handlers::default(),
            sync_context: SyncContext::new(weak.clone()),
        });
        Self { inner }
    }

    pub(crate) fn from_inner(inner: Arc<Inner>) -> Self {
        Self { inner }
    }

    /// The loop whose worker thread is the calling thread, if any
    pub fn current() -> Option<BackgroundLoop> {
        ambient::current_loop()
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn heartbeat(&self) -> Duration {
        self.inner.heartbeat
    }

    /// Snapshot of the externally observable state
    pub fn current_state(&self) -> LoopState {
        self.inner.current_state.load()
    }

    pub fn is_starting_or_running(&self) -> bool {
        self.current_state().is_starting_or_running()
    }

    /// The marshaling context routing posted callbacks onto this loop
    pub fn sync_context(&self) -> SyncContext {
        self.inner.sync_context.clone()
    }

    /// Number of actions waiting for the next drain (approximate under contention)
    pub fn pending_actions(&self) -> usize {
        self.inner.queue.len()
    }

    /// Returns true if both handles refer to the same loop
    pub fn ptr_eq(&self, other: &BackgroundLoop) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn downgrade(&self) -> Weak<Inner> {
        Arc::downgrade(&self.inner)
    }

    //=== Lifecycle ===

    /// Spawn the worker thread. Legal only while the state is `None`.
    ///
    /// Returns as soon as the thread is spawned; use `start_async` to wait until
    /// the loop is actually running.
    pub fn start(&self) -> Result<()> {
        let inner = &self.inner;
        inner
            .current_state
            .transition(LoopState::None, LoopState::Starting)
            .map_err(|state| LoopError::IllegalState {
                operation: "start",
                state,
            })?;
        inner.target_state.store(LoopState::Running);

        // First wait of the new run cycle returns at once
        inner.wake.wake();

        let gate = Arc::new(StopGate::new());
        *inner.stop_gate.lock() = Some(Arc::clone(&gate));

        let lp = self.clone();
        let spawned = thread::Builder::new()
            .name(self.thread_name())
            .spawn(move || worker::run(lp, gate));

        match spawned {
            Ok(handle) => {
                // The previous cycle's thread has already reported shutdown
                drop(inner.worker.lock().replace(handle));
                info!("Background loop '{}' starting", self.name());
                Ok(())
            }
            Err(err) => {
                error!("Background loop '{}' failed to spawn worker: {}", self.name(), err);
                inner.stop_gate.lock().take();
                inner.target_state.store(LoopState::None);
                inner.current_state.store(LoopState::None);
                Err(err.into())
            }
        }
    }

    /// Start and resolve once the worker has run its first queued item.
    ///
    /// On success Starting has fired, the state is `Running` and every action
    /// submitted earlier from this thread has already executed.
    pub async fn start_async(&self) -> Result<()> {
        self.start()?;
        let barrier = self.invoke_async(|| {});
        let gate = self.inner.stop_gate.lock().clone();

        match gate {
            Some(gate) => {
                tokio::select! {
                    biased;
                    result = barrier => result,
                    _ = gate.wait() => Err(LoopError::StartAborted),
                }
            }
            None => barrier.await,
        }
    }

    /// Ask the worker to leave its run cycle. Legal only while `Running`.
    pub fn stop(&self) -> Result<()> {
        let state = self.current_state();
        if state != LoopState::Running {
            return Err(LoopError::IllegalState {
                operation: "stop",
                state,
            });
        }
        self.inner.target_state.store(LoopState::Stopping);
        self.trigger();
        Ok(())
    }

    /// Stop and wait for the worker to exit, giving up after `timeout`.
    ///
    /// A timeout only abandons the wait; the worker finishes shutting down on
    /// its own.
    pub async fn stop_async(&self, timeout: Duration) -> Result<()> {
        self.stop_async_until(tokio::time::sleep(timeout))
            .await
            .map_err(|err| match err {
                LoopError::Cancelled => LoopError::Timeout(timeout),
                other => other,
            })
    }

    /// Stop and wait for the worker to exit, giving up when `cancel` completes
    pub async fn stop_async_until<C>(&self, cancel: C) -> Result<()>
    where
        C: Future<Output = ()>,
    {
        self.stop()?;

        let gate = self.inner.stop_gate.lock().clone();
        let Some(gate) = gate else {
            return Ok(());
        };

        tokio::select! {
            biased;
            _ = gate.wait() => {
                let mut slot = self.inner.stop_gate.lock();
                if slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, &gate)) {
                    *slot = None;
                }
                Ok(())
            }
            _ = cancel => Err(LoopError::Cancelled),
        }
    }

    /// Resolve when the loop stops.
    ///
    /// If the loop is `None` or already `Stopping` this resolves after a short
    /// grace delay; otherwise it resolves when Stopping fires (or the start
    /// attempt aborts).
    pub async fn wait_until_stopped(&self) {
        let waiter = {
            let mut waiters = self.inner.stopping_waiters.lock();
            match self.current_state() {
                LoopState::None | LoopState::Stopping => None,
                LoopState::Starting | LoopState::Running => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    Some(rx)
                }
            }
        };

        match waiter {
            // A dropped sender also means the worker is gone
            Some(rx) => {
                let _ = rx.await;
            }
            None => tokio::time::sleep(STOP_GRACE).await,
        }
    }

    pub(crate) fn release_stopping_waiters(&self) {
        let waiters = std::mem::take(&mut *self.inner.stopping_waiters.lock());
        for tx in waiters {
            let _ = tx.send(());
        }
    }

    /// Force one extra pass of the run cycle as soon as possible
    pub fn trigger(&self) {
        self.inner.wake.wake();
    }

    //=== Submission ===

    /// Run `action` on the worker thread; the handle resolves once it has run.
    ///
    /// A panic inside `action` is reported through ThreadException and also
    /// resolves the handle with `LoopError::Panic`.
    pub fn invoke_async<F>(&self, action: F) -> Completion
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit_awaited(queue::from_fn(action))
    }

    /// Like `invoke_async`, treating a returned `Err` like a panic
    pub fn try_invoke_async<F, E>(&self, action: F) -> Completion
    where
        F: FnOnce() -> std::result::Result<(), E> + Send + 'static,
        E: Into<BoxError>,
    {
        self.submit_awaited(queue::from_try_fn(action))
    }

    /// Run `action` on the worker thread without waiting for it
    pub fn begin_invoke<F>(&self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(queue::from_fn(action));
    }

    /// Like `begin_invoke`, treating a returned `Err` like a panic
    pub fn try_begin_invoke<F, E>(&self, action: F)
    where
        F: FnOnce() -> std::result::Result<(), E> + Send + 'static,
        E: Into<BoxError>,
    {
        self.submit(queue::from_try_fn(action));
    }

    /// Poll `future` to completion on the worker thread.
    ///
    /// Every continuation after an `.await` inside `future` resumes on the
    /// worker thread. Futures relying on a tokio reactor (timers, sockets)
    /// cannot be driven here.
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.inner.sync_context.spawn(future);
    }

    fn submit(&self, action: Action) {
        self.inner.queue.enqueue(QueuedItem::fire_and_forget(action));
        self.trigger();
    }

    fn submit_awaited(&self, action: Action) -> Completion {
        let (item, completion) = QueuedItem::with_completion(action);
        self.inner.queue.enqueue(item);
        self.trigger();
        completion
    }

    //=== Notifications ===

    /// Subscribe to Starting. A failing subscriber aborts the start attempt.
    pub fn on_starting<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&BackgroundLoop) -> HandlerResult + Send + Sync + 'static,
    {
        self.inner.handlers.starting.add(Arc::new(handler))
    }

    /// Subscribe to Tick
    pub fn on_tick<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&BackgroundLoop, &TickEvent) -> HandlerResult + Send + Sync + 'static,
    {
        self.inner.handlers.tick.add(Arc::new(handler))
    }

    /// Subscribe to Stopping
    pub fn on_stopping<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&BackgroundLoop) -> HandlerResult + Send + Sync + 'static,
    {
        self.inner.handlers.stopping.add(Arc::new(handler))
    }

    /// Subscribe to ThreadException
    pub fn on_thread_exception<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&BackgroundLoop, &ExceptionEvent) + Send + Sync + 'static,
    {
        self.inner.handlers.exception.add(Arc::new(handler))
    }

    /// Remove a subscription from whichever notification it belongs to
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.handlers.remove(id)
    }

    /// Fan a caught failure out to ThreadException subscribers
    pub(crate) fn report(&self, error: LoopError) {
        let state = self.current_state();
        warn!("Background loop '{}' caught failure while {}: {}", self.name(), state, error);

        let event = ExceptionEvent::new(state, error);
        for handler in self.inner.handlers.exception.snapshot() {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| handler(self, &event))) {
                error!(
                    "Background loop '{}' exception subscriber panicked: {}",
                    self.name(),
                    LoopError::from_panic(payload)
                );
            }
        }
    }

    fn thread_name(&self) -> String {
        if self.inner.name.is_empty() {
            FALLBACK_THREAD_NAME.to_string()
        } else {
            self.inner.name.clone()
        }
    }
}

impl Default for BackgroundLoop {
    fn default() -> Self {
        Self::with_config(&LoopConfig::default())
    }
}

impl std::fmt::Debug for BackgroundLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundLoop")
            .field("name", &self.inner.name)
            .field("heartbeat", &self.inner.heartbeat)
            .field("state", &self.current_state())
            .field("pending_actions", &self.pending_actions())
            .finish()
    }
}
