//! The worker thread's main method and run cycle.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Instant;

use log::{debug, error, info};

use crate::domain::{LoopState, TickEvent};
use crate::engine::{BackgroundLoop, ambient};
use crate::error::{LoopError, Result};
use crate::signal::StopGate;

use super::subscribers::HandlerResult;

/// Entry point of the spawned thread.
///
/// Whatever happens inside, the loop ends in `None`, shutdown waiters are
/// released and the stop gate is opened.
///
/// Waiters are always released before `None` is published: once the state is
/// `None` a new cycle may start and register waiters of its own.
pub(super) fn run(lp: BackgroundLoop, gate: Arc<StopGate>) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| main_method(&lp))) {
        let err = LoopError::from_panic(payload);
        error!("Background loop '{}' worker failed: {}", lp.name(), err);
        lp.report(err);
        lp.release_stopping_waiters();
        ambient::exit();
        finish(&lp);
    }

    gate.open();
    debug!("Background loop '{}' worker exited", lp.name());
}

/// Publish `None`; nothing on this cycle's worker may touch waiters afterwards
fn finish(lp: &BackgroundLoop) {
    lp.inner.target_state.store(LoopState::None);
    lp.inner.current_state.store(LoopState::None);
}

fn main_method(lp: &BackgroundLoop) {
    let inner = &lp.inner;
    let mut stopwatch = Instant::now();

    ambient::enter(lp);

    if let Err(err) = fire_starting(lp) {
        lp.report(err);
        lp.release_stopping_waiters();
        ambient::exit();
        info!("Background loop '{}' aborted during start", lp.name());
        finish(lp);
        return;
    }

    if inner.current_state.load() != LoopState::None {
        inner.current_state.store(inner.target_state.load());
        info!("Background loop '{}' running", lp.name());

        while inner.current_state.load() == LoopState::Running {
            inner.wake.wait(inner.heartbeat);

            let target = inner.target_state.load();
            inner.current_state.store(target);
            if target != LoopState::Running {
                break;
            }

            let elapsed = stopwatch.elapsed();
            stopwatch = Instant::now();

            let batch = inner.queue.drain();
            if !batch.is_empty() {
                debug!("Background loop '{}' executing {} queued actions", lp.name(), batch.len());
            }
            for item in batch {
                if let Err(err) = item.run() {
                    lp.report(err);
                }
            }

            fire_tick(lp, TickEvent::new(elapsed));

            inner.current_state.store(inner.target_state.load());
        }

        fire_stopping(lp);
        ambient::leave_loop();
    }

    lp.release_stopping_waiters();
    ambient::exit();
    info!("Background loop '{}' stopped", lp.name());
    finish(lp);
}

/// Run one subscriber, converting a returned error or a panic into `LoopError`
fn invoke<F>(handler: F) -> Result<()>
where
    F: FnOnce() -> HandlerResult,
{
    match catch_unwind(AssertUnwindSafe(handler)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(LoopError::action(err)),
        Err(payload) => Err(LoopError::from_panic(payload)),
    }
}

/// Starting subscribers; the first failure aborts the start attempt
fn fire_starting(lp: &BackgroundLoop) -> Result<()> {
    for handler in lp.inner.handlers.starting.snapshot() {
        invoke(|| handler(lp))?;
    }
    Ok(())
}

fn fire_tick(lp: &BackgroundLoop, event: TickEvent) {
    for handler in lp.inner.handlers.tick.snapshot() {
        if let Err(err) = invoke(|| handler(lp, &event)) {
            lp.report(err);
        }
    }
}

fn fire_stopping(lp: &BackgroundLoop) {
    for handler in lp.inner.handlers.stopping.snapshot() {
        if let Err(err) = invoke(|| handler(lp)) {
            lp.report(err);
        }
    }
}
