//! Signals between producers, the worker thread and shutdown waiters
//!
//! - WakeSignal: dirty flag + condvar that cuts the worker's heartbeat wait short
//! - StopGate: one-shot gate opened when the worker has fully exited

mod stop;
mod wake;

pub use stop::StopGate;
pub use wake::WakeSignal;
