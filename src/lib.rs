//! bgloop - a dedicated-thread background loop
//!
//! One worker thread per `BackgroundLoop` fires periodic Tick heartbeats,
//! runs work handed over from any thread strictly in order, and installs a
//! `SyncContext` so callbacks and futures started on the loop resume there.

pub mod context;
pub mod domain;
pub mod engine;
pub mod error;
pub mod queue;
pub mod signal;

pub use context::SyncContext;
pub use domain::{ExceptionEvent, LoopState, TickEvent};
pub use engine::{BackgroundLoop, HandlerResult, LoopConfig, SubscriptionId};
pub use error::{LoopError, Result};
pub use queue::Completion;
