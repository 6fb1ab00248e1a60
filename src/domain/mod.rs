//! Domain types for bgloop
//!
//! - LoopState: lifecycle state machine values
//! - TickEvent / ExceptionEvent: notification payloads

pub mod event;
pub mod state;

pub use event::{ExceptionEvent, TickEvent};
pub use state::{AtomicLoopState, LoopState};
