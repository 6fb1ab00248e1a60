//! Loop lifecycle state
//!
//! A background loop moves through `None -> Starting -> Running -> Stopping -> None`
//! and may be started again once it is back at `None`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state of a background loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopState {
    /// No worker thread exists
    #[default]
    None,
    /// Worker spawned, Starting notification pending or in progress
    Starting,
    /// Run cycle active: draining work and ticking
    Running,
    /// Run cycle left, Stopping notification pending or in progress
    Stopping,
}

impl LoopState {
    /// Returns true while a worker thread is alive and has not begun shutdown
    pub fn is_starting_or_running(&self) -> bool {
        matches!(self, LoopState::Starting | LoopState::Running)
    }

    fn as_u8(self) -> u8 {
        match self {
            LoopState::None => 0,
            LoopState::Starting => 1,
            LoopState::Running => 2,
            LoopState::Stopping => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => LoopState::Starting,
            2 => LoopState::Running,
            3 => LoopState::Stopping,
            _ => LoopState::None,
        }
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoopState::None => "none",
            LoopState::Starting => "starting",
            LoopState::Running => "running",
            LoopState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// A `LoopState` cell readable and writable from any thread
#[derive(Debug, Default)]
pub struct AtomicLoopState(AtomicU8);

impl AtomicLoopState {
    pub fn new(state: LoopState) -> Self {
        Self(AtomicU8::new(state.as_u8()))
    }

    pub fn load(&self) -> LoopState {
        LoopState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, state: LoopState) {
        self.0.store(state.as_u8(), Ordering::Release);
    }

    /// Atomically move from `current` to `new`; returns the observed state on failure
    pub fn transition(&self, current: LoopState, new: LoopState) -> Result<(), LoopState> {
        self.0
            .compare_exchange(current.as_u8(), new.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(LoopState::from_u8)
    }
}
