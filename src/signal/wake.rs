//! Wake signal for the worker's bounded wait.
//!
//! A boolean dirty flag guarded by a mutex. Any number of `wake()` calls made
//! before the worker consumes the flag collapse into a single extra pass, and a
//! wake issued while the worker is between checks is never lost because the
//! flag is only cleared under the same lock the worker waits on.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
pub struct WakeSignal {
    pending: Mutex<bool>,
    notify: Condvar,
}

impl WakeSignal {
    /// Create a signal; `primed` makes the first wait return immediately
    pub fn new(primed: bool) -> Self {
        Self {
            pending: Mutex::new(primed),
            notify: Condvar::new(),
        }
    }

    /// Request at least one extra pass of the worker
    pub fn wake(&self) {
        let mut pending = self.pending.lock();
        *pending = true;
        self.notify.notify_one();
    }

    /// Block until woken or `timeout` elapses; returns true if woken
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut pending = self.pending.lock();
        while !*pending {
            if self.notify.wait_until(&mut pending, deadline).timed_out() {
                break;
            }
        }
        std::mem::replace(&mut *pending, false)
    }

    /// Returns true if a wake is waiting to be consumed
    #[cfg(test)]
    fn is_pending(&self) -> bool {
        *self.pending.lock()
    }
}
