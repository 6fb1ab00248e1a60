//! Action queue: unbounded multi-producer, single-consumer FIFO of deferred work.
//!
//! Any thread may enqueue. Only the loop's worker thread drains, and only in
//! the drain step of its run cycle.

mod completion;
mod item;

pub use completion::Completion;
pub use item::{Action, QueuedItem, from_fn, from_try_fn};

use crossbeam::queue::SegQueue;

/// Lock-free FIFO of queued items
#[derive(Default)]
pub struct ActionQueue {
    items: SegQueue<QueuedItem>,
}

impl ActionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item; never blocks and never fails
    pub fn enqueue(&self, item: QueuedItem) {
        self.items.push(item);
    }

    /// Remove everything present at the snapshot point, in enqueue order.
    ///
    /// Items pushed while draining stay queued for the next call.
    pub fn drain(&self) -> Vec<QueuedItem> {
        let snapshot = self.items.len();
        let mut batch = Vec::with_capacity(snapshot);
        for _ in 0..snapshot {
            match self.items.pop() {
                Some(item) => batch.push(item),
                None => break,
            }
        }
        batch
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl std::fmt::Debug for ActionQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionQueue").field("len", &self.len()).finish()
    }
}
