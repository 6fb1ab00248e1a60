//! Ordered subscriber lists for loop notifications

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::domain::{ExceptionEvent, TickEvent};
use crate::engine::BackgroundLoop;
use crate::error::BoxError;

/// Return type of Starting, Tick and Stopping subscribers
pub type HandlerResult = std::result::Result<(), BoxError>;

/// Subscriber for the Starting and Stopping notifications
pub type LifecycleHandler = dyn Fn(&BackgroundLoop) -> HandlerResult + Send + Sync;

/// Subscriber for the Tick notification
pub type TickHandler = dyn Fn(&BackgroundLoop, &TickEvent) -> HandlerResult + Send + Sync;

/// Subscriber for the ThreadException notification
pub type ExceptionHandler = dyn Fn(&BackgroundLoop, &ExceptionEvent) + Send + Sync;

static NEXT_SUBSCRIPTION: AtomicU64 = AtomicU64::new(1);

/// Handle returned on subscription, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    fn next() -> Self {
        Self(NEXT_SUBSCRIPTION.fetch_add(1, Ordering::Relaxed))
    }
}

/// Subscribers invoked in registration order
pub struct Subscribers<H: ?Sized> {
    entries: RwLock<Vec<(SubscriptionId, Arc<H>)>>,
}

impl<H: ?Sized> Subscribers<H> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    pub fn add(&self, handler: Arc<H>) -> SubscriptionId {
        let id = SubscriptionId::next();
        self.entries.write().push((id, handler));
        id
    }

    pub fn remove(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        entries.len() != before
    }

    /// Copy of the current list; subscribers may (un)subscribe while being invoked
    pub fn snapshot(&self) -> Vec<Arc<H>> {
        self.entries.read().iter().map(|(_, h)| Arc::clone(h)).collect()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<H: ?Sized> Default for Subscribers<H> {
    fn default() -> Self {
        Self::new()
    }
}

/// The four notification lists of one loop
#[derive(Default)]
pub(crate) struct Handlers {
    pub starting: Subscribers<LifecycleHandler>,
    pub tick: Subscribers<TickHandler>,
    pub stopping: Subscribers<LifecycleHandler>,
    pub exception: Subscribers<ExceptionHandler>,
}

impl Handlers {
    pub fn remove(&self, id: SubscriptionId) -> bool {
        self.starting.remove(id) || self.tick.remove(id) || self.stopping.remove(id) || self.exception.remove(id)
    }
}
