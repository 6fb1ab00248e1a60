//! Per-thread ambient state of a loop's worker thread.
//!
//! Only a worker thread ever writes these slots, so on any other thread both
//! lookups return `None`.

use std::cell::RefCell;

use crate::context::SyncContext;
use crate::engine::BackgroundLoop;

thread_local! {
    static CURRENT_LOOP: RefCell<Option<BackgroundLoop>> = const { RefCell::new(None) };
    static CURRENT_CONTEXT: RefCell<Option<SyncContext>> = const { RefCell::new(None) };
}

/// Install the loop's marshaling context and identity on the calling thread
pub(crate) fn enter(lp: &BackgroundLoop) {
    CURRENT_CONTEXT.with(|slot| *slot.borrow_mut() = Some(lp.sync_context()));
    CURRENT_LOOP.with(|slot| *slot.borrow_mut() = Some(lp.clone()));
}

/// Clear the loop identity; the marshaling context stays until `exit`
pub(crate) fn leave_loop() {
    // Take first so the handle is dropped outside the borrow
    let previous = CURRENT_LOOP.with(|slot| slot.borrow_mut().take());
    drop(previous);
}

/// Clear everything installed by `enter`
pub(crate) fn exit() {
    leave_loop();
    let previous = CURRENT_CONTEXT.with(|slot| slot.borrow_mut().take());
    drop(previous);
}

pub(crate) fn current_loop() -> Option<BackgroundLoop> {
    CURRENT_LOOP.with(|slot| slot.borrow().clone())
}

pub(crate) fn current_context() -> Option<SyncContext> {
    CURRENT_CONTEXT.with(|slot| slot.borrow().clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nothing_installed_on_plain_thread() {
        assert!(current_loop().is_none());
        assert!(current_context().is_none());
    }

    #[test]
    fn test_enter_and_exit() {
        let lp = BackgroundLoop::default();
        enter(&lp);
        assert!(current_loop().is_some_and(|current| current.ptr_eq(&lp)));
        assert!(current_context().is_some_and(|ctx| ctx == lp.sync_context()));

        leave_loop();
        assert!(current_loop().is_none());
        assert!(current_context().is_some());

        exit();
        assert!(current_context().is_none());
    }
}
