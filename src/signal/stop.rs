//! One-shot stop gate.
//!
//! Created closed on each start, opened exactly once when the worker exits,
//! and awaited asynchronously by `stop_async` callers.

use tokio::sync::watch;

#[derive(Debug)]
pub struct StopGate {
    opened: watch::Sender<bool>,
}

impl StopGate {
    pub fn new() -> Self {
        let (opened, _) = watch::channel(false);
        Self { opened }
    }

    /// Open the gate, releasing every current and future waiter
    pub fn open(&self) {
        self.opened.send_replace(true);
    }

    #[cfg(test)]
    fn is_open(&self) -> bool {
        *self.opened.borrow()
    }

    /// Wait until the gate is opened
    pub async fn wait(&self) {
        let mut rx = self.opened.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait
        let _ = rx.wait_for(|opened| *opened).await;
    }
}

impl Default for StopGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_new_gate_is_closed() {
        let gate = StopGate::new();
        assert!(!gate.is_open());
        gate.open();
        assert!(gate.is_open());
    }

    #[tokio::test]
    async fn test_wait_returns_after_open() {
        let gate = Arc::new(StopGate::new());
        let opener = Arc::clone(&gate);
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            opener.open();
        });

        tokio::time::timeout(Duration::from_secs(5), gate.wait())
            .await
            .expect("gate should open");
    }

    #[tokio::test]
    async fn test_wait_on_open_gate_is_immediate() {
        let gate = StopGate::new();
        gate.open();
        tokio::time::timeout(Duration::from_millis(100), gate.wait())
            .await
            .expect("already open");
    }

    #[tokio::test]
    async fn test_closed_gate_blocks() {
        let gate = StopGate::new();
        let result = tokio::time::timeout(Duration::from_millis(20), gate.wait()).await;
        assert!(result.is_err());
    }
}
