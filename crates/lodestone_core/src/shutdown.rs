//! Shutdown coordination for graceful server shutdown.
//!
//! A cloneable flag shared by the accept loop, the pulse clock owner and the
//! application layer. Besides polling, components can await the transition.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Shared shutdown state for coordinating graceful shutdown across components.
#[derive(Debug, Clone)]
pub struct ShutdownState {
    initiated: Arc<watch::Sender<bool>>,
}

impl ShutdownState {
    /// Creates a new shutdown state that has not been initiated.
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            initiated: Arc::new(sender),
        }
    }

    /// Returns true once shutdown has been initiated.
    pub fn is_shutdown_initiated(&self) -> bool {
        *self.initiated.borrow()
    }

    /// Initiates shutdown and wakes every task waiting in [`Self::wait`].
    ///
    /// Calling it more than once is harmless.
    pub fn initiate_shutdown(&self) {
        if !self.initiated.send_replace(true) {
            info!("🛑 Shutdown initiated - no new connections will be accepted");
        }
    }

    /// Resolves once shutdown has been initiated.
    pub async fn wait(&self) {
        let mut receiver = self.initiated.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = receiver.wait_for(|initiated| *initiated).await;
    }
}

impl Default for ShutdownState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn wait_resolves_after_initiation() {
        let state = ShutdownState::new();
        let waiter = {
            let state = state.clone();
            tokio::spawn(async move { state.wait().await })
        };

        assert!(!state.is_shutdown_initiated());
        state.initiate_shutdown();
        state.initiate_shutdown();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .expect("waiter task should not panic");
        assert!(state.is_shutdown_initiated());
    }

    #[tokio::test]
    async fn wait_returns_immediately_when_already_initiated() {
        let state = ShutdownState::new();
        state.initiate_shutdown();
        tokio::time::timeout(Duration::from_millis(100), state.wait())
            .await
            .expect("already-initiated shutdown should not block");
    }
}
