//! Graceful shutdown coordination via `CancellationToken`.
//!
//! Upgraded WebSocket connections are detached from the HTTP server, so
//! `axum`'s graceful shutdown does not wait for them. Each connection task
//! watches the token instead and sends a Close frame when it fires.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How long to wait for background tasks after the listener stops.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared shutdown signal for the listener and every connection task.
#[derive(Clone, Debug, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a coordinator that has not fired.
    pub fn new() -> Self {
        Self::default()
    }

    /// A clone of the cancellation token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Fire the signal.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether the signal has fired.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Fire the signal, then wait up to `timeout` for `tasks` to finish.
    ///
    /// Returns `false` if the wait timed out.
    pub async fn graceful_shutdown(&self, tasks: Vec<JoinHandle<()>>, timeout: Option<Duration>) -> bool {
        let limit = timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT);
        self.shutdown();
        info!(tasks = tasks.len(), limit_secs = limit.as_secs_f64(), "draining background tasks");

        match tokio::time::timeout(limit, futures::future::join_all(tasks)).await {
            Ok(_) => true,
            Err(_) => {
                warn!(?limit, "background tasks still running at shutdown");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_inactive() {
        assert!(!ShutdownCoordinator::new().is_shutting_down());
    }

    #[test]
    fn clones_share_the_signal() {
        let coord = ShutdownCoordinator::new();
        let other = coord.clone();
        let token = coord.token();
        other.shutdown();
        assert!(coord.is_shutting_down());
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn graceful_shutdown_waits_for_tasks() {
        let coord = ShutdownCoordinator::new();
        let token = coord.token();
        let handle = tokio::spawn(async move { token.cancelled().await });

        assert!(
            coord
                .graceful_shutdown(vec![handle], Some(Duration::from_secs(5)))
                .await
        );
        assert!(coord.is_shutting_down());
    }

    #[tokio::test(start_paused = true)]
    async fn graceful_shutdown_times_out() {
        let coord = ShutdownCoordinator::new();
        let handle = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });

        assert!(
            !coord
                .graceful_shutdown(vec![handle], Some(Duration::from_millis(50)))
                .await
        );
    }
}
