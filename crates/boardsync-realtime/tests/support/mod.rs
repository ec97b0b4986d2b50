//! Shared helpers for integration tests.

use std::time::Duration;

use tokio::sync::broadcast;

use boardsync_core::config::collab::CollabConfig;
use boardsync_realtime::CollabEvent;

/// Installs a test subscriber once; respects `RUST_LOG`.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Default engine configuration for tests.
pub fn test_config() -> CollabConfig {
    CollabConfig::default()
}

/// Waits for the next event matching the predicate, skipping others.
pub async fn wait_for_event<F>(
    rx: &mut broadcast::Receiver<CollabEvent>,
    deadline: Duration,
    mut pred: F,
) -> CollabEvent
where
    F: FnMut(&CollabEvent) -> bool,
{
    tokio::time::timeout(deadline, async {
        loop {
            match rx.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

/// Returns whether an event matching the predicate arrives before the
/// deadline. Useful for asserting that something does NOT happen.
pub async fn saw_event<F>(
    rx: &mut broadcast::Receiver<CollabEvent>,
    deadline: Duration,
    mut pred: F,
) -> bool
where
    F: FnMut(&CollabEvent) -> bool,
{
    tokio::time::timeout(deadline, async {
        loop {
            match rx.recv().await {
                Ok(event) if pred(&event) => return true,
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return false,
            }
        }
    })
    .await
    .unwrap_or(false)
}
