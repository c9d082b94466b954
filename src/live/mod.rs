//! Live push: a file-change notifier feeding a session broadcaster.
//!
//! Any writer (HTTP handler, MCP process, CLI) -> task file -> notifier ->
//! fresh full-state read -> every connected session.

mod broadcaster;
mod notifier;

use control_tower_core::TaskStore;
use tokio::sync::mpsc;

pub use broadcaster::{Payload, PushMessage, Session, SessionBroadcaster, DEFAULT_CAPACITY};
pub use notifier::{ChangeHandle, ChangeNotifier, NotifierConfig, NotifierError};

/// Starts watching `store`'s file and broadcasting on every settled change.
///
/// Returns `None` when the watch cannot be set up: the server keeps serving
/// requests and viewers fall back to fetching the list themselves.
pub fn start(
    store: TaskStore,
    broadcaster: SessionBroadcaster,
    config: NotifierConfig,
) -> Option<ChangeHandle> {
    let (tx, mut rx) = mpsc::channel(1);
    let notifier = ChangeNotifier::new(store.path(), config);
    let handle = notifier.handle();

    if let Err(e) = notifier.spawn(tx) {
        tracing::warn!(error = %e, "Live updates unavailable; viewers must refresh manually");
        return None;
    }

    tokio::spawn(async move {
        while rx.recv().await.is_some() {
            if broadcaster.session_count() == 0 {
                continue;
            }

            let reader = store.clone();
            let tasks = match tokio::task::spawn_blocking(move || reader.list_all()).await {
                Ok(tasks) => tasks,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read tasks for broadcast");
                    continue;
                }
            };
            if let Err(e) = broadcaster.publish(&tasks) {
                tracing::error!(error = %e, "Failed to serialize full state");
            }
        }
    });

    Some(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use control_tower_core::models::CreateTaskInput;
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn external_writer_reaches_connected_sessions() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.json");
        let store = TaskStore::new(&path);
        let broadcaster = SessionBroadcaster::default();
        let config = NotifierConfig {
            poll_interval: Duration::from_millis(10),
            quiet_period: Duration::from_millis(50),
        };

        start(store, broadcaster.clone(), config).expect("watch setup");
        let mut session = broadcaster.connect();

        // A second store over the same file stands in for another process.
        let other_process = TaskStore::new(&path);
        other_process.create(CreateTaskInput::titled("From elsewhere")).unwrap();

        let payload = tokio::time::timeout(Duration::from_secs(2), session.updates.recv())
            .await
            .expect("no push")
            .unwrap();
        assert!(payload.contains("From elsewhere"));
        assert!(payload.contains("FULL_STATE"));
    }
}
