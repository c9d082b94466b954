//! Change detection for the task file.
//!
//! Other processes (the MCP server, the CLI) write the file directly, so the
//! only shared signal is the file itself. The notifier polls its identity
//! and fires once it has been stable for the quiet period, collapsing a burst
//! of writes into one signal. In-process writers can [`ChangeHandle::poke`] it
//! to skip waiting for the next poll.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use thiserror::Error;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

#[cfg(unix)]
use std::os::unix::fs::MetadataExt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifierConfig {
    pub poll_interval: Duration,
    pub quiet_period: Duration,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            quiet_period: Duration::from_millis(200),
        }
    }
}

#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("cannot watch {path}: {source}")]
    Setup {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Lets in-process writers announce a write they just finished.
#[derive(Debug, Clone)]
pub struct ChangeHandle {
    poke: Arc<Notify>,
}

impl ChangeHandle {
    pub fn poke(&self) {
        self.poke.notify_one();
    }
}

pub struct ChangeNotifier {
    path: PathBuf,
    config: NotifierConfig,
    poke: Arc<Notify>,
}

impl ChangeNotifier {
    pub fn new(path: impl Into<PathBuf>, config: NotifierConfig) -> Self {
        Self {
            path: path.into(),
            config,
            poke: Arc::new(Notify::new()),
        }
    }

    pub fn handle(&self) -> ChangeHandle {
        ChangeHandle {
            poke: Arc::clone(&self.poke),
        }
    }

    /// Starts the watch loop. Each settled change sends one `()` on `changes`;
    /// a signal is dropped when one is already queued. The loop ends when the
    /// receiver is dropped.
    pub fn spawn(self, changes: mpsc::Sender<()>) -> Result<JoinHandle<()>, NotifierError> {
        let setup_err = |source| NotifierError::Setup {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(setup_err)?;
        }
        let baseline = match Fingerprint::read(&self.path) {
            Ok(fingerprint) => fingerprint,
            Err(e) => return Err(setup_err(e)),
        };

        tracing::info!(path = %self.path.display(), quiet_ms = self.config.quiet_period.as_millis() as u64, "Watching task file");
        Ok(tokio::spawn(self.run(baseline, changes)))
    }

    async fn run(self, mut baseline: Option<Fingerprint>, changes: mpsc::Sender<()>) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut last_change: Option<Instant> = None;
        let mut read_failing = false;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.poke.notified() => {
                    last_change = Some(Instant::now());
                }
            }

            match Fingerprint::read(&self.path) {
                Ok(current) => {
                    read_failing = false;
                    if current != baseline {
                        baseline = current;
                        last_change = Some(Instant::now());
                    }
                }
                Err(e) => {
                    if !read_failing {
                        tracing::warn!(path = %self.path.display(), error = %e, "Cannot stat task file; live updates paused");
                        read_failing = true;
                    }
                    continue;
                }
            }

            let settled = last_change.is_some_and(|at| at.elapsed() >= self.config.quiet_period);
            if !settled {
                continue;
            }
            last_change = None;

            match changes.try_send(()) {
                Ok(()) => tracing::debug!(path = %self.path.display(), "Task file changed"),
                Err(mpsc::error::TrySendError::Full(())) => {}
                Err(mpsc::error::TrySendError::Closed(())) => break,
            }
        }

        tracing::debug!(path = %self.path.display(), "Change notifier stopped");
    }
}

/// What identifies one version of the file. A rename-over write changes the
/// inode even when size and mtime collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fingerprint {
    len: u64,
    modified: Option<SystemTime>,
    #[cfg(unix)]
    ino: u64,
}

impl Fingerprint {
    /// `None` when the file does not exist.
    fn read(path: &Path) -> std::io::Result<Option<Self>> {
        let meta = match std::fs::metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        Ok(Some(Self {
            len: meta.len(),
            modified: meta.modified().ok(),
            #[cfg(unix)]
            ino: meta.ino(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fast() -> NotifierConfig {
        NotifierConfig {
            poll_interval: Duration::from_millis(10),
            quiet_period: Duration::from_millis(60),
        }
    }

    async fn expect_signal(rx: &mut mpsc::Receiver<()>) {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("no change signal")
            .expect("notifier stopped");
    }

    async fn expect_silence(rx: &mut mpsc::Receiver<()>, wait: Duration) {
        assert!(tokio::time::timeout(wait, rx.recv()).await.is_err());
    }

    #[tokio::test]
    async fn external_write_fires_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.json");
        std::fs::write(&path, "[]").unwrap();

        let (tx, mut rx) = mpsc::channel(1);
        ChangeNotifier::new(&path, fast()).spawn(tx).unwrap();
        expect_silence(&mut rx, Duration::from_millis(150)).await;

        std::fs::write(&path, "[1]").unwrap();
        expect_signal(&mut rx).await;
        expect_silence(&mut rx, Duration::from_millis(150)).await;
    }

    #[tokio::test]
    async fn burst_of_writes_collapses_into_one_signal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.json");

        let (tx, mut rx) = mpsc::channel(1);
        ChangeNotifier::new(&path, fast()).spawn(tx).unwrap();

        for i in 0..5 {
            control_tower_core::store::write_atomic(&path, format!("[{}]", i).as_bytes()).unwrap();
            tokio::time::sleep(Duration::from_millis(15)).await;
        }
        expect_signal(&mut rx).await;
        expect_silence(&mut rx, Duration::from_millis(150)).await;
    }

    #[tokio::test]
    async fn poke_fires_without_a_file_change() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.json");

        let (tx, mut rx) = mpsc::channel(1);
        let notifier = ChangeNotifier::new(&path, fast());
        let handle = notifier.handle();
        notifier.spawn(tx).unwrap();

        handle.poke();
        expect_signal(&mut rx).await;
    }

    #[tokio::test]
    async fn unusable_location_fails_setup() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();

        let (tx, _rx) = mpsc::channel(1);
        let result = ChangeNotifier::new(blocker.join("tasks.json"), fast()).spawn(tx);
        assert!(matches!(result, Err(NotifierError::Setup { .. })));
    }
}
