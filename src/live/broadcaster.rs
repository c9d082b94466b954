use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use control_tower_core::models::Task;
use serde::Serialize;
use tokio::sync::broadcast;

/// A serialized push message, shared by every session.
pub type Payload = Arc<str>;

pub const DEFAULT_CAPACITY: usize = 16;

/// The only message a live viewer ever receives: the entire task list.
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum PushMessage<'a> {
    #[serde(rename = "FULL_STATE")]
    FullState { tasks: &'a [Task] },
}

impl PushMessage<'_> {
    pub fn to_payload(&self) -> serde_json::Result<Payload> {
        Ok(serde_json::to_string(self)?.into())
    }
}

/// Fans full-state payloads out to every connected session.
///
/// Each session owns a receiver; dropping it on disconnect is what removes
/// the session from the set. A slow session that falls behind skips straight
/// to the newest payload, and a failed send only ends that one session.
#[derive(Debug, Clone)]
pub struct SessionBroadcaster {
    sender: broadcast::Sender<Payload>,
    next_id: Arc<AtomicU64>,
}

/// One connected viewer.
#[derive(Debug)]
pub struct Session {
    pub id: u64,
    pub updates: broadcast::Receiver<Payload>,
}

impl SessionBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Registers a session. Subscribe before reading the snapshot you send on
    /// connect so no change slips between the two.
    pub fn connect(&self) -> Session {
        let session = Session {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            updates: self.sender.subscribe(),
        };
        tracing::debug!(session_id = session.id, sessions = self.session_count(), "Live session connected");
        session
    }

    pub fn session_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Pushes `tasks` to every open session. Returns how many were reached.
    pub fn publish(&self, tasks: &[Task]) -> serde_json::Result<usize> {
        let payload = PushMessage::FullState { tasks }.to_payload()?;
        // No receivers is not a failure: nobody is watching.
        let reached = self.sender.send(payload).unwrap_or(0);
        tracing::debug!(sessions = reached, tasks = tasks.len(), "Broadcast full state");
        Ok(reached)
    }
}

impl Default for SessionBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
