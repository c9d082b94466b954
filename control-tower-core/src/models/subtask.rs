use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{validate_progress, validate_title, LogEntry, TaskStatus};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subtask {
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subtask {
    pub fn new(title: impl Into<String>, now: DateTime<Utc>) -> Self {
        let title = title.into();
        Self {
            id: Uuid::new_v4().to_string(),
            logs: vec![LogEntry::new(format!("Subtask created: {}", title), now)],
            title,
            status: TaskStatus::Pending,
            progress: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_done(&self) -> bool {
        self.status == TaskStatus::Done
    }
}

/// Partial update for a subtask. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubtaskPatch {
    pub title: Option<String>,
    pub status: Option<TaskStatus>,
    pub progress: Option<u32>,
}

impl SubtaskPatch {
    pub fn validate(&self) -> Result<()> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if let Some(progress) = self.progress {
            validate_progress(progress)?;
        }
        Ok(())
    }

    /// Merges the patch into `subtask`. Call [`SubtaskPatch::validate`] first.
    pub(crate) fn apply_to(self, subtask: &mut Subtask, now: DateTime<Utc>) {
        if let Some(title) = self.title {
            subtask.title = title;
        }
        if let Some(status) = self.status {
            subtask.status = status;
        }
        if let Some(progress) = self.progress {
            subtask.progress = progress.min(100) as u8;
        }
        subtask.updated_at = now;
    }
}
