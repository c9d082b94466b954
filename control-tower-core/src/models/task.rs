use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{classify, LogEntry, Subtask, Topic};
use crate::error::{Result, StoreError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub topic: Topic,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    #[serde(default)]
    pub github_repo: String,
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub pr_url: String,
    #[serde(default)]
    pub associated_files: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Done,
    Failed,
    Blocked,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 5] = [
        Self::Pending,
        Self::InProgress,
        Self::Done,
        Self::Failed,
        Self::Blocked,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Blocked => "blocked",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in-progress" => Some(Self::InProgress),
            "done" => Some(Self::Done),
            "failed" => Some(Self::Failed),
            "blocked" => Some(Self::Blocked),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `round(100 * done / total)`, rounding halves up. Zero when `total` is zero.
pub fn completion_percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((200 * done + total) / (2 * total)).min(100) as u8
}

impl Task {
    pub fn new(input: CreateTaskInput, now: DateTime<Utc>) -> Self {
        let topic = input
            .topic
            .unwrap_or_else(|| classify(&input.title, input.description.as_deref().unwrap_or("")));

        Self {
            id: Uuid::new_v4().to_string(),
            logs: vec![LogEntry::new(format!("Task created: {}", input.title), now)],
            title: input.title,
            description: input.description.unwrap_or_default(),
            status: TaskStatus::Pending,
            progress: 0,
            topic,
            subtasks: Vec::new(),
            github_repo: input.github_repo.unwrap_or_default(),
            branch: input.branch.unwrap_or_default(),
            pr_url: String::new(),
            associated_files: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn subtask(&self, subtask_id: &str) -> Option<&Subtask> {
        self.subtasks.iter().find(|s| s.id == subtask_id)
    }

    pub fn subtask_mut(&mut self, subtask_id: &str) -> Option<&mut Subtask> {
        self.subtasks.iter_mut().find(|s| s.id == subtask_id)
    }

    /// Number of done subtasks and the total.
    pub fn subtask_counts(&self) -> (usize, usize) {
        let done = self.subtasks.iter().filter(|s| s.is_done()).count();
        (done, self.subtasks.len())
    }

    /// Re-derives progress from subtasks and applies the completion rule.
    ///
    /// Progress is only recomputed while subtasks exist; with none left the
    /// last value stands. Status only moves `in-progress -> done`, and only at
    /// exactly 100.
    pub(crate) fn derive(&mut self) {
        if !self.subtasks.is_empty() {
            let (done, total) = self.subtask_counts();
            self.progress = completion_percent(done, total);
        }
        if self.progress == 100 && self.status == TaskStatus::InProgress {
            self.status = TaskStatus::Done;
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskInput {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub github_repo: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub topic: Option<Topic>,
}

impl CreateTaskInput {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_title(&self.title)
    }
}

/// Partial update for a task. Absent fields are left untouched; `id`,
/// `createdAt`, `subtasks` and `logs` are not patchable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub progress: Option<u32>,
    pub topic: Option<Topic>,
    pub github_repo: Option<String>,
    pub branch: Option<String>,
    pub pr_url: Option<String>,
    pub associated_files: Option<Vec<String>>,
}

impl TaskPatch {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if let Some(progress) = self.progress {
            validate_progress(progress)?;
        }
        Ok(())
    }

    /// Merges the patch into `task`. Call [`TaskPatch::validate`] first.
    pub(crate) fn apply_to(self, task: &mut Task, now: DateTime<Utc>) {
        if let Some(title) = self.title {
            task.title = title;
        }
        if let Some(description) = self.description {
            task.description = description;
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(progress) = self.progress {
            task.progress = progress.min(100) as u8;
        }
        if let Some(topic) = self.topic {
            task.topic = topic;
        }
        if let Some(github_repo) = self.github_repo {
            task.github_repo = github_repo;
        }
        if let Some(branch) = self.branch {
            task.branch = branch;
        }
        if let Some(pr_url) = self.pr_url {
            task.pr_url = pr_url;
        }
        if let Some(files) = self.associated_files {
            task.associated_files = dedup_preserving_order(files);
        }
        task.updated_at = now;
    }
}

pub fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(StoreError::validation("title", "must not be empty"));
    }
    Ok(())
}

pub fn validate_progress(progress: u32) -> Result<()> {
    if progress > 100 {
        return Err(StoreError::validation(
            "progress",
            format!("must be between 0 and 100, got {}", progress),
        ));
    }
    Ok(())
}

fn dedup_preserving_order(files: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    files
        .into_iter()
        .filter(|f| seen.insert(f.clone()))
        .collect()
}
