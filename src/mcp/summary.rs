use chrono::{DateTime, Utc};
use control_tower_core::models::{Task, TaskStatus, Topic};
use serde::Serialize;

/// One row of `list_tasks`: enough to pick a task without its logs.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub progress: u8,
    pub topic: Topic,
    /// Completed over total, e.g. `2/3`.
    pub subtasks: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Task> for TaskSummary {
    fn from(task: &Task) -> Self {
        let (done, total) = task.subtask_counts();
        Self {
            id: task.id.clone(),
            title: task.title.clone(),
            description: task.description.clone(),
            status: task.status,
            progress: task.progress,
            topic: task.topic.clone(),
            subtasks: format!("{}/{}", done, total),
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}
