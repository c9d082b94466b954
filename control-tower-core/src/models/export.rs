use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Task;

pub const EXPORT_FORMAT_VERSION: &str = "1.0.0";

/// Every task together with its spec document, as written by an export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle {
    pub exported_at: DateTime<Utc>,
    pub version: String,
    pub tasks: Vec<ExportedTask>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedTask {
    #[serde(flatten)]
    pub task: Task,
    #[serde(default)]
    pub spec: String,
}

impl ExportBundle {
    pub fn new(tasks: Vec<ExportedTask>, exported_at: DateTime<Utc>) -> Self {
        Self {
            exported_at,
            version: EXPORT_FORMAT_VERSION.to_string(),
            tasks,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub created: usize,
    pub replaced: usize,
}
