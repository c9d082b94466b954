use control_tower_core::StoreError;
use thiserror::Error;

/// Outcome taxonomy shared by every entry point (HTTP, MCP, CLI).
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("storage failure: {0}")]
    Storage(StoreError),

    #[error("background task failed: {0}")]
    Background(#[from] tokio::task::JoinError),
}

impl ServiceError {
    pub fn task_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "Task",
            id: id.into(),
        }
    }

    pub fn subtask_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "Subtask",
            id: id.into(),
        }
    }

    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation { field, message } => Self::Validation { field, message },
            other => Self::Storage(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
