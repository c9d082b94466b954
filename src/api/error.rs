use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::error::ServiceError;

/// HTTP rendering of [`ServiceError`].
#[derive(Debug)]
pub struct ApiError(pub ServiceError);

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self(err)
    }
}

/// Bodies that fail to parse are reported like any other invalid input.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(ServiceError::validation("body", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self.0 {
            ServiceError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                json!({ "error": format!("Invalid {}: {}", field, message), "field": field }),
            ),
            ServiceError::NotFound { entity, .. } => (
                StatusCode::NOT_FOUND,
                json!({ "error": format!("{} not found", entity) }),
            ),
            ServiceError::Storage(_) | ServiceError::Background(_) => {
                tracing::error!(error = %self.0, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Storage temporarily unavailable, retry the request" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
