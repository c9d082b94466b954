use axum::extract::{Path, State};
use axum::http::{header, HeaderMap};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ApiResult, AppState};
use crate::error::ServiceError;

pub async fn get_spec(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let spec = state.service.get_spec(&id).await?;
    Ok(Json(json!({ "taskId": id, "spec": spec })))
}

#[derive(Debug, Deserialize)]
struct SpecBody {
    #[serde(default)]
    spec: Option<String>,
}

/// Accepts the document as a raw `text/plain` body or as `{ "spec": "..." }`.
pub async fn put_spec(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: String,
) -> ApiResult<Json<Value>> {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));

    let text = if is_json {
        serde_json::from_str::<SpecBody>(&body)
            .map_err(|e| ServiceError::validation("spec", e.to_string()))?
            .spec
            .unwrap_or_default()
    } else {
        body
    };

    state.service.put_spec(&id, text).await?;
    Ok(Json(json!({ "taskId": id, "success": true })))
}
