use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use control_tower_core::models::*;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ApiResult, AppState};

/// Read-only: tasks stored before topics existed are reported as
/// `unclassified` rather than classified on the fly.
pub async fn list_tasks(State(state): State<AppState>) -> ApiResult<Json<Vec<Task>>> {
    Ok(Json(state.service.list_tasks().await?))
}

pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Task>> {
    Ok(Json(state.service.get_task(&id).await?))
}

pub async fn create_task(
    State(state): State<AppState>,
    payload: Result<Json<CreateTaskInput>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let Json(input) = payload?;
    let task = state.service.create_task(input).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<TaskPatch>, JsonRejection>,
) -> ApiResult<Json<Task>> {
    let Json(patch) = payload?;
    Ok(Json(state.service.update_task(&id, patch).await?))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    state.service.delete_task(&id).await?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Debug, Deserialize)]
pub struct AddSubtaskBody {
    pub title: String,
}

pub async fn add_subtask(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<AddSubtaskBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Subtask>)> {
    let Json(body) = payload?;
    let subtask = state.service.add_subtask(&id, &body.title).await?;
    Ok((StatusCode::CREATED, Json(subtask)))
}

pub async fn update_subtask(
    State(state): State<AppState>,
    Path((id, subtask_id)): Path<(String, String)>,
    payload: Result<Json<SubtaskPatch>, JsonRejection>,
) -> ApiResult<Json<Subtask>> {
    let Json(patch) = payload?;
    Ok(Json(state.service.update_subtask(&id, &subtask_id, patch).await?))
}

pub async fn delete_subtask(
    State(state): State<AppState>,
    Path((id, subtask_id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    state.service.delete_subtask(&id, &subtask_id).await?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendLogBody {
    pub message: String,
    #[serde(default)]
    pub subtask_id: Option<String>,
}

pub async fn append_log(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<AppendLogBody>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = payload?;
    state
        .service
        .append_log(&id, &body.message, body.subtask_id.as_deref())
        .await?;
    Ok(Json(json!({ "success": true })))
}
