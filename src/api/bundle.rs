use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use control_tower_core::models::{ExportBundle, ImportSummary};

use super::{ApiResult, AppState};

const EXPORT_DISPOSITION: &str = "attachment; filename=\"task-manager-export.json\"";

pub async fn export_bundle(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let bundle = state.service.export_bundle().await?;
    Ok(([(header::CONTENT_DISPOSITION, EXPORT_DISPOSITION)], Json(bundle)))
}

pub async fn import_bundle(
    State(state): State<AppState>,
    payload: Result<Json<ExportBundle>, JsonRejection>,
) -> ApiResult<Json<ImportSummary>> {
    let Json(bundle) = payload?;
    Ok(Json(state.service.import_bundle(bundle).await?))
}
