//! HTTP API and live socket.

mod bundle;
mod error;
mod health;
mod specs;
mod tasks;
mod ws;

use std::path::Path;

use axum::routing::{get, patch, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::live::SessionBroadcaster;
use crate::service::TaskService;

pub use error::{ApiError, ApiResult};
pub use health::Health;

#[derive(Clone)]
pub struct AppState {
    pub service: TaskService,
    pub broadcaster: SessionBroadcaster,
    pub live_updates: bool,
}

impl AppState {
    pub fn new(service: TaskService, broadcaster: SessionBroadcaster, live_updates: bool) -> Self {
        Self {
            service,
            broadcaster,
            live_updates,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(health::health))
        .route("/tasks", get(tasks::list_tasks).post(tasks::create_task))
        .route(
            "/tasks/{id}",
            get(tasks::get_task)
                .patch(tasks::update_task)
                .delete(tasks::delete_task),
        )
        .route("/tasks/{id}/subtasks", post(tasks::add_subtask))
        .route(
            "/tasks/{id}/subtasks/{subtask_id}",
            patch(tasks::update_subtask).delete(tasks::delete_subtask),
        )
        .route("/tasks/{id}/logs", post(tasks::append_log))
        .route("/tasks/{id}/spec", get(specs::get_spec).put(specs::put_spec))
        .route("/export", get(bundle::export_bundle))
        .route("/import", post(bundle::import_bundle));

    Router::new()
        .nest("/api", api)
        .route("/ws", get(ws::live_socket))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Serves a built dashboard for every path the API does not claim, falling
/// back to its `index.html` for client-side routes.
pub fn with_static_files(router: Router, dir: &Path) -> Router {
    let index = ServeFile::new(dir.join("index.html"));
    router.fallback_service(ServeDir::new(dir).fallback(index))
}
