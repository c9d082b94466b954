use std::time::Duration;

use axum::http::{header, StatusCode};
use axum_test::TestServer;
use serde_json::{json, Value};
use tempfile::TempDir;

use control_tower::api::{create_router, AppState};
use control_tower::live::{self, NotifierConfig, SessionBroadcaster};
use control_tower::service::TaskService;
use control_tower_core::DataPaths;

fn app_state(dir: &TempDir) -> AppState {
    let service = TaskService::open(&DataPaths::in_dir(dir.path()));
    AppState::new(service, SessionBroadcaster::default(), false)
}

fn server(dir: &TempDir) -> TestServer {
    TestServer::new(create_router(app_state(dir))).unwrap()
}

async fn create(server: &TestServer, title: &str) -> Value {
    let response = server.post("/api/tasks").json(&json!({ "title": title })).await;
    response.assert_status(StatusCode::CREATED);
    response.json()
}

#[tokio::test]
async fn health_reports_ok() {
    let dir = TempDir::new().unwrap();
    let body: Value = server(&dir).get("/api/health").await.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["liveUpdates"], false);
}

#[tokio::test]
async fn task_crud_round_trip() {
    let dir = TempDir::new().unwrap();
    let server = server(&dir);

    let list: Vec<Value> = server.get("/api/tasks").await.json();
    assert!(list.is_empty());

    let task = create(&server, "Fix the login bug").await;
    let id = task["id"].as_str().unwrap().to_string();
    assert_eq!(task["status"], "pending");
    assert_eq!(task["topic"], "bugfix");

    let updated: Value = server
        .patch(&format!("/api/tasks/{}", id))
        .json(&json!({ "status": "in-progress", "prUrl": "https://example.test/pr/1", "id": "hijack" }))
        .await
        .json();
    assert_eq!(updated["id"], id);
    assert_eq!(updated["status"], "in-progress");
    assert_eq!(updated["prUrl"], "https://example.test/pr/1");

    let fetched: Value = server.get(&format!("/api/tasks/{}", id)).await.json();
    assert_eq!(fetched, updated);

    let deleted: Value = server.delete(&format!("/api/tasks/{}", id)).await.json();
    assert_eq!(deleted["success"], true);
    server
        .get(&format!("/api/tasks/{}", id))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let dir = TempDir::new().unwrap();
    let server = server(&dir);
    create(&server, "Keep me").await;

    let response = server.get("/api/tasks/fake-id").await;
    response.assert_status(StatusCode::NOT_FOUND);
    response.assert_json(&json!({ "error": "Task not found" }));

    server
        .patch("/api/tasks/fake-id")
        .json(&json!({ "title": "x" }))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    server
        .delete("/api/tasks/fake-id")
        .await
        .assert_status(StatusCode::NOT_FOUND);
    server
        .get("/api/tasks/fake-id/spec")
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let list: Vec<Value> = server.get("/api/tasks").await.json();
    assert_eq!(list.len(), 1);
}

#[tokio::test]
async fn invalid_input_is_a_bad_request() {
    let dir = TempDir::new().unwrap();
    let server = server(&dir);

    let response = server.post("/api/tasks").json(&json!({ "title": "  " })).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["field"], "title");

    let task = create(&server, "Bounded").await;
    server
        .patch(&format!("/api/tasks/{}", task["id"].as_str().unwrap()))
        .json(&json!({ "progress": 150 }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unparseable_bodies_share_the_validation_shape() {
    let dir = TempDir::new().unwrap();
    let server = server(&dir);
    let task = create(&server, "Strict input").await;
    let id = task["id"].as_str().unwrap();

    for body in [json!({ "status": "finished" }), json!({ "progress": -1 })] {
        let response = server.patch(&format!("/api/tasks/{}", id)).json(&body).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let error: Value = response.json();
        assert_eq!(error["field"], "body");
        assert!(error["error"].as_str().unwrap().starts_with("Invalid body:"));
    }

    let response = server
        .post(&format!("/api/tasks/{}/subtasks", id))
        .json(&json!({ "name": "no title" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let unchanged: Value = server.get(&format!("/api/tasks/{}", id)).await.json();
    assert_eq!(unchanged["status"], "pending");
    assert!(unchanged["subtasks"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn subtasks_drive_parent_progress() {
    let dir = TempDir::new().unwrap();
    let server = server(&dir);
    let task = create(&server, "Ship release").await;
    let id = task["id"].as_str().unwrap();

    server
        .patch(&format!("/api/tasks/{}", id))
        .json(&json!({ "status": "in-progress" }))
        .await
        .assert_status_ok();

    let mut subtask_ids = Vec::new();
    for title in ["build", "tag"] {
        let response = server
            .post(&format!("/api/tasks/{}/subtasks", id))
            .json(&json!({ "title": title }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let subtask: Value = response.json();
        subtask_ids.push(subtask["id"].as_str().unwrap().to_string());
    }

    server
        .patch(&format!("/api/tasks/{}/subtasks/{}", id, subtask_ids[0]))
        .json(&json!({ "status": "done" }))
        .await
        .assert_status_ok();
    let half: Value = server.get(&format!("/api/tasks/{}", id)).await.json();
    assert_eq!(half["progress"], 50);
    assert_eq!(half["status"], "in-progress");

    server
        .delete(&format!("/api/tasks/{}/subtasks/{}", id, subtask_ids[1]))
        .await
        .assert_status_ok();
    let done: Value = server.get(&format!("/api/tasks/{}", id)).await.json();
    assert_eq!(done["progress"], 100);
    assert_eq!(done["status"], "done");

    server
        .patch(&format!("/api/tasks/{}/subtasks/fake-sub", id))
        .json(&json!({ "status": "done" }))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn logs_append_to_task_or_subtask() {
    let dir = TempDir::new().unwrap();
    let server = server(&dir);
    let task = create(&server, "Write docs").await;
    let id = task["id"].as_str().unwrap();
    let subtask: Value = server
        .post(&format!("/api/tasks/{}/subtasks", id))
        .json(&json!({ "title": "outline" }))
        .await
        .json();

    server
        .post(&format!("/api/tasks/{}/logs", id))
        .json(&json!({ "message": "started" }))
        .await
        .assert_status_ok();
    server
        .post(&format!("/api/tasks/{}/logs", id))
        .json(&json!({ "message": "drafted", "subtaskId": subtask["id"] }))
        .await
        .assert_status_ok();

    let fetched: Value = server.get(&format!("/api/tasks/{}", id)).await.json();
    let task_logs = fetched["logs"].as_array().unwrap();
    assert_eq!(task_logs.last().unwrap()["message"], "started");
    let sub_logs = fetched["subtasks"][0]["logs"].as_array().unwrap();
    assert_eq!(sub_logs.last().unwrap()["message"], "drafted");
}

#[tokio::test]
async fn spec_accepts_text_and_json_bodies() {
    let dir = TempDir::new().unwrap();
    let server = server(&dir);
    let task = create(&server, "Plan migration").await;
    let path = format!("/api/tasks/{}/spec", task["id"].as_str().unwrap());

    let empty: Value = server.get(&path).await.json();
    assert_eq!(empty["spec"], "");

    server.put(&path).text("# Plan\n- step").await.assert_status_ok();
    let text: Value = server.get(&path).await.json();
    assert_eq!(text["spec"], "# Plan\n- step");

    server
        .put(&path)
        .json(&json!({ "spec": "# Revised" }))
        .await
        .assert_status_ok();
    let revised: Value = server.get(&path).await.json();
    assert_eq!(revised["spec"], "# Revised");
    assert_eq!(revised["taskId"], task["id"]);
}

#[tokio::test]
async fn export_then_import_restores_tasks_and_specs() {
    let source_dir = TempDir::new().unwrap();
    let source = server(&source_dir);
    let task = create(&source, "Portable").await;
    let id = task["id"].as_str().unwrap();
    source
        .put(&format!("/api/tasks/{}/spec", id))
        .text("carried along")
        .await
        .assert_status_ok();

    let response = source.get("/api/export").await;
    response.assert_status_ok();
    let disposition = response.header(header::CONTENT_DISPOSITION);
    assert!(disposition.to_str().unwrap().contains("task-manager-export.json"));
    let bundle: Value = response.json();
    assert_eq!(bundle["version"], "1.0.0");
    assert_eq!(bundle["tasks"][0]["spec"], "carried along");

    let target_dir = TempDir::new().unwrap();
    let target = server(&target_dir);
    let summary: Value = target.post("/api/import").json(&bundle).await.json();
    assert_eq!(summary["created"], 1);

    let restored: Value = target.get(&format!("/api/tasks/{}/spec", id)).await.json();
    assert_eq!(restored["spec"], "carried along");
}

#[tokio::test]
async fn live_socket_sends_snapshot_then_changes() {
    let dir = TempDir::new().unwrap();
    let service = TaskService::open(&DataPaths::in_dir(dir.path()));
    let broadcaster = SessionBroadcaster::default();
    let config = NotifierConfig {
        poll_interval: Duration::from_millis(10),
        quiet_period: Duration::from_millis(50),
    };
    let handle = live::start(service.store().clone(), broadcaster.clone(), config).unwrap();
    let state = AppState::new(service.with_change_handle(handle), broadcaster, true);

    let server = TestServer::builder()
        .http_transport()
        .build(create_router(state))
        .unwrap();
    let mut socket = server.get_websocket("/ws").await.into_websocket().await;

    let snapshot: Value = socket.receive_json().await;
    assert_eq!(snapshot["type"], "FULL_STATE");
    assert_eq!(snapshot["tasks"], json!([]));

    create(&server, "Seen live").await;

    // The first push may still be the file being created on first read.
    let pushed = tokio::time::timeout(Duration::from_secs(3), async {
        loop {
            let message: Value = socket.receive_json().await;
            if message["tasks"].as_array().is_some_and(|tasks| !tasks.is_empty()) {
                break message;
            }
        }
    })
    .await
    .expect("no live push");
    assert_eq!(pushed["type"], "FULL_STATE");
    assert_eq!(pushed["tasks"][0]["title"], "Seen live");
}
