//! HTTP client tests against an in-process axum server.
//!
//! The server mimics the execution service's JSON contract closely enough to
//! exercise auth headers, envelopes, and error mapping end to end.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use client::{ClientConfig, ClientError, ExecutionService, ExecutionStatus, HttpExecutionService};
use serde_json::{json, Value};

const TOKEN: &str = "secret-token";

#[derive(Clone, Default)]
struct Recorded {
    execute_bodies: Arc<Mutex<Vec<(String, Value)>>>,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {TOKEN}"))
        .unwrap_or(false)
}

async fn list(headers: HeaderMap) -> Result<Json<Value>, StatusCode> {
    if !authorized(&headers) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(Json(json!({
        "workflows": [{
            "id": 1,
            "name": "Document Processing",
            "steps": {
                "upload": { "id": "upload", "type": "input", "name": "Upload", "next_steps": ["validate"] },
                "validate": { "id": "validate", "type": "validation", "name": "Validate" }
            }
        }, {
            "id": 2,
            "name": "Webhook Relay",
            "steps": {
                "call": { "id": "call", "type": "api_call", "name": "Call API" }
            }
        }],
        "total": 2,
        "pages": 1,
        "current_page": 1
    })))
}

async fn create(
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), StatusCode> {
    if !authorized(&headers) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Workflow created successfully",
            "workflow": { "id": "workflow_2", "name": body["name"], "description": body["description"] }
        })),
    ))
}

async fn execute(
    Path(id): Path<String>,
    State(recorded): State<Recorded>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    if !authorized(&headers) {
        return Err((StatusCode::UNAUTHORIZED, Json(json!({ "error": "token expired" }))));
    }
    if id == "missing" {
        return Err((StatusCode::NOT_FOUND, Json(json!({ "error": "Workflow not found" }))));
    }
    recorded.execute_bodies.lock().unwrap().push((id, body));
    Ok((StatusCode::ACCEPTED, Json(json!({ "execution_id": "exec-42" }))))
}

async fn status(
    Path(execution_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    if !authorized(&headers) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(Json(json!({
        "execution": {
            "execution_id": execution_id,
            "status": "running",
            "current_step": { "id": "validate", "name": "Validate" },
            "steps_executed": [{ "id": "upload", "status": "completed" }]
        }
    })))
}

async fn spawn_server() -> (String, Recorded) {
    let recorded = Recorded::default();
    let app = Router::new()
        .route("/api/workflows", get(list).post(create))
        .route("/api/workflows/:id/execute", post(execute))
        .route("/api/workflows/executions/:execution_id", get(status))
        .with_state(recorded.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}/api/"), recorded)
}

fn client(base_url: &str, token: Option<&str>) -> HttpExecutionService {
    HttpExecutionService::new(ClientConfig {
        base_url: base_url.to_owned(),
        token: token.map(str::to_owned),
        ..ClientConfig::default()
    })
    .expect("client should build")
}

#[tokio::test]
async fn lists_workflows_skipping_undecodable_entries() {
    let (base, _) = spawn_server().await;
    let workflows = client(&base, Some(TOKEN)).list_workflows().await.unwrap();

    assert_eq!(workflows.len(), 1);
    assert_eq!(workflows[0].id, "1");
    assert_eq!(workflows[0].steps["upload"].next_steps, vec!["validate"]);
}

#[tokio::test]
async fn creates_workflow() {
    let (base, _) = spawn_server().await;
    let created = client(&base, Some(TOKEN))
        .create_workflow("Image Analysis", "Analyze uploaded images")
        .await
        .unwrap();

    assert_eq!(created.id, "workflow_2");
    assert_eq!(created.description.as_deref(), Some("Analyze uploaded images"));
}

#[tokio::test]
async fn execute_posts_input_data_and_returns_execution_id() {
    let (base, recorded) = spawn_server().await;
    let input = json!({ "document_type": "pdf", "document_file": "sample.pdf" });
    let id = client(&base, Some(TOKEN)).execute("1", &input).await.unwrap();

    assert_eq!(id, "exec-42");
    let bodies = recorded.execute_bodies.lock().unwrap();
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0].0, "1");
    assert_eq!(bodies[0].1, json!({ "input_data": input }));
}

#[tokio::test]
async fn fetches_execution_snapshot() {
    let (base, _) = spawn_server().await;
    let snapshot = client(&base, Some(TOKEN)).execution_status("exec-42").await.unwrap();

    assert_eq!(snapshot.execution_id, "exec-42");
    assert_eq!(snapshot.status, ExecutionStatus::Running);
    assert_eq!(snapshot.steps_executed.len(), 1);
}

#[tokio::test]
async fn missing_credential_maps_to_auth_required() {
    let (base, _) = spawn_server().await;
    let svc = client(&base, None);

    assert!(matches!(svc.list_workflows().await, Err(ClientError::AuthRequired)));
    assert!(svc.execute("1", &json!({})).await.unwrap_err().is_auth());
}

#[tokio::test]
async fn error_body_message_is_surfaced() {
    let (base, _) = spawn_server().await;
    let err = client(&base, Some(TOKEN))
        .execute("missing", &json!({}))
        .await
        .unwrap_err();

    match err {
        ClientError::Status { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "Workflow not found");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn unreachable_service_is_a_transport_error() {
    // Bind then drop to get a port nobody listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(&format!("http://{addr}"), Some(TOKEN))
        .list_workflows()
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Http(_)));
}
