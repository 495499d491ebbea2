//! Integration tests for the HTTP control surface
//!
//! Drives build_router with oneshot requests; the remote OSCQuery side is a
//! local fixture server and outbound OSC lands on a capture socket.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::get;
use axum::Router;
use paramvault::avatar::AvatarState;
use paramvault::osc::ParameterSender;
use paramvault::oscquery::OscQueryClient;
use paramvault::service::SyncService;
use paramvault::store::SnapshotStore;
use paramvault::{build_router, AppState};
use serde_json::Value;
use tempfile::TempDir;
use tokio::net::UdpSocket;
use tower::util::ServiceExt; // for `oneshot` method

const FIXTURE_TREE: &str = r#"{
    "CONTENTS": {
        "avatar": {
            "CONTENTS": {
                "parameters": {
                    "CONTENTS": {
                        "Gauge": {"ACCESS": 3, "VALUE": [1.5]},
                        "Telemetry": {"ACCESS": 1, "VALUE": [2]},
                        "Wings": {"ACCESS": 3, "VALUE": [true]}
                    }
                }
            }
        }
    }
}"#;

struct TestApp {
    app: Router,
    avatar: Arc<AvatarState>,
    service: Arc<SyncService>,
    _capture: UdpSocket,
    _dir: TempDir,
}

/// Test helper: app with store in a temp dir and OSC aimed at a capture socket
async fn setup_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path().join("saves")).unwrap();

    let capture = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let sender = ParameterSender::connect(capture.local_addr().unwrap())
        .await
        .unwrap();

    let avatar = Arc::new(AvatarState::new());
    let service = Arc::new(SyncService::new(store, sender, avatar.clone()));
    let app = build_router(AppState::new(service.clone(), avatar.clone()));

    TestApp {
        app,
        avatar,
        service,
        _capture: capture,
        _dir: dir,
    }
}

async fn spawn_tree_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().route(
        "/",
        get(|| async { ([("content-type", "application/json")], FIXTURE_TREE) }),
    );
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn form_request(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

#[tokio::test]
async fn health_endpoint_reports_module() {
    let t = setup_app().await;

    let response = t.app.oneshot(request("GET", "/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "paramvault");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn index_serves_html_ui() {
    let t = setup_app().await;

    let response = t.app.clone().oneshot(request("GET", "/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let html = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(html.contains("ParamVault"));

    let response = t
        .app
        .oneshot(request("GET", "/static/app.js"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"],
        "application/javascript"
    );
}

#[tokio::test]
async fn status_reflects_readiness() {
    let t = setup_app().await;

    let response = t
        .app
        .clone()
        .oneshot(request("GET", "/api/status"))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["connected"], false);
    assert_eq!(body["current_avatar"], Value::Null);

    t.avatar.observe("avtr_live").await;
    let response = t.app.oneshot(request("GET", "/api/status")).await.unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["current_avatar"], "avtr_live");
}

#[tokio::test]
async fn save_before_discovery_is_service_unavailable() {
    let t = setup_app().await;

    let response = t
        .app
        .oneshot(form_request("/save", "save_name=Too+Early"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn apply_unknown_key_is_not_found() {
    let t = setup_app().await;
    t.avatar.observe("avtr_live").await;

    let response = t
        .app
        .oneshot(request("POST", "/apply/avtr_ghost"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn snapshot_listing_starts_empty() {
    let t = setup_app().await;

    let response = t
        .app
        .oneshot(request("GET", "/api/snapshots"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["snapshots"], Value::Array(vec![]));
}

#[tokio::test]
async fn save_list_apply_delete_flow() {
    let t = setup_app().await;
    t.avatar.observe("avtrX").await;
    t.service
        .attach_remote(OscQueryClient::new(spawn_tree_server().await))
        .await;

    // Save
    let response = t
        .app
        .clone()
        .oneshot(form_request("/save", "save_name=Fixture"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "saved");
    assert_eq!(body["parameters"], 2);

    // List
    let response = t
        .app
        .clone()
        .oneshot(request("GET", "/api/snapshots"))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["snapshots"][0]["key"], "avtrX");
    assert_eq!(body["snapshots"][0]["display_name"], "Fixture");
    assert_eq!(body["snapshots"][0]["current"], true);

    // Apply
    let response = t
        .app
        .clone()
        .oneshot(request("POST", "/apply/avtrX"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "applied");
    assert_eq!(body["parameters"], 2);

    // Copy to current (self-copy; content must remain listed once)
    let response = t
        .app
        .clone()
        .oneshot(request("POST", "/copy/avtrX"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Delete
    let response = t
        .app
        .clone()
        .oneshot(request("DELETE", "/api/snapshots/avtrX"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = t
        .app
        .oneshot(request("GET", "/api/snapshots"))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["snapshots"], Value::Array(vec![]));
}

#[tokio::test]
async fn delete_unknown_snapshot_is_not_found() {
    let t = setup_app().await;

    let response = t
        .app
        .oneshot(request("DELETE", "/api/snapshots/avtr_ghost"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
