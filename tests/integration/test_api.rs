//! HTTP API tests through the full router.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use kwcluster::{create_router, ApiState, Authenticator, Config, KeyStore};

use super::support::{linked_pipeline, unavailable_pipeline};

const KEY: &str = "test-key";

struct TestApp {
    router: Router,
    _dir: TempDir,
}

fn config() -> Config {
    let mut config = Config::default();
    config.server.sync_max_keywords = 5;
    config.server.async_max_keywords = 10;
    config.refinement.enabled = false;
    config
}

fn authenticator(dir: &TempDir) -> Authenticator {
    Authenticator::new(dir.path().join("api_keys.json"), KEY)
}

fn app_with(state: ApiState) -> TestApp {
    let dir = TempDir::new().unwrap();
    let router = create_router(Arc::new(state), authenticator(&dir), true);
    TestApp { router, _dir: dir }
}

fn linked_app() -> TestApp {
    let config = config();
    let state = ApiState::new(&config).with_pipeline(Arc::new(linked_pipeline(&config)), &config);
    app_with(state)
}

fn post(uri: &str, key: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::post(uri).header("content-type", "application/json");
    if let Some(key) = key {
        builder = builder.header("X-API-Key", key);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn gold_request() -> Value {
    json!({
        "keywords": [
            {"text": "giá vàng", "volume": 100},
            {"text": "giá vàng sjc", "volume": "90"},
            {"text": "thời tiết", "volume": 5}
        ],
        "level": "trung bình"
    })
}

#[tokio::test]
async fn test_root_and_health_are_public() {
    let app = linked_app();

    let (status, body) = send(&app, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].as_str().unwrap().contains("Keyword Clustering API"));

    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "keyword-clustering-api");
}

#[tokio::test]
async fn test_missing_or_wrong_key_is_forbidden() {
    let app = linked_app();

    let (status, body) = send(&app, post("/cluster_keywords_sync", None, gold_request())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Could not validate credentials");

    let (status, _) = send(&app, post("/cluster_keywords", Some("nope"), gold_request())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_key_store_replaces_fallback_key() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("api_keys.json");
    let issued = KeyStore::load(&path).unwrap().create("acme").unwrap();

    let config = config();
    let state = ApiState::new(&config).with_pipeline(Arc::new(linked_pipeline(&config)), &config);
    let router = create_router(Arc::new(state), Authenticator::new(&path, KEY), false);
    let app = TestApp { router, _dir: dir };

    let (status, _) = send(&app, post("/cluster_keywords_sync", Some(KEY), gold_request())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        post("/cluster_keywords_sync", Some(&issued.key), gold_request()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_sync_clusters() {
    let app = linked_app();

    let (status, body) = send(&app, post("/cluster_keywords_sync", Some(KEY), gold_request())).await;
    assert_eq!(status, StatusCode::OK);

    let gold = &body["clusters"]["giá vàng"];
    assert_eq!(gold["cluster_name"], "giá vàng");
    assert_eq!(gold["total_volume_topic"], 190);
    assert_eq!(gold["keywords"].as_array().unwrap().len(), 2);
    assert_eq!(body["summary"]["total_keywords_processed"], 3);
    assert_eq!(body["summary"]["noise_keywords_found"], 1);
    assert_eq!(body["unclustered_keywords"], json!([]));
}

#[tokio::test]
async fn test_sync_rejects_empty_and_oversized() {
    let app = linked_app();

    let (status, body) = send(
        &app,
        post("/cluster_keywords_sync", Some(KEY), json!({"keywords": []})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "empty_input");

    let keywords: Vec<Value> = (0..6).map(|i| json!({"text": format!("kw {}", i)})).collect();
    let (status, body) = send(
        &app,
        post("/cluster_keywords_sync", Some(KEY), json!({"keywords": keywords})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "too_many_keywords");
}

#[tokio::test]
async fn test_no_model_is_service_unavailable() {
    let app = app_with(ApiState::new(&config()));

    let (status, body) = send(&app, post("/cluster_keywords_sync", Some(KEY), gold_request())).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "AI model is not loaded. Please try again later.");

    let (status, _) = send(&app, post("/cluster_keywords", Some(KEY), gold_request())).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_encoder_failure_is_service_unavailable() {
    let config = config();
    let state =
        ApiState::new(&config).with_pipeline(Arc::new(unavailable_pipeline(&config)), &config);
    let app = app_with(state);

    let (status, body) = send(&app, post("/cluster_keywords_sync", Some(KEY), gold_request())).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "model_unavailable");
}

async fn poll_until_done(app: &TestApp, task_id: &str) -> Value {
    for _ in 0..300 {
        let (status, body) = send(app, get(&format!("/results/{}", task_id))).await;
        assert_eq!(status, StatusCode::OK);
        match body["status"].as_str() {
            Some("completed") | Some("failed") => return body,
            Some("pending") | Some("in_progress") => {
                assert_eq!(body["message"], "Task is still processing.");
            }
            other => panic!("unexpected status {:?}", other),
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("task {} did not finish", task_id);
}

#[tokio::test]
async fn test_async_submit_and_poll() {
    let app = linked_app();

    let (status, body) = send(&app, post("/cluster_keywords", Some(KEY), gold_request())).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "pending");
    assert!(body["message"].as_str().unwrap().contains("/results/"));
    let task_id = body["task_id"].as_str().unwrap().to_string();

    let done = poll_until_done(&app, &task_id).await;
    assert_eq!(done["status"], "completed");
    assert_eq!(done["progress"], "100%");
    assert_eq!(done["task_id"], task_id.as_str());
    assert_eq!(done["result"]["clusters"]["giá vàng"]["total_volume_topic"], 190);
}

#[tokio::test]
async fn test_async_failure_is_recorded() {
    let config = config();
    let state =
        ApiState::new(&config).with_pipeline(Arc::new(unavailable_pipeline(&config)), &config);
    let app = app_with(state);

    let (status, body) = send(&app, post("/cluster_keywords", Some(KEY), gold_request())).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let task_id = body["task_id"].as_str().unwrap().to_string();

    let done = poll_until_done(&app, &task_id).await;
    assert_eq!(done["status"], "failed");
    assert!(done["error"].as_str().unwrap().contains("model not loaded"));
    assert!(done.get("result").is_none());
}

#[tokio::test]
async fn test_async_rejects_oversized() {
    let app = linked_app();
    let keywords: Vec<Value> = (0..11).map(|i| json!({"text": format!("kw {}", i)})).collect();

    let (status, _) = send(
        &app,
        post("/cluster_keywords", Some(KEY), json!({"keywords": keywords})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_task_not_found() {
    let app = linked_app();
    let (status, body) = send(&app, get("/results/does-not-exist")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Task not found.");
}

#[tokio::test]
async fn test_sync_rate_limit() {
    let mut config = config();
    config.auth.sync_per_minute = 1;
    let state = ApiState::new(&config).with_pipeline(Arc::new(linked_pipeline(&config)), &config);
    let app = app_with(state);

    let (status, _) = send(&app, post("/cluster_keywords_sync", Some(KEY), gold_request())).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, post("/cluster_keywords_sync", Some(KEY), gold_request())).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], "rate_limited");
}
