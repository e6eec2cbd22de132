//! Integration Tests for API Endpoints
//!
//! Tests full request/response cycle for each endpoint.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use mini_cache::{api::create_router, AppState, Engine};
use serde_json::Value;
use std::time::Duration;
use tower::ServiceExt;

// == Helper Functions ==

fn create_test_app() -> Router {
    create_router(AppState::new(Engine::new()))
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn store_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/store")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn store_key(app: &Router, body: &str) -> String {
    let response = app.clone().oneshot(store_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    json["key"].as_str().unwrap().to_string()
}

// == STORE Endpoint Tests ==

#[tokio::test]
async fn test_store_endpoint_success() {
    let app = create_test_app();

    let response = app
        .oneshot(store_request(r#"{"value":"test_value"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    let key = json["key"].as_str().unwrap();
    assert_eq!(key.len(), 36, "Keys are hyphenated UUIDs");
    assert!(json["message"].as_str().unwrap().contains(key));
}

#[tokio::test]
async fn test_store_endpoint_with_ttl() {
    let app = create_test_app();

    let response = app
        .oneshot(store_request(r#"{"value":"ttl_value","ttl":60}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_store_endpoint_rejects_non_positive_ttl() {
    let app = create_test_app();

    for body in [r#"{"value":"v","ttl":0}"#, r#"{"value":"v","ttl":-1}"#] {
        let response = app.clone().oneshot(store_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = body_to_json(response.into_body()).await;
        assert!(json["error"].as_str().unwrap().contains("TTL"));
    }

    let stats = app.oneshot(get_request("/stats")).await.unwrap();
    let json = body_to_json(stats.into_body()).await;
    assert_eq!(json["total_entries"], 0);
}

#[tokio::test]
async fn test_store_endpoint_rejects_unsupported_value() {
    let app = create_test_app();

    let response = app
        .oneshot(store_request(r#"{"value":{"nested":true}}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_json_request() {
    let app = create_test_app();

    let response = app.oneshot(store_request("not json")).await.unwrap();

    assert!(response.status().is_client_error());
}

// == GET Endpoint Tests ==

#[tokio::test]
async fn test_get_endpoint_each_kind() {
    let app = create_test_app();

    let cases = [
        (r#"{"value":"hello"}"#, "text", serde_json::json!("hello")),
        (r#"{"value":42}"#, "integer", serde_json::json!(42)),
        (r#"{"value":1.5}"#, "float", serde_json::json!(1.5)),
        (r#"{"value":[104,105]}"#, "bytes", serde_json::json!([104, 105])),
    ];

    for (body, kind, value) in cases {
        let key = store_key(&app, body).await;

        let response = app
            .clone()
            .oneshot(get_request(&format!("/get/{}", key)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_to_json(response.into_body()).await;
        assert_eq!(json["key"].as_str().unwrap(), key);
        assert_eq!(json["kind"], kind);
        assert_eq!(json["value"], value);
    }
}

#[tokio::test]
async fn test_get_endpoint_not_found() {
    let app = create_test_app();

    let response = app.oneshot(get_request("/get/missing")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].as_str().unwrap().contains("missing"));
}

// == DELETE Endpoint Tests ==

#[tokio::test]
async fn test_delete_endpoint_success() {
    let app = create_test_app();
    let key = store_key(&app, r#"{"value":"doomed"}"#).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/del/{}", key))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(get_request(&format!("/get/{}", key)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_endpoint_not_found() {
    let app = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/del/nonexistent")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// == FLUSH Endpoint Tests ==

#[tokio::test]
async fn test_flush_endpoint() {
    let app = create_test_app();
    let first = store_key(&app, r#"{"value":"a"}"#).await;
    let second = store_key(&app, r#"{"value":"b"}"#).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/flush")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["removed"], 2);

    for key in [first, second] {
        let response = app
            .clone()
            .oneshot(get_request(&format!("/get/{}", key)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

// == REPLAY Endpoint Tests ==

#[tokio::test]
async fn test_replay_endpoint_lists_store_calls() {
    let app = create_test_app();
    let key = store_key(&app, r#"{"value":"first"}"#).await;
    let _ = app
        .clone()
        .oneshot(store_request(r#"{"value":2,"ttl":0}"#))
        .await
        .unwrap();

    let response = app.oneshot(get_request("/replay/store")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["name"], "store");
    // The rejected TTL fails before the engine is called
    assert_eq!(json["count"], 1);
    assert_eq!(json["history"][0]["input"], "\"first\"");
    assert_eq!(json["history"][0]["output"]["status"], "ok");
    assert_eq!(json["history"][0]["output"]["value"], format!("\"{}\"", key));
}

// == STATS Endpoint Tests ==

#[tokio::test]
async fn test_stats_endpoint() {
    let app = create_test_app();
    let key = store_key(&app, r#"{"value":"v"}"#).await;

    let _ = app
        .clone()
        .oneshot(get_request(&format!("/get/{}", key)))
        .await
        .unwrap();
    let _ = app.clone().oneshot(get_request("/get/missing")).await.unwrap();

    let response = app.oneshot(get_request("/stats")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["hits"], 1);
    assert_eq!(json["misses"], 1);
    assert_eq!(json["total_entries"], 1);
    assert_eq!(json["hit_rate"], 0.5);
}

// == HEALTH Endpoint Tests ==

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app();

    let response = app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], "healthy");
    assert!(json.get("timestamp").is_some());
}

// == TTL Tests ==

#[tokio::test]
async fn test_ttl_expiration_via_api() {
    let engine = Engine::new();
    let app = create_router(AppState::new(engine.clone()));

    // The API takes whole seconds, so go through the engine for a short TTL
    let key = engine
        .store("short", Some(Duration::from_millis(100)))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(get_request(&format!("/get/{}", key)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    tokio::time::sleep(Duration::from_millis(200)).await;

    let response = app
        .oneshot(get_request(&format!("/get/{}", key)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_closed_engine_rejects_store() {
    let engine = Engine::new();
    let app = create_router(AppState::new(engine.clone()));
    engine.close().await;

    let response = app
        .oneshot(store_request(r#"{"value":"late"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
