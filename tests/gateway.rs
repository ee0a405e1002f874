//! Gateway behaviour against an in-memory backend double.

mod common;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::json;
use std::sync::Arc;
use tonic::Status;
use tower::ServiceExt;

use common::{CONTRACT, MockKvClient, send};
use kvstore::gateway::{self, RequestValidator};

fn validated_app(client: MockKvClient) -> Router {
    let validator = RequestValidator::from_yaml(CONTRACT.to_string()).unwrap();
    gateway::router(Arc::new(client), Arc::new(validator))
}

fn plain_app() -> Router {
    gateway::routes(Arc::new(MockKvClient::new()))
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = validated_app(MockKvClient::new());
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "healthy"}));
}

#[tokio::test]
async fn test_set_and_get_flow() {
    let app = validated_app(MockKvClient::new());

    let (status, body) = send(
        &app,
        "POST",
        "/kv",
        Some(r#"{"key":"username","value":"alice"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, json!({"message": "Key-value pair stored successfully"}));

    let (status, body) = send(&app, "GET", "/kv/username", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"key": "username", "value": "alice"}));
}

#[tokio::test]
async fn test_get_missing_key() {
    let app = validated_app(MockKvClient::new());
    let (status, body) = send(&app, "GET", "/kv/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "key not found"}));
}

#[tokio::test]
async fn test_empty_key_rejected() {
    for app in [validated_app(MockKvClient::new()), plain_app()] {
        let (status, body) = send(&app, "POST", "/kv", Some(r#"{"key":"","value":"x"}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }
}

#[tokio::test]
async fn test_delete_flow() {
    let app = validated_app(MockKvClient::new());

    let (status, _) = send(&app, "POST", "/kv", Some(r#"{"key":"temp","value":"data"}"#)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, "DELETE", "/kv/temp", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"message": "Key deleted successfully"}));

    let (status, _) = send(&app, "GET", "/kv/temp", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "DELETE", "/kv/temp", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_json_rejected() {
    let app = validated_app(MockKvClient::new());
    let (status, body) = send(&app, "POST", "/kv", Some("{invalid json}")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = body["error"].as_str().unwrap();
    assert!(message.starts_with("Request validation failed"));
}

#[tokio::test]
async fn test_malformed_json_without_validation() {
    let app = plain_app();
    let (status, body) = send(&app, "POST", "/kv", Some("{invalid json}")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Invalid request body"}));
}

#[tokio::test]
async fn test_schema_violation_short_circuits() {
    let app = validated_app(MockKvClient::new());

    // value has the wrong type, so the handler never runs
    let (status, body) = send(&app, "POST", "/kv", Some(r#"{"key":"k","value":42}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("/value"));

    let (status, _) = send(&app, "GET", "/kv/k", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_missing_value_field() {
    // the contract requires `value`; without validation it defaults to ""
    let app = validated_app(MockKvClient::new());
    let (status, _) = send(&app, "POST", "/kv", Some(r#"{"key":"k"}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let app = plain_app();
    let (status, _) = send(&app, "POST", "/kv", Some(r#"{"key":"k"}"#)).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = send(&app, "GET", "/kv/k", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["value"], "");
}

#[tokio::test]
async fn test_multiple_keys() {
    let app = validated_app(MockKvClient::new());

    for (key, value) in [("user:1", "alice"), ("user:2", "bob"), ("user:3", "charlie")] {
        let body = json!({"key": key, "value": value}).to_string();
        let (status, _) = send(&app, "POST", "/kv", Some(&body)).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = send(&app, "GET", "/kv/user:2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["value"], "bob");
}

#[tokio::test]
async fn test_overwrite_returns_latest() {
    let app = validated_app(MockKvClient::new());
    send(&app, "POST", "/kv", Some(r#"{"key":"k","value":"v1"}"#)).await;
    send(&app, "POST", "/kv", Some(r#"{"key":"k","value":"v2"}"#)).await;
    let (_, body) = send(&app, "GET", "/kv/k", None).await;
    assert_eq!(body["value"], "v2");
}

#[tokio::test]
async fn test_backend_status_mapping() {
    let cases = [
        (Status::already_exists("exists"), StatusCode::CONFLICT, "exists"),
        (Status::permission_denied("nope"), StatusCode::FORBIDDEN, "nope"),
        (Status::unauthenticated("who"), StatusCode::UNAUTHORIZED, "who"),
        (
            Status::internal("failed to retrieve value: lock poisoned"),
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
        ),
        (
            Status::deadline_exceeded("Get did not complete within 5s"),
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
        ),
        (
            Status::unavailable("connection refused"),
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
        ),
    ];

    for (backend_status, expected, message) in cases {
        let app = validated_app(MockKvClient::failing(backend_status));
        let (status, body) = send(&app, "GET", "/kv/anything", None).await;
        assert_eq!(status, expected);
        assert_eq!(body, json!({"error": message}));
    }
}

#[tokio::test]
async fn test_unknown_route_passes_validation() {
    let app = validated_app(MockKvClient::new());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/not-in-contract")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    // reaches the router's own fallback rather than a validation error
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_wrong_content_type_rejected() {
    let app = validated_app(MockKvClient::new());
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/kv")
                .header(header::CONTENT_TYPE, "text/plain")
                .body(Body::from(r#"{"key":"k","value":"v"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_contract_document_served() {
    let app = validated_app(MockKvClient::new());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/openapi.yaml")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/yaml"
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(bytes, CONTRACT.as_bytes());
}

#[tokio::test]
async fn test_large_value_round_trip() {
    let value = "x".repeat(3 * 1024 * 1024);
    let body = json!({"key": "big", "value": value}).to_string();

    for app in [validated_app(MockKvClient::new()), plain_app()] {
        let (status, _) = send(&app, "POST", "/kv", Some(&body)).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(&app, "GET", "/kv/big", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["value"].as_str().map(str::len), Some(value.len()));
    }
}

#[tokio::test]
async fn test_undecodable_path_key_gets_json_error() {
    let app = plain_app();
    for method in ["GET", "DELETE"] {
        let (status, body) = send(&app, method, "/kv/%FF", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "Invalid key in request path"}));
    }

    let app = validated_app(MockKvClient::new());
    let (status, body) = send(&app, "GET", "/kv/%FF", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        body["error"]
            .as_str()
            .unwrap()
            .starts_with("Request validation failed")
    );
}

#[tokio::test]
async fn test_encoded_path_key_is_decoded() {
    let app = validated_app(MockKvClient::new());
    send(&app, "POST", "/kv", Some(r#"{"key":"a b","value":"spaced"}"#)).await;
    let (status, body) = send(&app, "GET", "/kv/a%20b", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"key": "a b", "value": "spaced"}));
}
