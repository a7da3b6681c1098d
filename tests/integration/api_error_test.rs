//! API error responses rendered through a router
//!
//! Handlers return `ApiError` (or the common `Error`) and the test checks the
//! status, headers and JSON body a client would see.

#![allow(dead_code)]

mod common;

use axum::{
    body::Body,
    http::{header, HeaderValue, Method, Request, StatusCode},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use mucts_common::{api_error, ApiError, Error, MessageBag};

use crate::common::body_json;

async fn validate_handler() -> Result<Json<Value>, ApiError> {
    let errors = MessageBag::new()
        .with("email", "The email field is required.")
        .with("email", "The email must be a valid email address.")
        .with("name", "The name field is required.");
    api_error(42201, "The given data was invalid.", Some(errors))
}

async fn missing_handler() -> Result<Json<Value>, Error> {
    Err(Error::NotFound("Order 17".to_string()))
}

async fn throttled_handler() -> Result<Json<Value>, ApiError> {
    Err(ApiError::new(429).with_header(header::RETRY_AFTER, HeaderValue::from_static("30")))
}

async fn broken_handler() -> Result<Json<Value>, ApiError> {
    Err(ApiError::internal().with_source(std::io::Error::other("disk full")))
}

async fn ok_handler() -> Result<Json<Value>, ApiError> {
    Ok(Json(json!({ "ok": true })))
}

fn router() -> Router {
    Router::new()
        .route("/validate", get(validate_handler))
        .route("/missing", get(missing_handler))
        .route("/throttled", get(throttled_handler))
        .route("/broken", get(broken_handler))
        .route("/ok", get(ok_handler))
}

fn request(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_validation_error_keeps_sub_code_and_fields() {
    let response = router().oneshot(request("/validate")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], 42201);
    assert_eq!(body["error"]["message"], "The given data was invalid.");

    let errors = body["error"]["errors"].as_object().unwrap();
    let keys: Vec<&str> = errors.keys().map(String::as_str).collect();
    assert_eq!(keys, ["email", "name"]);
    assert_eq!(errors["email"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_common_error_maps_to_status() {
    let response = router().oneshot(request("/missing")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], 404);
    assert_eq!(body["error"]["message"], "Not found: Order 17");
    assert!(body["error"].get("errors").is_none());
}

#[tokio::test]
async fn test_extra_headers_are_sent() {
    let response = router().oneshot(request("/throttled")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()[header::RETRY_AFTER], "30");

    let body = body_json(response).await;
    assert_eq!(body["error"]["message"], "Too Many Requests");
}

#[tokio::test]
async fn test_server_error_hides_source() {
    let response = router().oneshot(request("/broken")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = body_json(response).await;
    assert_eq!(body["error"]["message"], "Internal Server Error");
    assert!(!body.to_string().contains("disk full"));
}

#[tokio::test]
async fn test_success_passes_through() {
    let response = router().oneshot(request("/ok")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "ok": true }));
}
