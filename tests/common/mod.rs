//! Shared helpers for the gateway integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use tonic::Status;
use tower::ServiceExt;

use kvstore::gateway::KvClient;

pub const CONTRACT: &str = include_str!("../../contracts/openapi.yaml");

/// In-memory stand-in for the gRPC backend
#[derive(Default)]
pub struct MockKvClient {
    store: Mutex<HashMap<String, String>>,
    /// When set, every call fails with this status
    pub fail_with: Mutex<Option<Status>>,
}

impl MockKvClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(status: Status) -> Self {
        let client = Self::default();
        *client.fail_with.lock().unwrap() = Some(status);
        client
    }

    fn check(&self, key: &str) -> Result<(), Status> {
        if let Some(status) = self.fail_with.lock().unwrap().clone() {
            return Err(status);
        }
        if key.is_empty() {
            return Err(Status::invalid_argument("key cannot be empty"));
        }
        Ok(())
    }
}

#[async_trait]
impl KvClient for MockKvClient {
    async fn set(&self, key: &str, value: &str) -> Result<(), Status> {
        self.check(key)?;
        self.store
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<String, Status> {
        self.check(key)?;
        self.store
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| Status::not_found("key not found"))
    }

    async fn delete(&self, key: &str) -> Result<(), Status> {
        self.check(key)?;
        match self.store.lock().unwrap().remove(key) {
            Some(_) => Ok(()),
            None => Err(Status::not_found("key not found")),
        }
    }

    async fn close(&self) -> Result<(), Status> {
        Ok(())
    }
}

/// Send one request through the router, returning status and parsed body
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(b) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(b.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::String(
            String::from_utf8_lossy(&bytes).into_owned(),
        ))
    };
    (status, value)
}
