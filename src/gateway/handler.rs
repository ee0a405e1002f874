use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::client::KvClient;
use super::validation::RequestValidator;

/// State shared by the key-value handlers
#[derive(Clone)]
pub struct AppState {
    pub client: Arc<dyn KvClient>,
}

#[derive(Debug, Deserialize)]
pub struct SetRequest {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct GetResponse {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct SuccessResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
}

/// Map a backend status code onto an HTTP status
pub fn http_status(code: tonic::Code) -> StatusCode {
    match code {
        tonic::Code::NotFound => StatusCode::NOT_FOUND,
        tonic::Code::InvalidArgument => StatusCode::BAD_REQUEST,
        tonic::Code::AlreadyExists => StatusCode::CONFLICT,
        tonic::Code::PermissionDenied => StatusCode::FORBIDDEN,
        tonic::Code::Unauthenticated => StatusCode::UNAUTHORIZED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Error response carrying `{error: <message>}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<tonic::Status> for ApiError {
    fn from(st: tonic::Status) -> Self {
        let status = http_status(st.code());
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            // the cause stays in the log
            error!("Backend call failed: {:?}: {}", st.code(), st.message());
            return Self {
                status,
                message: "Internal server error".to_string(),
            };
        }
        Self {
            status,
            message: st.message().to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

fn success(status: StatusCode, message: &str) -> (StatusCode, Json<SuccessResponse>) {
    (
        status,
        Json(SuccessResponse {
            message: message.to_string(),
        }),
    )
}

/// Key from the URL path. Rejections become JSON errors like every other failure.
fn path_key(path: Result<Path<String>, PathRejection>) -> Result<String, ApiError> {
    let Path(key) = path.map_err(|rejection| {
        warn!("Rejecting request path: {}", rejection.body_text());
        ApiError::bad_request("Invalid key in request path")
    })?;
    if key.is_empty() {
        return Err(ApiError::bad_request("Key cannot be empty"));
    }
    Ok(key)
}

/// POST /kv
///
/// The body is decoded here rather than by the `Json` extractor so that
/// every decoding failure gets the same JSON error shape.
pub async fn set_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<SuccessResponse>), ApiError> {
    let req: SetRequest = serde_json::from_slice(&body).map_err(|e| {
        warn!("Rejecting malformed body: {}", e);
        ApiError::bad_request("Invalid request body")
    })?;

    if req.key.is_empty() {
        return Err(ApiError::bad_request("Key cannot be empty"));
    }

    info!("REST API: Setting key={}", req.key);
    state.client.set(&req.key, &req.value).await?;

    Ok(success(
        StatusCode::CREATED,
        "Key-value pair stored successfully",
    ))
}

/// GET /kv/:key
pub async fn get_handler(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<GetResponse>, ApiError> {
    let key = path_key(path)?;

    info!("REST API: Getting key={}", key);
    let value = state.client.get(&key).await?;

    Ok(Json(GetResponse { key, value }))
}

/// DELETE /kv/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<(StatusCode, Json<SuccessResponse>), ApiError> {
    let key = path_key(path)?;

    info!("REST API: Deleting key={}", key);
    state.client.delete(&key).await?;

    Ok(success(StatusCode::OK, "Key deleted successfully"))
}

/// GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

/// GET /openapi.yaml
pub async fn contract_handler(State(validator): State<Arc<RequestValidator>>) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/yaml")],
        validator.raw().to_string(),
    )
        .into_response()
}
