//! Request validation against the loaded contract, and the axum middleware
//! that applies it in front of the gateway handlers.

use axum::Json;
use axum::body::{Body, Bytes};
use axum::extract::{Query, Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::contract::{
    Contract, ContractError, Parameter, ParameterLocation, RouteMatch, decode_segment,
};
use super::schema::{SchemaType, SchemaViolation};
use crate::gateway::handler::ErrorResponse;

/// Ways a request can violate the contract
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{location} parameter '{name}' is required")]
    MissingParameter {
        name: String,
        location: ParameterLocation,
    },

    #[error("{location} parameter '{name}' is not valid percent-encoded UTF-8")]
    MalformedParameter {
        name: String,
        location: ParameterLocation,
    },

    #[error("{location} parameter '{name}' is invalid: {violation}")]
    InvalidParameter {
        name: String,
        location: ParameterLocation,
        violation: SchemaViolation,
    },

    #[error("request body is required")]
    MissingBody,

    #[error("missing Content-Type header")]
    MissingContentType,

    #[error("content type '{0}' is not declared for this operation")]
    UnsupportedContentType(String),

    #[error("request body is not valid JSON: {0}")]
    MalformedBody(String),

    #[error("request body is invalid: {0}")]
    InvalidBody(SchemaViolation),

    #[error("request body could not be read: {0}")]
    UnreadableBody(String),
}

/// Checks inbound requests against the contract loaded at startup
#[derive(Debug)]
pub struct RequestValidator {
    contract: Contract,
    raw: String,
}

impl RequestValidator {
    /// Load the contract at `path`; failure here is fatal for the gateway
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ContractError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ContractError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let validator = Self::from_yaml(raw)?;
        info!(
            "OpenAPI {} contract '{}' loaded and validated from {}",
            validator.contract.version(),
            validator.contract.title(),
            path.display()
        );
        Ok(validator)
    }

    pub fn from_yaml(raw: String) -> Result<Self, ContractError> {
        let contract = Contract::from_yaml(&raw)?;
        Ok(Self { contract, raw })
    }

    /// The contract document exactly as it was loaded
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn contract(&self) -> &Contract {
        &self.contract
    }

    /// Check path, query and header parameters of a matched request.
    pub fn check_parameters(
        &self,
        route: &RouteMatch<'_>,
        query: &HashMap<String, String>,
        headers: &HeaderMap,
    ) -> Result<(), ValidationError> {
        for param in &route.parameters {
            let raw = match param.location {
                ParameterLocation::Path => match route.path_params.get(&param.name) {
                    Some(raw) => Some(decode_segment(raw).ok_or_else(|| {
                        ValidationError::MalformedParameter {
                            name: param.name.clone(),
                            location: param.location,
                        }
                    })?),
                    None => None,
                },
                ParameterLocation::Query => query.get(&param.name).cloned(),
                ParameterLocation::Header => headers
                    .get(param.name.as_str())
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string),
                // cookies are not part of this API
                ParameterLocation::Cookie => continue,
            };

            match raw {
                None if param.required => {
                    return Err(ValidationError::MissingParameter {
                        name: param.name.clone(),
                        location: param.location,
                    });
                }
                None => {}
                Some(raw) => self.check_parameter(param, &raw)?,
            }
        }
        Ok(())
    }

    fn check_parameter(&self, param: &Parameter, raw: &str) -> Result<(), ValidationError> {
        let Some(schema) = &param.schema else {
            return Ok(());
        };
        let invalid = |violation| ValidationError::InvalidParameter {
            name: param.name.clone(),
            location: param.location,
            violation,
        };

        let resolved = schema
            .resolve(self.contract.schemas())
            .map_err(|r| invalid(SchemaViolation {
                pointer: "/".to_string(),
                reason: format!("unresolvable schema reference {}", r),
            }))?;
        let value = coerce_parameter(raw, resolved.kind);
        schema
            .validate(&value, self.contract.schemas())
            .map_err(invalid)
    }

    /// Check the request body of a matched request.
    pub fn check_body(
        &self,
        route: &RouteMatch<'_>,
        content_type: Option<&str>,
        body: &[u8],
    ) -> Result<(), ValidationError> {
        let Some(spec) = &route.operation.request_body else {
            return Ok(());
        };

        if body.is_empty() {
            return if spec.required {
                Err(ValidationError::MissingBody)
            } else {
                Ok(())
            };
        }

        if spec.content.is_empty() {
            return Ok(());
        }

        let media = content_type
            .map(|ct| ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
            .ok_or(ValidationError::MissingContentType)?;
        let declared = spec
            .content
            .get(&media)
            .or_else(|| spec.content.get("*/*"))
            .ok_or_else(|| ValidationError::UnsupportedContentType(media.clone()))?;

        if !is_json(&media) {
            return Ok(());
        }

        let value: Value = serde_json::from_slice(body)
            .map_err(|e| ValidationError::MalformedBody(e.to_string()))?;
        match &declared.schema {
            Some(schema) => schema
                .validate(&value, self.contract.schemas())
                .map_err(ValidationError::InvalidBody),
            None => Ok(()),
        }
    }
}

fn is_json(media: &str) -> bool {
    media == "application/json" || media.ends_with("+json")
}

/// Parameters arrive as text; read them as the type the schema declares
/// so that type and range checks apply. Text that does not parse stays a
/// string and fails the type check.
fn coerce_parameter(raw: &str, kind: Option<SchemaType>) -> Value {
    let parsed = match kind {
        Some(SchemaType::Integer) => raw.parse::<i64>().ok().map(Value::from),
        Some(SchemaType::Number) => raw.parse::<f64>().ok().map(Value::from),
        Some(SchemaType::Boolean) => raw.parse::<bool>().ok().map(Value::from),
        _ => None,
    };
    parsed.unwrap_or_else(|| Value::String(raw.to_string()))
}

fn reject(err: ValidationError) -> Response {
    warn!("Validation error: {}", err);
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: format!("Request validation failed: {}", err),
        }),
    )
        .into_response()
}

/// Middleware: reject requests that break the contract, pass everything else.
///
/// Requests that match no declared route are forwarded untouched.
pub async fn validate_request(
    State(validator): State<Arc<RequestValidator>>,
    request: Request,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();

    let Some(route) = validator.contract.find_route(&parts.method, parts.uri.path()) else {
        debug!("No contract route for {} {}", parts.method, parts.uri.path());
        return next.run(Request::from_parts(parts, body)).await;
    };

    let query = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
        .map(|Query(q)| q)
        .unwrap_or_default();
    if let Err(e) = validator.check_parameters(&route, &query, &parts.headers) {
        return reject(e);
    }

    let body = if route.operation.request_body.is_some() {
        let bytes: Bytes = match axum::body::to_bytes(body, usize::MAX).await {
            Ok(bytes) => bytes,
            Err(e) => return reject(ValidationError::UnreadableBody(e.to_string())),
        };
        let content_type = parts
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok());
        if let Err(e) = validator.check_body(&route, content_type, &bytes) {
            return reject(e);
        }
        Body::from(bytes)
    } else {
        body
    };

    next.run(Request::from_parts(parts, body)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, Method};

    const CONTRACT: &str = include_str!("../../../contracts/openapi.yaml");

    fn validator() -> RequestValidator {
        RequestValidator::from_yaml(CONTRACT.to_string()).unwrap()
    }

    #[test]
    fn test_raw_document_kept() {
        assert_eq!(validator().raw(), CONTRACT);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("openapi.yaml");
        std::fs::write(&path, CONTRACT).unwrap();
        let v = RequestValidator::load(&path).unwrap();
        assert_eq!(v.raw(), CONTRACT);

        assert!(matches!(
            RequestValidator::load(dir.path().join("missing.yaml")),
            Err(ContractError::Read { .. })
        ));
    }

    #[test]
    fn test_path_parameter_encoding() {
        let v = validator();
        let route = v.contract().find_route(&Method::GET, "/kv/a%20b").unwrap();
        v.check_parameters(&route, &HashMap::new(), &HeaderMap::new())
            .unwrap();

        let route = v.contract().find_route(&Method::GET, "/kv/%FF").unwrap();
        assert_eq!(
            v.check_parameters(&route, &HashMap::new(), &HeaderMap::new()),
            Err(ValidationError::MalformedParameter {
                name: "key".to_string(),
                location: ParameterLocation::Path,
            })
        );
    }

    #[test]
    fn test_valid_set_body() {
        let v = validator();
        let route = v.contract().find_route(&Method::POST, "/kv").unwrap();
        v.check_body(
            &route,
            Some("application/json; charset=utf-8"),
            br#"{"key":"a","value":"b"}"#,
        )
        .unwrap();
    }

    #[test]
    fn test_body_errors() {
        let v = validator();
        let route = v.contract().find_route(&Method::POST, "/kv").unwrap();

        assert_eq!(
            v.check_body(&route, Some("application/json"), b""),
            Err(ValidationError::MissingBody)
        );
        assert_eq!(
            v.check_body(&route, None, b"{}"),
            Err(ValidationError::MissingContentType)
        );
        assert_eq!(
            v.check_body(&route, Some("text/plain"), b"hi"),
            Err(ValidationError::UnsupportedContentType("text/plain".to_string()))
        );
        assert!(matches!(
            v.check_body(&route, Some("application/json"), b"{invalid json}"),
            Err(ValidationError::MalformedBody(_))
        ));
        assert!(matches!(
            v.check_body(&route, Some("application/json"), br#"{"key":"a"}"#),
            Err(ValidationError::InvalidBody(_))
        ));
    }

    #[test]
    fn test_path_parameter_min_length() {
        let v = validator();
        let mut route = v.contract().find_route(&Method::GET, "/kv/x").unwrap();
        v.check_parameters(&route, &HashMap::new(), &HeaderMap::new())
            .unwrap();

        route.path_params.insert("key".to_string(), String::new());
        let err = v
            .check_parameters(&route, &HashMap::new(), &HeaderMap::new())
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidParameter { .. }));
    }

    #[test]
    fn test_query_and_header_parameters() {
        let yaml = r#"
openapi: 3.0.0
info: {title: t}
paths:
  /items:
    get:
      parameters:
        - {name: limit, in: query, required: true, schema: {type: integer, maximum: 100}}
        - {name: x-trace, in: header, schema: {type: string, minLength: 4}}
"#;
        let v = RequestValidator::from_yaml(yaml.to_string()).unwrap();
        let route = v.contract().find_route(&Method::GET, "/items").unwrap();
        let mut query = HashMap::new();
        let mut headers = HeaderMap::new();

        assert!(matches!(
            v.check_parameters(&route, &query, &headers),
            Err(ValidationError::MissingParameter { .. })
        ));

        query.insert("limit".to_string(), "ten".to_string());
        assert!(v.check_parameters(&route, &query, &headers).is_err());

        query.insert("limit".to_string(), "500".to_string());
        assert!(v.check_parameters(&route, &query, &headers).is_err());

        query.insert("limit".to_string(), "10".to_string());
        v.check_parameters(&route, &query, &headers).unwrap();

        headers.insert("x-trace", HeaderValue::from_static("ab"));
        assert!(v.check_parameters(&route, &query, &headers).is_err());
    }

    #[test]
    fn test_error_message_shape() {
        let err = ValidationError::MissingParameter {
            name: "limit".to_string(),
            location: ParameterLocation::Query,
        };
        assert_eq!(err.to_string(), "query parameter 'limit' is required");
    }
}
