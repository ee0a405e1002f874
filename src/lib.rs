//! In-memory key-value storage behind a gRPC service and a JSON/HTTP gateway.
//!
//! - [`store`]: the concurrency-safe map
//! - [`server`]: the gRPC service translating store errors into status codes
//! - [`gateway`]: HTTP handlers, contract validation and the backend client

pub mod config;
pub mod gateway;
pub mod proto;
pub mod server;
pub mod store;
pub mod util;
