//! RPC service over a [`KvStore`].
//!
//! This is the only place a [`StoreError`] becomes a gRPC status.

use std::sync::Arc;
use tonic::{Request, Response, Status};
use tracing::{debug, error, info};

use crate::proto::{self, key_value_store_server::KeyValueStore};
use crate::store::{KvStore, StoreError};

/// Confirmation returned by a successful Set
pub const SET_CONFIRMATION: &str = "value stored successfully";
/// Confirmation returned by a successful Delete
pub const DELETE_CONFIRMATION: &str = "key deleted successfully";

pub struct KvService {
    store: Arc<dyn KvStore>,
}

impl KvService {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }
}

/// The service may be reached directly, so it checks keys itself
/// instead of trusting the caller.
fn require_key(key: &str) -> Result<(), Status> {
    if key.is_empty() {
        return Err(Status::invalid_argument(StoreError::EmptyKey.to_string()));
    }
    Ok(())
}

fn to_status(err: StoreError, context: &str) -> Status {
    match err {
        StoreError::EmptyKey => Status::invalid_argument(err.to_string()),
        StoreError::NotFound => Status::not_found(err.to_string()),
        StoreError::Internal(cause) => {
            error!("{}: {}", context, cause);
            Status::internal(format!("{}: {}", context, cause))
        }
    }
}

#[tonic::async_trait]
impl KeyValueStore for KvService {
    async fn set(
        &self,
        request: Request<proto::SetRequest>,
    ) -> Result<Response<proto::SetResponse>, Status> {
        let req = request.into_inner();
        info!("Processing Set key={}", req.key);
        debug!("Set value_len={}", req.value.len());

        require_key(&req.key)?;
        self.store
            .set(&req.key, &req.value)
            .map_err(|e| to_status(e, "failed to store value"))?;

        info!("Stored key={}", req.key);
        Ok(Response::new(proto::SetResponse {
            message: SET_CONFIRMATION.to_string(),
        }))
    }

    async fn get(
        &self,
        request: Request<proto::GetRequest>,
    ) -> Result<Response<proto::GetResponse>, Status> {
        let req = request.into_inner();
        info!("Processing Get key={}", req.key);

        require_key(&req.key)?;
        let value = self
            .store
            .get(&req.key)
            .map_err(|e| to_status(e, "failed to retrieve value"))?;

        info!("Retrieved key={}", req.key);
        Ok(Response::new(proto::GetResponse { value }))
    }

    async fn delete(
        &self,
        request: Request<proto::DeleteRequest>,
    ) -> Result<Response<proto::DeleteResponse>, Status> {
        let req = request.into_inner();
        info!("Processing Delete key={}", req.key);

        require_key(&req.key)?;
        self.store
            .delete(&req.key)
            .map_err(|e| to_status(e, "failed to delete key"))?;

        info!("Deleted key={}", req.key);
        Ok(Response::new(proto::DeleteResponse {
            message: DELETE_CONFIRMATION.to_string(),
        }))
    }
}
