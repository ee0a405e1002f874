//! Backend capability used by the gateway handlers.
//!
//! Handlers only see [`KvClient`]; [`GrpcKvClient`] is the production
//! implementation talking to kvstore-server.

use async_trait::async_trait;
use std::future::Future;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tonic::transport::{Channel, Endpoint};
use tonic::{Code, Request, Response, Status};
use tracing::{info, warn};

use crate::proto::{self, key_value_store_client::KeyValueStoreClient};

/// Deadline applied to every backend call
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(5);

/// Time allowed to establish the backend connection at startup
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[async_trait]
pub trait KvClient: Send + Sync {
    async fn set(&self, key: &str, value: &str) -> Result<(), Status>;

    async fn get(&self, key: &str) -> Result<String, Status>;

    async fn delete(&self, key: &str) -> Result<(), Status>;

    /// Release the backend connection. Later calls fail.
    async fn close(&self) -> Result<(), Status>;
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid backend address '{addr}': {reason}")]
    InvalidEndpoint { addr: String, reason: String },

    #[error("failed to connect to gRPC server at {addr}: {source}")]
    Connect {
        addr: String,
        source: tonic::transport::Error,
    },
}

/// [`KvClient`] over a tonic channel
pub struct GrpcKvClient {
    /// `None` once closed; dropping it releases the channel
    client: RwLock<Option<KeyValueStoreClient<Channel>>>,
    deadline: Duration,
}

impl GrpcKvClient {
    /// Connect eagerly so an unreachable backend is reported at startup.
    pub async fn connect(addr: &str, deadline: Duration) -> Result<Self, ClientError> {
        let uri = if addr.contains("://") {
            addr.to_string()
        } else {
            format!("http://{}", addr)
        };

        let endpoint = Endpoint::from_shared(uri.clone())
            .map_err(|e| ClientError::InvalidEndpoint {
                addr: addr.to_string(),
                reason: e.to_string(),
            })?
            .connect_timeout(CONNECT_TIMEOUT);

        let channel = endpoint
            .connect()
            .await
            .map_err(|source| ClientError::Connect { addr: uri, source })?;

        info!("Connected to gRPC server at {}", addr);
        Ok(Self::from_channel(channel, deadline))
    }

    pub fn from_channel(channel: Channel, deadline: Duration) -> Self {
        // values carry no size limit
        let client = KeyValueStoreClient::new(channel)
            .max_decoding_message_size(usize::MAX)
            .max_encoding_message_size(usize::MAX);
        Self {
            client: RwLock::new(Some(client)),
            deadline,
        }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    pub fn is_closed(&self) -> bool {
        self.client.read().map(|c| c.is_none()).unwrap_or(true)
    }

    /// A handle on the open channel, or `Unavailable` after `close`
    fn client(&self) -> Result<KeyValueStoreClient<Channel>, Status> {
        let guard = self
            .client
            .read()
            .map_err(|_| Status::internal("client lock poisoned"))?;
        guard
            .clone()
            .ok_or_else(|| Status::unavailable("client is closed"))
    }

    /// Attach the deadline so the server sees it as `grpc-timeout`.
    fn request<T>(&self, message: T) -> Request<T> {
        let mut request = Request::new(message);
        request.set_timeout(self.deadline);
        request
    }

    /// Run one backend call, giving up once the deadline passes.
    ///
    /// The server cancels its side when the same deadline expires there; that
    /// cancellation is reported as `DeadlineExceeded` too.
    async fn call<T, F>(&self, op: &str, fut: F) -> Result<T, Status>
    where
        F: Future<Output = Result<Response<T>, Status>>,
    {
        let started = Instant::now();
        match tokio::time::timeout(self.deadline, fut).await {
            Ok(Ok(response)) => Ok(response.into_inner()),
            Ok(Err(status))
                if status.code() == Code::Cancelled && started.elapsed() >= self.deadline =>
            {
                Err(self.expired(op))
            }
            Ok(Err(status)) => Err(status),
            Err(_) => Err(self.expired(op)),
        }
    }

    fn expired(&self, op: &str) -> Status {
        warn!("{} exceeded deadline of {:?}", op, self.deadline);
        Status::deadline_exceeded(format!(
            "{} did not complete within {:?}",
            op, self.deadline
        ))
    }
}

#[async_trait]
impl KvClient for GrpcKvClient {
    async fn set(&self, key: &str, value: &str) -> Result<(), Status> {
        let mut client = self.client()?;
        let request = self.request(proto::SetRequest {
            key: key.to_string(),
            value: value.to_string(),
        });
        self.call("Set", client.set(request)).await.map(|_| ())
    }

    async fn get(&self, key: &str) -> Result<String, Status> {
        let mut client = self.client()?;
        let request = self.request(proto::GetRequest {
            key: key.to_string(),
        });
        let resp = self.call("Get", client.get(request)).await?;
        Ok(resp.value)
    }

    async fn delete(&self, key: &str) -> Result<(), Status> {
        let mut client = self.client()?;
        let request = self.request(proto::DeleteRequest {
            key: key.to_string(),
        });
        self.call("Delete", client.delete(request)).await.map(|_| ())
    }

    async fn close(&self) -> Result<(), Status> {
        let taken = self
            .client
            .write()
            .map_err(|_| Status::internal("client lock poisoned"))?
            .take();
        if taken.is_some() {
            info!("Closing gRPC client");
        }
        Ok(())
    }
}
