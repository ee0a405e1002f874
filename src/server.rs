use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tracing::info;

use crate::proto::key_value_store_server::KeyValueStoreServer;
use crate::store::KvStore;

mod service;

pub use service::{DELETE_CONFIRMATION, KvService, SET_CONFIRMATION};

/// Default gRPC listening port
pub const DEFAULT_PORT: u16 = 50051;

/// gRPC server hosting the key-value service
pub struct RpcServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    store: Arc<dyn KvStore>,
}

impl RpcServer {
    /// Bind the server to the specified address
    pub async fn bind(addr: &str, store: Arc<dyn KvStore>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("gRPC server bound to {}", local_addr);

        Ok(Self {
            listener,
            local_addr,
            store,
        })
    }

    /// Get local listening address
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve requests until `shutdown` resolves.
    ///
    /// Once the signal fires no new connections are accepted; in-flight
    /// calls are allowed to finish before this returns.
    pub async fn run<F>(self, shutdown: F) -> Result<(), tonic::transport::Error>
    where
        F: Future<Output = ()> + Send,
    {
        info!("gRPC server started, listening on {}", self.local_addr);

        let service = KeyValueStoreServer::new(KvService::new(self.store))
            .max_decoding_message_size(usize::MAX)
            .max_encoding_message_size(usize::MAX);
        let result = Server::builder()
            .add_service(service)
            .serve_with_incoming_shutdown(TcpListenerStream::new(self.listener), shutdown)
            .await;

        info!("gRPC server stopped");
        result
    }
}
