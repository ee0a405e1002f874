use clap::Parser;
use std::sync::Arc;
use tracing::info;

use kvstore::config::ServerArgs;
use kvstore::server::RpcServer;
use kvstore::store::MemoryStore;
use kvstore::util::{init_logging, shutdown_signal};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerArgs::parse().resolve()?;
    init_logging(&config.log)?;

    info!("Starting kvstore-server");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let store = Arc::new(MemoryStore::new());
    let server = RpcServer::bind(&config.listen_addr, store).await?;
    info!("gRPC server is now listening on {}", server.local_addr());

    server
        .run(async {
            shutdown_signal().await;
            info!("Shutting down gRPC server...");
        })
        .await?;

    Ok(())
}
