use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use kvstore::config::GatewayArgs;
use kvstore::gateway::client::DEFAULT_DEADLINE;
use kvstore::gateway::{self, GrpcKvClient, KvClient, RequestValidator};
use kvstore::util::{init_logging, shutdown_signal};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GatewayArgs::parse().resolve()?;
    init_logging(&config.log)?;

    info!("Starting REST API server...");

    // both of these are fatal: no backend or no contract means no service
    let client = Arc::new(GrpcKvClient::connect(&config.grpc_addr, DEFAULT_DEADLINE).await?);
    let validator = Arc::new(RequestValidator::load(&config.spec_path)?);

    let app = gateway::router(client.clone(), validator);

    let listener = TcpListener::bind(&config.http_addr).await?;
    info!(
        "OpenAPI spec available at http://{}/openapi.yaml",
        listener.local_addr()?
    );

    gateway::serve(listener, app, async {
        shutdown_signal().await;
        info!("Shutting down REST API server...");
    })
    .await?;

    if let Err(e) = client.close().await {
        warn!("Failed to close gRPC client: {}", e);
    }
    Ok(())
}
