pub mod api;
pub mod config;
pub mod error;
pub mod logic;
pub mod model;
pub mod store;

/// Messages and service stubs generated from `proto/ensembl_metadata.proto`
pub mod proto {
    tonic::include_proto!("ensembl_metadata");
}

// Export API types
pub use api::{create_router, MetadataService};

pub use config::AppConfig;
pub use error::MetadataError;

// Export all model types
pub use model::*;

// Export store types
pub use store::{MetadataStore, MySqlStore};

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;

/// Serve the gRPC lookup service and the HTTP health endpoint until Ctrl-C
pub async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    let store = Arc::new(MySqlStore::new(&config).await?);
    let service = MetadataService::new(store, &config);

    let health_address = config.health_address();
    let listener = TcpListener::bind(&health_address)
        .await
        .with_context(|| format!("Failed to bind health endpoint on {health_address}"))?;
    log::info!("Health endpoint running on http://{health_address}/health");
    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, create_router()).await {
            log::error!("Health endpoint stopped: {err}");
        }
    });

    let grpc_address: SocketAddr = config
        .server_address()
        .parse()
        .with_context(|| format!("Invalid gRPC bind address {}", config.server_address()))?;
    log::info!("Ensembl metadata gRPC server listening on {grpc_address}");

    tonic::transport::Server::builder()
        .add_service(service.into_server())
        .serve_with_shutdown(grpc_address, async {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::info!("Shutdown signal received");
            }
        })
        .await
        .context("gRPC server failed")?;

    Ok(())
}
