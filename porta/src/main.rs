//! # Porta entry point
//!
//! Wires the pieces together: parses the CLI, installs tracing, builds the
//! shared schema registry and the protoc driver, and serves the HTTP
//! surface until the process is stopped.

mod cli;
mod error;
mod routes;

use anyhow::Context;
use clap::Parser;
use cli::Cli;
use porta_core::compiler::ProtocCompiler;
use porta_core::registry::SchemaRegistry;
use routes::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Cli::parse();

    let registry = Arc::new(SchemaRegistry::new());
    for root in &args.import_root {
        registry
            .add_import_root(root)
            .with_context(|| format!("invalid import root {}", root.display()))?;
    }

    let state = AppState {
        registry,
        compiler: Arc::new(ProtocCompiler::new(args.descriptor_out)),
        staging_dir: args.staging_dir,
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "porta listening");

    axum::serve(listener, routes::router(state))
        .await
        .context("server error")?;
    Ok(())
}
