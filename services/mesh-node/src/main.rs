use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use mesh_node::{build_app, NodeState, Role};
use telemesh_core::{logging, MeshConfig};
use tokio::net::TcpListener;
use tracing::info;

/// Run one role of the sensor mesh.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Role to serve
    #[arg(value_enum)]
    role: Role,

    /// TOML configuration file
    #[arg(short, long, env = "TELEMESH_CONFIG")]
    config: Option<PathBuf>,

    /// Override the role's listen port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = MeshConfig::load(args.config.as_deref()).context("loading configuration")?;
    logging::init(&config.logging).context("initialising logging")?;

    let state = NodeState::build(args.role, &config).context("building role state")?;
    let app = build_app(args.role, state);

    let port = args.port.unwrap_or_else(|| args.role.listen_port(&config));
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {}", bind_addr))?;
    info!(role = args.role.as_str(), "mesh-node listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("mesh-node stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
