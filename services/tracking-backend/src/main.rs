use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use telemesh_core::{logging, MeshConfig};
use telemesh_mesh::MqttSubscriber;
use tokio::net::TcpListener;
use tracing::info;
use tracking_backend::{build_app, AppState};

/// Session tracking backend for the sensor mesh.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "TELEMESH_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listen port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = MeshConfig::load(args.config.as_deref()).context("loading configuration")?;
    logging::init(&config.logging).context("initialising logging")?;

    let state = Arc::new(AppState::from_config(&config).context("building backend state")?);

    let _subscriber = config.backend.subscribe.then(|| {
        let ingest = state.ingest.clone();
        MqttSubscriber::spawn(&config.broker, &config.broker.topic, move |topic, payload| {
            ingest.handle(topic, payload)
        })
    });

    let port = args.port.unwrap_or(config.backend.listen_port);
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {}", bind_addr))?;
    info!(
        database = %config.backend.database_path.display(),
        "tracking-backend listening on {}", bind_addr
    );

    axum::serve(listener, build_app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("tracking-backend stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
