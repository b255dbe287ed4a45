//! Test utilities for running the mesh in-process

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use mesh_node::{build_app, NodeState, Role};
use telemesh_core::config::{HopTimeouts, TargetConfig};
use telemesh_core::MeshConfig;
use tempfile::TempDir;
use tracking_backend::AppState;

/// Serve `app` on an ephemeral loopback port.
pub async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    tracing::debug!(%addr, "test server listening");
    addr
}

/// Target reachable by hostname on the loopback interface.
pub fn local_target(addr: SocketAddr, path: &str) -> TargetConfig {
    TargetConfig {
        host: "127.0.0.1".to_string(),
        port: addr.port(),
        path: path.to_string(),
        addr_file: None,
    }
}

/// Write a mesh address side-channel file.
pub fn write_mesh_file(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

/// Defaults with budgets short enough for tests.
pub fn test_config() -> MeshConfig {
    let mut config = MeshConfig::default();
    let timeouts = HopTimeouts {
        mesh_secs: 0.5,
        hostname_secs: 2.0,
    };
    config.leader.timeouts = timeouts;
    config.router.timeouts = timeouts;
    config.backend.timeouts = timeouts;
    config.backend.collect_timeout_secs = 5.0;
    config.backend.collect_delay_secs = 0.05;
    config.backend.subscribe = false;
    config.router.publish = false;
    config
}

/// Start one mesh-node role.
pub async fn start_role(role: Role, config: &MeshConfig) -> SocketAddr {
    let state = NodeState::build(role, config).unwrap();
    serve(build_app(role, state)).await
}

/// Leaves, leader and router wired together over loopback.
pub struct Mesh {
    pub config: MeshConfig,
    pub leaves: [SocketAddr; 3],
    pub leader: SocketAddr,
    pub router: SocketAddr,
}

impl Mesh {
    /// Start leaves, then a leader and router configured to find them.
    pub async fn start(mut config: MeshConfig) -> Self {
        let gps = start_role(Role::Gps, &config).await;
        let battery = start_role(Role::Battery, &config).await;
        let temperature = start_role(Role::Temperature, &config).await;

        config.leader.gps = local_target(gps, "gps");
        config.leader.battery = local_target(battery, "battery");
        config.leader.temperature = local_target(temperature, "temperature");
        let leader = start_role(Role::Leader, &config).await;

        config.router.leader = local_target(leader, "collect");
        let router = start_role(Role::Router, &config).await;

        config.backend.router = local_target(router, "collect");

        Self {
            config,
            leaves: [gps, battery, temperature],
            leader,
            router,
        }
    }

    pub fn url(addr: SocketAddr, path: &str) -> String {
        format!("http://{}/{}", addr, path)
    }
}

/// Tracking backend on a temporary database.
pub struct Backend {
    pub addr: SocketAddr,
    _dir: TempDir,
}

impl Backend {
    pub async fn start(config: &MeshConfig) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config.clone();
        config.backend.database_path = dir.path().join("telemesh.db");
        let state = Arc::new(AppState::from_config(&config).unwrap());
        let addr = serve(tracking_backend::build_app(state)).await;
        Self { addr, _dir: dir }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}/{}", self.addr, path.trim_start_matches('/'))
    }
}
