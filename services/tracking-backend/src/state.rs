use std::sync::Arc;

use telemesh_core::{Clock, MeshConfig, SharedSecret, SystemClock};
use telemesh_mesh::{FallbackCaller, HttpTransport, MqttPublisher};
use telemesh_tracking::{
    CollectPolicy, HttpRouterClient, LatestSnapshot, SessionCollectionOrchestrator, SqliteStore,
    StreamIngest,
};

pub struct AppState {
    pub orchestrator: Arc<SessionCollectionOrchestrator>,
    pub ingest: Arc<StreamIngest>,
}

impl AppState {
    /// Wire the backend from configuration.
    pub fn from_config(config: &MeshConfig) -> anyhow::Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let snapshot = Arc::new(LatestSnapshot::new());
        let store = Arc::new(SqliteStore::open(&config.backend.database_path)?);

        let router = HttpRouterClient::new(
            SharedSecret::new(config.shared_key.clone()),
            config.backend.router.clone(),
            config.resolver.clone(),
            config.backend.timeouts,
            FallbackCaller::new(Arc::new(HttpTransport::new()?)),
        );

        let mut orchestrator = SessionCollectionOrchestrator::new(
            Arc::new(router),
            store,
            snapshot.clone(),
            clock.clone(),
            CollectPolicy::from_config(&config.backend),
        );
        if config.backend.subscribe {
            let publisher = MqttPublisher::connect(&config.broker, "backend");
            orchestrator = orchestrator.with_publisher(Arc::new(publisher));
        }

        Ok(Self {
            orchestrator: Arc::new(orchestrator),
            ingest: Arc::new(StreamIngest::new(snapshot, clock)),
        })
    }
}
