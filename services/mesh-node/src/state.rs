use std::sync::Arc;

use telemesh_core::{Clock, MeshConfig, SharedSecret, SystemClock};
use telemesh_mesh::{FallbackCaller, HttpTransport, MeshResult, MqttPublisher};
use telemesh_relay::{
    BatterySensor, GatherCoordinator, GpsSensor, Republish, RouteAggregator, Sensor,
    TemperatureSensor,
};

/// Which mesh role this process plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Role {
    Gps,
    Battery,
    Temperature,
    Leader,
    Router,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Gps => "gps",
            Role::Battery => "battery",
            Role::Temperature => "temperature",
            Role::Leader => "leader",
            Role::Router => "router",
        }
    }

    /// Port from the role's config section.
    pub fn listen_port(&self, config: &MeshConfig) -> u16 {
        match self {
            Role::Gps | Role::Battery | Role::Temperature => config.sensor.listen_port,
            Role::Leader => config.leader.listen_port,
            Role::Router => config.router.listen_port,
        }
    }
}

/// Per-role shared state.
#[derive(Clone)]
pub enum NodeState {
    Sensor(Arc<dyn Sensor>),
    Leader(Arc<GatherCoordinator>),
    Router(Arc<RouteAggregator>),
}

impl NodeState {
    /// Build the state for `role` from configuration.
    pub fn build(role: Role, config: &MeshConfig) -> MeshResult<Self> {
        let secret = SharedSecret::new(config.shared_key.clone());
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let state = match role {
            Role::Gps => NodeState::Sensor(Arc::new(GpsSensor::new(secret, clock))),
            Role::Battery => NodeState::Sensor(Arc::new(BatterySensor::new(secret, clock))),
            Role::Temperature => {
                NodeState::Sensor(Arc::new(TemperatureSensor::new(secret, clock)))
            }
            Role::Leader => {
                let caller = FallbackCaller::new(Arc::new(HttpTransport::new()?));
                NodeState::Leader(Arc::new(GatherCoordinator::new(
                    secret,
                    &config.leader,
                    config.resolver.clone(),
                    caller,
                    clock,
                )))
            }
            Role::Router => {
                let caller = FallbackCaller::new(Arc::new(HttpTransport::new()?));
                let mut router = RouteAggregator::new(
                    secret,
                    &config.router,
                    config.resolver.clone(),
                    caller,
                    clock,
                );
                if config.router.publish {
                    let publisher = MqttPublisher::connect(&config.broker, "router");
                    router = router.with_republish(Republish::new(
                        Arc::new(publisher),
                        config.broker.topic.clone(),
                    ));
                }
                NodeState::Router(Arc::new(router))
            }
        };
        Ok(state)
    }
}
