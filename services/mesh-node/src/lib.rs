//! HTTP surface for the mesh roles: leaf sensors, leader and router.

pub mod handlers;
pub mod state;

use axum::{
    routing::{get, post},
    Router,
};

pub use state::{NodeState, Role};

/// Routes for one role.
pub fn build_app(role: Role, state: NodeState) -> Router {
    let health = Router::new()
        .route("/health", get(handlers::health))
        .with_state(role.as_str());

    let service = match state {
        NodeState::Sensor(sensor) => Router::new()
            .route(&format!("/{}", sensor.resource()), get(handlers::read_sensor))
            .with_state(sensor),
        NodeState::Leader(coordinator) => Router::new()
            .route("/collect", post(handlers::leader_collect))
            .with_state(coordinator),
        NodeState::Router(router) => Router::new()
            .route("/collect", post(handlers::router_collect))
            .with_state(router),
    };

    health.merge(service)
}
