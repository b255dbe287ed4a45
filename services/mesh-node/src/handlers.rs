use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use telemesh_core::{ErrorBody, ErrorCategory};
use telemesh_relay::{GatherCoordinator, RouteAggregator, Sensor};
use tracing::{error, warn};

/// Body of a collection trigger. A missing or unparseable body counts as no key.
#[derive(Debug, Default, Deserialize)]
pub struct CollectRequest {
    #[serde(default)]
    pub key: Option<String>,
}

fn key_of(body: &Option<Json<CollectRequest>>) -> Option<&str> {
    body.as_ref().and_then(|Json(req)| req.key.as_deref())
}

pub fn error_response(message: String, category: ErrorCategory) -> Response {
    let status =
        StatusCode::from_u16(category.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ErrorBody::new(message, category))).into_response()
}

pub async fn health(State(role): State<&'static str>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "mesh-node",
        "role": role,
        "timestamp": Utc::now().to_rfc3339()
    }))
}

pub async fn read_sensor(State(sensor): State<Arc<dyn Sensor>>) -> Json<Value> {
    Json(sensor.read_json())
}

pub async fn leader_collect(
    State(coordinator): State<Arc<GatherCoordinator>>,
    body: Option<Json<CollectRequest>>,
) -> Response {
    match coordinator.gather(key_of(&body)).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => {
            let category = e.category();
            if category == ErrorCategory::Authentication {
                warn!("rejected collect request: bad key");
            } else {
                error!(error = %e, failed = ?e.failed_leaves(), "gather failed");
            }
            error_response(e.to_string(), category)
        }
    }
}

pub async fn router_collect(
    State(router): State<Arc<RouteAggregator>>,
    body: Option<Json<CollectRequest>>,
) -> Response {
    match router.collect(key_of(&body)).await {
        Ok(reading) => Json(reading).into_response(),
        Err(e) => {
            let category = e.category();
            if category == ErrorCategory::Authentication {
                warn!(error = %e, "collect rejected");
            } else {
                error!(error = %e, "collect failed");
            }
            error_response(e.to_string(), category)
        }
    }
}
