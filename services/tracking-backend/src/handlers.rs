use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use telemesh_core::ErrorBody;
use telemesh_tracking::{Measure, Session, TrackingError};
use tracing::{error, warn};

use crate::state::AppState;

const DEFAULT_SESSION_LIMIT: usize = 100;
const DEFAULT_MEASURE_LIMIT: usize = 1000;

/// Error wrapper rendering `{ error, category }` with the mapped status.
pub struct ApiError(TrackingError);

impl From<TrackingError> for ApiError {
    fn from(err: TrackingError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let category = self.0.category();
        let status = StatusCode::from_u16(category.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        } else {
            warn!(error = %self.0, "request rejected");
        }
        (status, Json(ErrorBody::new(self.0.to_string(), category))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Default, Deserialize)]
pub struct CollectBody {
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NewSession {
    pub owner_id: String,
}

#[derive(Debug, Deserialize)]
pub struct Limit {
    pub limit: Option<usize>,
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "tracking-backend",
        "timestamp": Utc::now().to_rfc3339()
    }))
}

pub async fn collect(
    State(state): State<Arc<AppState>>,
    body: Option<Json<CollectBody>>,
) -> Result<Response, ApiError> {
    let session_id = body.and_then(|Json(b)| b.session_id);
    let collected = state
        .orchestrator
        .collect_any(session_id.as_deref())
        .await?;
    Ok(Json(collected).into_response())
}

pub async fn latest(State(state): State<Arc<AppState>>) -> Response {
    Json(state.orchestrator.latest().as_ref().clone()).into_response()
}

pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NewSession>,
) -> Result<Response, ApiError> {
    let session = state.orchestrator.create_session(&body.owner_id)?;
    Ok((StatusCode::CREATED, Json(session)).into_response())
}

pub async fn select_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> ApiResult<Session> {
    Ok(Json(state.orchestrator.select_session(&session_id)?))
}

pub async fn owner_sessions(
    State(state): State<Arc<AppState>>,
    Path(owner_id): Path<String>,
    Query(limit): Query<Limit>,
) -> ApiResult<Vec<Session>> {
    let limit = limit.limit.unwrap_or(DEFAULT_SESSION_LIMIT);
    Ok(Json(state.orchestrator.owner_sessions(&owner_id, limit)?))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> ApiResult<Session> {
    Ok(Json(state.orchestrator.session(&session_id)?))
}

pub async fn session_measures(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Query(limit): Query<Limit>,
) -> ApiResult<Vec<Measure>> {
    let limit = limit.limit.unwrap_or(DEFAULT_MEASURE_LIMIT);
    Ok(Json(state.orchestrator.measures(&session_id, limit)?))
}

/// Most recent measure, or an empty placeholder for a session with none.
pub async fn session_latest(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Response, ApiError> {
    let response = match state.orchestrator.session_latest(&session_id)? {
        Some(measure) => Json(measure).into_response(),
        None => Json(json!({
            "session_id": session_id,
            "lat": null,
            "lon": null,
            "temperature": null,
            "humidity": null,
            "pressure": null,
            "battery_pct": null,
            "distance_m": 0.0,
            "ts": null,
        }))
        .into_response(),
    };
    Ok(response)
}
