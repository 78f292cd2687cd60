//! Health check handlers

use crate::AppState;
use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: &'static str,
    pub services: ServiceStatus,
}

/// Which optional collaborators are configured
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub notion: bool,
    pub google_drive: bool,
}

#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub status: String,
}

/// Liveness probe, also reporting collaborator configuration
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now(),
        version: gutachten_common::VERSION,
        services: ServiceStatus {
            notion: state.notion_enabled(),
            google_drive: state.drive_enabled(),
        },
    })
}

/// Readiness probe. Collaborators are optional, so the service is ready once
/// it is serving.
pub async fn ready() -> Json<ReadyResponse> {
    Json(ReadyResponse {
        status: "ready".to_string(),
    })
}
