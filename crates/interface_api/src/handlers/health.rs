//! Health check handlers

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use core_kernel::{AdapterHealth, HealthCheckResult};

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<HealthCheckResult>,
}

/// Liveness: the process is up and serving
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        storage: None,
    })
}

/// Readiness check (includes the storage adapter)
pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let storage = state.service.health().await;
    let (code, status) = match storage.status {
        AdapterHealth::Unhealthy => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
        AdapterHealth::Healthy | AdapterHealth::Degraded => (StatusCode::OK, "ready"),
    };

    (
        code,
        Json(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            storage: Some(storage),
        }),
    )
}
