//! Liveness endpoint.

use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::state::BACKEND_NAME;

/// Liveness report.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the process is serving.
    pub status: &'static str,
    /// Crate version.
    pub version: &'static str,
    /// Which ledger store is in use.
    pub backend: &'static str,
    /// Server time.
    pub timestamp: DateTime<Utc>,
}

/// `GET /health`.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        backend: BACKEND_NAME,
        timestamp: Utc::now(),
    })
}
