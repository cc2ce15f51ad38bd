//! Liveness endpoint served by every process.

use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
}

/// GET /health
pub async fn check() -> Json<Health> {
    Json(Health { status: "ok" })
}
