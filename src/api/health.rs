/// Health check endpoints for liveness and readiness probes
use crate::{context::AppContext, db};
use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::time::Instant;

/// Build health check routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/health", get(health_basic))
        .route("/health/ready", get(readiness_probe))
}

/// Liveness: responds as long as the process serves requests
pub async fn health_basic() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Readiness probe
///
/// Returns 503 when the database cannot answer a trivial query.
pub async fn readiness_probe(State(ctx): State<AppContext>) -> (StatusCode, Json<Value>) {
    let start = Instant::now();

    match db::test_connection(&ctx.db).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "ready",
                "version": env!("CARGO_PKG_VERSION"),
                "database": {
                    "status": "healthy",
                    "response_time_ms": start.elapsed().as_millis() as u64,
                    "pool_size": ctx.db.size(),
                }
            })),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "readiness_probe_failed: database check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unavailable",
                    "version": env!("CARGO_PKG_VERSION"),
                    "database": {
                        "status": "unhealthy",
                        "response_time_ms": start.elapsed().as_millis() as u64,
                    }
                })),
            )
        }
    }
}
