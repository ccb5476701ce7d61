//! Health probes and operational statistics.

use axum::extract::State;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

/// Verifies the KV store and reports downstream pool state.
pub async fn deep_health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let (status, kv) = match state.kv.ping().await {
        Ok(()) => ("healthy", json!("healthy")),
        Err(e) => ("degraded", json!(format!("unhealthy: {e}"))),
    };

    Json(json!({
        "status": status,
        "services": {
            "kv": kv,
            "rpc": state.rpc.stats(),
        },
    }))
}

/// Middleware, breaker and pool statistics.
pub async fn metrics(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "auth": state.auth_stats.snapshot(),
        "rate_limit": state.rate_limit_stats.snapshot(),
        "circuit_breakers": state.breakers.all_stats().await,
        "rpc_pools": state.rpc.stats(),
    }))
}
