//! Ingestion routes: JSON in, RPC to the ingestion service, 202 out.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use ledger_proto::ingestion::{
    IngestLogBatchRequest, IngestLogRequest, LogEntry, QueueDepthRequest,
};

use crate::error::{ApiError, ApiResult};
use crate::routes::{rpc_call, Ctx};
use crate::state::AppState;

fn require_project(ctx: &crate::state::AuthContext) -> Result<i64, ApiError> {
    ctx.project_id.ok_or_else(|| {
        ApiError::new(
            StatusCode::BAD_REQUEST,
            "ingestion requires an API key bound to a project",
        )
    })
}

fn string_field(value: &serde_json::Value, field: &str) -> Option<String> {
    value.get(field).and_then(|v| v.as_str()).map(str::to_owned)
}

/// Build the wire entry from a JSON body. Unknown or missing fields are
/// left for the ingestion service's validator to judge.
fn json_to_proto_log(value: &serde_json::Value) -> LogEntry {
    LogEntry {
        timestamp: string_field(value, "timestamp").unwrap_or_default(),
        level: string_field(value, "level").unwrap_or_else(|| "info".into()),
        log_type: string_field(value, "log_type").unwrap_or_else(|| "logger".into()),
        importance: string_field(value, "importance").unwrap_or_else(|| "standard".into()),
        message: string_field(value, "message"),
        error_type: string_field(value, "error_type"),
        error_message: string_field(value, "error_message"),
        stack_trace: string_field(value, "stack_trace"),
        environment: string_field(value, "environment"),
        release: string_field(value, "release"),
        sdk_version: string_field(value, "sdk_version"),
        platform: string_field(value, "platform"),
        platform_version: string_field(value, "platform_version"),
        attributes: value
            .get("attributes")
            .filter(|v| !v.is_null())
            .map(|v| v.to_string()),
    }
}

#[derive(Serialize)]
pub struct IngestResponse {
    pub accepted: u32,
    pub rejected: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

pub async fn single(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Json(body): Json<serde_json::Value>,
) -> ApiResult<(StatusCode, Json<IngestResponse>)> {
    let project_id = require_project(&ctx)?;
    let log = json_to_proto_log(&body);

    let mut client = state.rpc.ingestion();
    rpc_call(&state, "ingestion", || {
        client.ingest_log(IngestLogRequest {
            project_id,
            log: Some(log),
        })
    })
    .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(IngestResponse {
            accepted: 1,
            rejected: 0,
            errors: None,
        }),
    ))
}

pub async fn batch(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Json(body): Json<serde_json::Value>,
) -> ApiResult<(StatusCode, Json<IngestResponse>)> {
    let project_id = require_project(&ctx)?;
    let logs = body
        .get("logs")
        .and_then(|v| v.as_array())
        .ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, "body must contain a logs array"))?;
    if logs.is_empty() {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "batch must contain at least one log entry",
        ));
    }

    let proto_logs: Vec<LogEntry> = logs.iter().map(json_to_proto_log).collect();

    let mut client = state.rpc.ingestion();
    let response = rpc_call(&state, "ingestion", || {
        client.ingest_log_batch(IngestLogBatchRequest {
            project_id,
            logs: proto_logs,
        })
    })
    .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(IngestResponse {
            accepted: response.queued,
            rejected: response.failed,
            errors: response
                .error
                .map(|e| e.split("; ").map(str::to_owned).collect()),
        }),
    ))
}

#[derive(Serialize)]
pub struct QueueDepthBody {
    pub project_id: i64,
    pub queue_depth: u64,
}

pub async fn queue_depth(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
) -> ApiResult<Json<QueueDepthBody>> {
    let project_id = require_project(&ctx)?;
    let mut client = state.rpc.ingestion();
    let response = rpc_call(&state, "ingestion", || {
        client.get_queue_depth(QueueDepthRequest { project_id })
    })
    .await?;
    Ok(Json(QueueDepthBody {
        project_id,
        queue_depth: response.depth,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_conversion_applies_defaults() {
        let log = json_to_proto_log(&serde_json::json!({
            "timestamp": "2025-01-15T10:30:45Z",
            "message": "hello",
        }));
        assert_eq!(log.level, "info");
        assert_eq!(log.log_type, "logger");
        assert_eq!(log.importance, "standard");
        assert_eq!(log.message.as_deref(), Some("hello"));
        assert!(log.attributes.is_none());
    }

    #[test]
    fn json_conversion_serializes_attributes() {
        let log = json_to_proto_log(&serde_json::json!({
            "timestamp": "2025-01-15T10:30:45Z",
            "level": "error",
            "attributes": {"user_id": "usr_1", "n": 3},
        }));
        let attrs: serde_json::Value =
            serde_json::from_str(log.attributes.as_deref().unwrap()).unwrap();
        assert_eq!(attrs["user_id"], "usr_1");
        assert_eq!(attrs["n"], 3);
    }

    #[test]
    fn null_attributes_are_dropped() {
        let log = json_to_proto_log(&serde_json::json!({
            "timestamp": "t", "attributes": null
        }));
        assert!(log.attributes.is_none());
    }
}
