//! Query routes: REST façade over the query service.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use ledger_proto::query::{
    GetAggregatedMetricsRequest, GetErrorListRequest, GetErrorRateRequest, GetLogRequest,
    GetLogVolumeRequest, GetTopErrorsRequest, GetUsageStatsRequest, LogRecord, Pagination,
    QueryLogsRequest, SearchLogsRequest,
};

use crate::error::ApiResult;
use crate::routes::{authorize_project, rpc_call, Ctx};
use crate::state::AppState;

fn log_json(log: LogRecord) -> serde_json::Value {
    let attributes = log
        .attributes
        .as_deref()
        .and_then(|raw| serde_json::from_str::<serde_json::Value>(raw).ok());
    json!({
        "id": log.id,
        "project_id": log.project_id,
        "timestamp": log.timestamp,
        "ingested_at": log.ingested_at,
        "level": log.level,
        "log_type": log.log_type,
        "importance": log.importance,
        "environment": log.environment,
        "release": log.release,
        "message": log.message,
        "error_type": log.error_type,
        "error_message": log.error_message,
        "stack_trace": log.stack_trace,
        "attributes": attributes,
        "sdk_version": log.sdk_version,
        "platform": log.platform,
        "platform_version": log.platform_version,
        "processing_time_ms": log.processing_time_ms,
        "error_fingerprint": log.error_fingerprint,
    })
}

fn default_limit() -> u32 {
    100
}

#[derive(Deserialize)]
pub struct QueryLogsParams {
    pub project_id: i64,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub log_type: Option<String>,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub error_fingerprint: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

pub async fn query_logs(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Query(params): Query<QueryLogsParams>,
) -> ApiResult<Json<serde_json::Value>> {
    authorize_project(&state, &ctx, params.project_id).await?;

    let mut client = state.rpc.query();
    let page = rpc_call(&state, "query", || {
        client.query_logs(QueryLogsRequest {
            project_id: params.project_id,
            start_time: params.start_time,
            end_time: params.end_time,
            level: params.level,
            log_type: params.log_type,
            environment: params.environment,
            error_fingerprint: params.error_fingerprint,
            pagination: Some(Pagination {
                limit: params.limit,
                offset: params.offset,
            }),
        })
    })
    .await?;

    Ok(Json(json!({
        "logs": page.logs.into_iter().map(log_json).collect::<Vec<_>>(),
        "total": page.total,
        "has_more": page.has_more,
    })))
}

#[derive(Deserialize)]
pub struct SearchParams {
    pub project_id: i64,
    pub q: String,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

pub async fn search_logs(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<serde_json::Value>> {
    authorize_project(&state, &ctx, params.project_id).await?;

    let mut client = state.rpc.query();
    let page = rpc_call(&state, "query", || {
        client.search_logs(SearchLogsRequest {
            project_id: params.project_id,
            query: params.q,
            start_time: params.start_time,
            end_time: params.end_time,
            pagination: Some(Pagination {
                limit: params.limit,
                offset: params.offset,
            }),
        })
    })
    .await?;

    Ok(Json(json!({
        "logs": page.logs.into_iter().map(log_json).collect::<Vec<_>>(),
        "total": page.total,
        "has_more": page.has_more,
    })))
}

#[derive(Deserialize)]
pub struct ProjectParam {
    pub project_id: i64,
}

pub async fn get_log(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Path(log_id): Path<i64>,
    Query(params): Query<ProjectParam>,
) -> ApiResult<Json<serde_json::Value>> {
    authorize_project(&state, &ctx, params.project_id).await?;

    let mut client = state.rpc.query();
    let log = rpc_call(&state, "query", || {
        client.get_log(GetLogRequest {
            log_id,
            project_id: params.project_id,
        })
    })
    .await?;
    Ok(Json(log_json(log)))
}

#[derive(Deserialize)]
pub struct ErrorListParams {
    pub project_id: i64,
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default, rename = "periodFrom")]
    pub period_from: Option<String>,
    #[serde(default, rename = "periodTo")]
    pub period_to: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

pub async fn error_list(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Query(params): Query<ErrorListParams>,
) -> ApiResult<Json<serde_json::Value>> {
    authorize_project(&state, &ctx, params.project_id).await?;

    let mut client = state.rpc.query();
    let response = rpc_call(&state, "query", || {
        client.get_error_list(GetErrorListRequest {
            project_id: params.project_id,
            period: params.period,
            period_from: params.period_from,
            period_to: params.period_to,
            pagination: Some(Pagination {
                limit: params.limit,
                offset: params.offset,
            }),
        })
    })
    .await?;

    let errors: Vec<_> = response
        .errors
        .into_iter()
        .map(|e| {
            let attributes = e
                .attributes
                .as_deref()
                .and_then(|raw| serde_json::from_str::<serde_json::Value>(raw).ok());
            json!({
                "log_id": e.log_id,
                "project_id": e.project_id,
                "level": e.level,
                "log_type": e.log_type,
                "message": e.message,
                "error_type": e.error_type,
                "timestamp": e.timestamp,
                "error_fingerprint": e.error_fingerprint,
                "attributes": attributes,
                "sdk_version": e.sdk_version,
                "platform": e.platform,
            })
        })
        .collect();

    Ok(Json(json!({
        "project_id": response.project_id,
        "errors": errors,
        "total": response.total,
        "has_more": response.has_more,
    })))
}

#[derive(Deserialize)]
pub struct AggregatedParams {
    pub project_id: i64,
    #[serde(rename = "type")]
    pub metric_type: String,
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default, rename = "periodFrom")]
    pub period_from: Option<String>,
    #[serde(default, rename = "periodTo")]
    pub period_to: Option<String>,
    #[serde(default, rename = "endpointPath")]
    pub endpoint_path: Option<String>,
}

pub async fn aggregated_metrics(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Query(params): Query<AggregatedParams>,
) -> ApiResult<Json<serde_json::Value>> {
    authorize_project(&state, &ctx, params.project_id).await?;

    let mut client = state.rpc.query();
    let response = rpc_call(&state, "query", || {
        client.get_aggregated_metrics(GetAggregatedMetricsRequest {
            project_id: params.project_id,
            metric_type: params.metric_type,
            period: params.period,
            period_from: params.period_from,
            period_to: params.period_to,
            endpoint_path: params.endpoint_path,
        })
    })
    .await?;

    let buckets: Vec<_> = response
        .buckets
        .into_iter()
        .map(|b| {
            json!({
                "date": b.date,
                "hour": b.hour,
                "endpoint_method": b.endpoint_method,
                "endpoint_path": b.endpoint_path,
                "log_level": b.log_level,
                "log_type": b.log_type,
                "log_count": b.log_count,
                "error_count": b.error_count,
                "avg_duration_ms": b.avg_duration_ms,
                "min_duration_ms": b.min_duration_ms,
                "max_duration_ms": b.max_duration_ms,
                "p95_duration_ms": b.p95_duration_ms,
                "p99_duration_ms": b.p99_duration_ms,
            })
        })
        .collect();

    Ok(Json(json!({
        "granularity": response.granularity,
        "data": buckets,
    })))
}

#[derive(Deserialize)]
pub struct IntervalParams {
    pub project_id: i64,
    #[serde(default)]
    pub interval: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
}

pub async fn error_rate(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Query(params): Query<IntervalParams>,
) -> ApiResult<Json<serde_json::Value>> {
    authorize_project(&state, &ctx, params.project_id).await?;

    let mut client = state.rpc.query();
    let response = rpc_call(&state, "query", || {
        client.get_error_rate(GetErrorRateRequest {
            project_id: params.project_id,
            interval: params.interval.unwrap_or_default(),
            start_time: params.start_time,
            end_time: params.end_time,
        })
    })
    .await?;

    let data: Vec<_> = response
        .data
        .into_iter()
        .map(|p| {
            json!({
                "timestamp": p.timestamp,
                "error_count": p.error_count,
                "critical_count": p.critical_count,
            })
        })
        .collect();
    Ok(Json(json!({
        "project_id": response.project_id,
        "interval": response.interval,
        "data": data,
    })))
}

pub async fn log_volume(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Query(params): Query<IntervalParams>,
) -> ApiResult<Json<serde_json::Value>> {
    authorize_project(&state, &ctx, params.project_id).await?;

    let mut client = state.rpc.query();
    let response = rpc_call(&state, "query", || {
        client.get_log_volume(GetLogVolumeRequest {
            project_id: params.project_id,
            interval: params.interval.unwrap_or_default(),
            start_time: params.start_time,
            end_time: params.end_time,
        })
    })
    .await?;

    let data: Vec<_> = response
        .data
        .into_iter()
        .map(|p| {
            json!({
                "timestamp": p.timestamp,
                "debug": p.debug,
                "info": p.info,
                "warning": p.warning,
                "error": p.error,
                "critical": p.critical,
            })
        })
        .collect();
    Ok(Json(json!({
        "project_id": response.project_id,
        "interval": response.interval,
        "data": data,
    })))
}

#[derive(Deserialize)]
pub struct TopErrorsParams {
    pub project_id: i64,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub status: Option<String>,
}

pub async fn top_errors(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Query(params): Query<TopErrorsParams>,
) -> ApiResult<Json<serde_json::Value>> {
    authorize_project(&state, &ctx, params.project_id).await?;

    let mut client = state.rpc.query();
    let response = rpc_call(&state, "query", || {
        client.get_top_errors(GetTopErrorsRequest {
            project_id: params.project_id,
            limit: params.limit.unwrap_or(10),
            status: params.status,
        })
    })
    .await?;

    let errors: Vec<_> = response
        .errors
        .into_iter()
        .map(|e| {
            json!({
                "fingerprint": e.fingerprint,
                "error_type": e.error_type,
                "error_message": e.error_message,
                "occurrence_count": e.occurrence_count,
                "first_seen": e.first_seen,
                "last_seen": e.last_seen,
                "status": e.status,
                "sample_log_id": e.sample_log_id,
            })
        })
        .collect();
    Ok(Json(json!({
        "project_id": response.project_id,
        "errors": errors,
    })))
}

pub async fn usage_stats(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Query(params): Query<ProjectParam>,
) -> ApiResult<Json<serde_json::Value>> {
    authorize_project(&state, &ctx, params.project_id).await?;

    let mut client = state.rpc.query();
    let response = rpc_call(&state, "query", || {
        client.get_usage_stats(GetUsageStatsRequest {
            project_id: params.project_id,
        })
    })
    .await?;

    let usage: Vec<_> = response
        .usage
        .into_iter()
        .map(|p| {
            json!({
                "date": p.date,
                "log_count": p.log_count,
                "daily_quota": p.daily_quota,
                "quota_used_percent": p.quota_used_percent,
            })
        })
        .collect();
    Ok(Json(json!({
        "project_id": response.project_id,
        "usage": usage,
    })))
}
