//! gRPC servicer for the query surface.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use tonic::{Request, Response, Status};

use ledger_domain::config::Config;
use ledger_kv::KvStore;
use ledger_proto::convert::error_to_status;
use ledger_proto::query::query_service_server::QueryService;
use ledger_proto::query::*;
use ledger_store::rows::LogRow;

use crate::logs::LogFilters;
use crate::{cached, logs, metrics, period};

pub struct QueryServicer {
    #[allow(dead_code)]
    config: Arc<Config>,
    pool: PgPool,
    kv: KvStore,
}

impl QueryServicer {
    pub fn new(config: Arc<Config>, pool: PgPool, kv: KvStore) -> Self {
        Self { config, pool, kv }
    }
}

fn parse_datetime(value: &str) -> Result<DateTime<Utc>, Status> {
    if let Ok(t) = DateTime::parse_from_rfc3339(value) {
        return Ok(t.with_timezone(&Utc));
    }
    // Bare dates are accepted as midnight UTC.
    if let Ok(d) = value.parse::<NaiveDate>() {
        if let Some(t) = d.and_hms_opt(0, 0, 0) {
            return Ok(t.and_utc());
        }
    }
    Err(Status::invalid_argument(format!(
        "invalid timestamp: {value:?}"
    )))
}

fn parse_optional_datetime(value: &Option<String>) -> Result<Option<DateTime<Utc>>, Status> {
    value.as_deref().map(parse_datetime).transpose()
}

fn log_record(row: LogRow) -> LogRecord {
    LogRecord {
        id: row.id,
        project_id: row.project_id,
        timestamp: row.timestamp.to_rfc3339(),
        ingested_at: row.ingested_at.to_rfc3339(),
        level: row.level,
        log_type: row.log_type,
        importance: row.importance,
        environment: row.environment,
        release: row.release,
        message: row.message,
        error_type: row.error_type,
        error_message: row.error_message,
        stack_trace: row.stack_trace,
        attributes: row.attributes.map(|v| v.to_string()),
        sdk_version: row.sdk_version,
        platform: row.platform,
        platform_version: row.platform_version,
        processing_time_ms: row.processing_time_ms.map(i32::from),
        error_fingerprint: row.error_fingerprint.map(|f| f.trim().to_string()),
    }
}

fn logs_page(page: logs::LogsPage) -> LogsPage {
    LogsPage {
        logs: page.logs.into_iter().map(log_record).collect(),
        total: page.total as u64,
        has_more: page.has_more,
    }
}

fn pagination(p: &Option<Pagination>) -> logs::Pagination {
    match p {
        Some(p) => logs::Pagination::clamped(p.limit, p.offset),
        None => logs::Pagination::default(),
    }
}

#[tonic::async_trait]
impl QueryService for QueryServicer {
    async fn query_logs(
        &self,
        request: Request<QueryLogsRequest>,
    ) -> Result<Response<LogsPage>, Status> {
        let req = request.into_inner();
        let filters = LogFilters {
            start_time: parse_optional_datetime(&req.start_time)?,
            end_time: parse_optional_datetime(&req.end_time)?,
            level: req.level,
            log_type: req.log_type,
            environment: req.environment,
            error_fingerprint: req.error_fingerprint,
        };
        let page = logs::query_logs(&self.pool, req.project_id, &filters, pagination(&req.pagination))
            .await
            .map_err(error_to_status)?;
        Ok(Response::new(logs_page(page)))
    }

    async fn search_logs(
        &self,
        request: Request<SearchLogsRequest>,
    ) -> Result<Response<LogsPage>, Status> {
        let req = request.into_inner();
        let page = logs::search_logs(
            &self.pool,
            req.project_id,
            &req.query,
            parse_optional_datetime(&req.start_time)?,
            parse_optional_datetime(&req.end_time)?,
            pagination(&req.pagination),
        )
        .await
        .map_err(error_to_status)?;
        Ok(Response::new(logs_page(page)))
    }

    async fn get_log(
        &self,
        request: Request<GetLogRequest>,
    ) -> Result<Response<LogRecord>, Status> {
        let req = request.into_inner();
        let row = logs::get_log(&self.pool, req.log_id, req.project_id)
            .await
            .map_err(error_to_status)?;
        Ok(Response::new(log_record(row)))
    }

    async fn get_error_list(
        &self,
        request: Request<GetErrorListRequest>,
    ) -> Result<Response<ErrorListResponse>, Status> {
        let req = request.into_inner();
        let (start, end) = period::time_window(
            req.period.as_deref(),
            parse_optional_datetime(&req.period_from)?,
            parse_optional_datetime(&req.period_to)?,
            Utc::now(),
        );
        let page = logs::error_list(
            &self.pool,
            req.project_id,
            start,
            end,
            pagination(&req.pagination),
        )
        .await
        .map_err(error_to_status)?;

        let errors = page
            .logs
            .into_iter()
            .map(|row| ErrorListEntry {
                log_id: row.id,
                project_id: row.project_id,
                level: row.level,
                log_type: row.log_type,
                message: row.message.unwrap_or_default(),
                error_type: row.error_type,
                timestamp: row.timestamp.to_rfc3339(),
                error_fingerprint: row.error_fingerprint.map(|f| f.trim().to_string()),
                attributes: row.attributes.map(|v| v.to_string()),
                sdk_version: row.sdk_version,
                platform: row.platform,
            })
            .collect();

        Ok(Response::new(ErrorListResponse {
            project_id: req.project_id,
            errors,
            total: page.total as u64,
            has_more: page.has_more,
        }))
    }

    async fn get_aggregated_metrics(
        &self,
        request: Request<GetAggregatedMetricsRequest>,
    ) -> Result<Response<GetAggregatedMetricsResponse>, Status> {
        let req = request.into_inner();
        let range = period::resolve(
            req.period.as_deref(),
            req.period_from.as_deref(),
            req.period_to.as_deref(),
            Utc::now().date_naive(),
        )
        .map_err(error_to_status)?;

        let buckets = metrics::get_aggregated_metrics(
            &self.pool,
            req.project_id,
            &req.metric_type,
            range,
            req.endpoint_path.as_deref(),
        )
        .await
        .map_err(error_to_status)?;

        let buckets = buckets
            .into_iter()
            .map(|b| MetricBucket {
                date: b.date,
                hour: b.hour,
                endpoint_method: b.endpoint_method,
                endpoint_path: b.endpoint_path,
                log_level: b.log_level,
                log_type: b.log_type,
                log_count: b.log_count,
                error_count: b.error_count,
                avg_duration_ms: b.avg_duration_ms,
                min_duration_ms: b.min_duration_ms,
                max_duration_ms: b.max_duration_ms,
                p95_duration_ms: b.p95_duration_ms,
                p99_duration_ms: b.p99_duration_ms,
            })
            .collect();

        Ok(Response::new(GetAggregatedMetricsResponse {
            buckets,
            granularity: range.granularity.as_str().to_string(),
        }))
    }

    async fn get_error_rate(
        &self,
        request: Request<GetErrorRateRequest>,
    ) -> Result<Response<GetErrorRateResponse>, Status> {
        let req = request.into_inner();
        let interval = if req.interval.is_empty() {
            "5min".to_string()
        } else {
            req.interval
        };
        let snapshot = cached::error_rate(
            &self.kv,
            req.project_id,
            &interval,
            parse_optional_datetime(&req.start_time)?,
            parse_optional_datetime(&req.end_time)?,
        )
        .await
        .map_err(error_to_status)?;

        Ok(Response::new(GetErrorRateResponse {
            project_id: req.project_id,
            interval,
            data: snapshot
                .data
                .into_iter()
                .map(|p| ErrorRatePoint {
                    timestamp: p.timestamp.to_rfc3339(),
                    error_count: p.error_count,
                    critical_count: p.critical_count,
                })
                .collect(),
        }))
    }

    async fn get_log_volume(
        &self,
        request: Request<GetLogVolumeRequest>,
    ) -> Result<Response<GetLogVolumeResponse>, Status> {
        let req = request.into_inner();
        let interval = if req.interval.is_empty() {
            "1hour".to_string()
        } else {
            req.interval
        };
        let snapshot = cached::log_volume(
            &self.kv,
            req.project_id,
            &interval,
            parse_optional_datetime(&req.start_time)?,
            parse_optional_datetime(&req.end_time)?,
        )
        .await
        .map_err(error_to_status)?;

        Ok(Response::new(GetLogVolumeResponse {
            project_id: req.project_id,
            interval,
            data: snapshot
                .data
                .into_iter()
                .map(|p| LogVolumePoint {
                    timestamp: p.timestamp.to_rfc3339(),
                    debug: p.debug,
                    info: p.info,
                    warning: p.warning,
                    error: p.error,
                    critical: p.critical,
                })
                .collect(),
        }))
    }

    async fn get_top_errors(
        &self,
        request: Request<GetTopErrorsRequest>,
    ) -> Result<Response<GetTopErrorsResponse>, Status> {
        let req = request.into_inner();
        let limit = if req.limit == 0 { 10 } else { req.limit as usize };
        let snapshot = cached::top_errors(&self.kv, req.project_id, limit, req.status.as_deref())
            .await
            .map_err(error_to_status)?;

        Ok(Response::new(GetTopErrorsResponse {
            project_id: req.project_id,
            errors: snapshot
                .errors
                .into_iter()
                .map(|e| TopError {
                    fingerprint: e.fingerprint,
                    error_type: e.error_type,
                    error_message: e.error_message,
                    occurrence_count: e.occurrence_count,
                    first_seen: e.first_seen.to_rfc3339(),
                    last_seen: e.last_seen.to_rfc3339(),
                    status: e.status,
                    sample_log_id: e.sample_log_id,
                })
                .collect(),
        }))
    }

    async fn get_usage_stats(
        &self,
        request: Request<GetUsageStatsRequest>,
    ) -> Result<Response<GetUsageStatsResponse>, Status> {
        let req = request.into_inner();
        let snapshot = cached::usage_stats(&self.kv, req.project_id)
            .await
            .map_err(error_to_status)?;

        Ok(Response::new(GetUsageStatsResponse {
            project_id: req.project_id,
            usage: snapshot
                .usage
                .into_iter()
                .map(|p| UsagePoint {
                    date: p.date.to_string(),
                    log_count: p.log_count,
                    daily_quota: p.daily_quota,
                    quota_used_percent: p.quota_used_percent,
                })
                .collect(),
        }))
    }
}
