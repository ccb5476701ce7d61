//! Row types shared by the ingestion, query and analytics services.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// One row of the partitioned `logs` table.
#[derive(Debug, Clone, FromRow)]
pub struct LogRow {
    pub id: i64,
    pub project_id: i64,
    pub timestamp: DateTime<Utc>,
    pub ingested_at: DateTime<Utc>,
    pub level: String,
    pub log_type: String,
    pub importance: String,
    pub environment: Option<String>,
    pub release: Option<String>,
    pub message: Option<String>,
    pub error_type: Option<String>,
    pub error_message: Option<String>,
    pub stack_trace: Option<String>,
    pub attributes: Option<serde_json::Value>,
    pub sdk_version: Option<String>,
    pub platform: Option<String>,
    pub platform_version: Option<String>,
    pub processing_time_ms: Option<i16>,
    pub error_fingerprint: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ErrorGroupRow {
    pub id: i64,
    pub project_id: i64,
    pub fingerprint: String,
    pub error_type: String,
    pub error_message: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub occurrence_count: i64,
    pub status: String,
    pub sample_log_id: Option<i64>,
    pub sample_stack_trace: Option<String>,
}

/// One bucket of the `aggregated_metrics` table.
#[derive(Debug, Clone, FromRow)]
pub struct AggregatedMetricRow {
    pub date: String,
    pub hour: Option<i16>,
    pub endpoint_method: Option<String>,
    pub endpoint_path: Option<String>,
    pub log_level: Option<String>,
    pub log_type: Option<String>,
    pub log_count: i64,
    pub error_count: i64,
    pub avg_duration_ms: Option<f64>,
    pub min_duration_ms: Option<i32>,
    pub max_duration_ms: Option<i32>,
    pub p95_duration_ms: Option<i32>,
    pub p99_duration_ms: Option<i32>,
}
