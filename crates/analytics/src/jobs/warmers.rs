//! Cache warmers: per-project snapshots the query service reads directly.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

use ledger_domain::{Error, Result};
use ledger_kv::metrics_cache::{
    self, ErrorRatePoint, ErrorRateSnapshot, LogVolumePoint, LogVolumeSnapshot, TopErrorEntry,
    TopErrorsSnapshot, UsagePoint, UsageStatsSnapshot,
};
use ledger_kv::KvStore;

/// Error/critical counts over the last hour in 5-minute buckets.
pub async fn warm_error_rate(pool: &PgPool, kv: &KvStore, ttl_secs: u64) -> Result<()> {
    let since = Utc::now() - Duration::hours(1);
    let rows: Vec<(i64, DateTime<Utc>, i64, i64)> = sqlx::query_as(
        "SELECT
            project_id,
            to_timestamp(floor(extract(epoch FROM timestamp) / 300) * 300) AS bucket,
            COUNT(*) FILTER (WHERE level = 'error') AS error_count,
            COUNT(*) FILTER (WHERE level = 'critical') AS critical_count
         FROM logs
         WHERE timestamp >= $1 AND level IN ('error', 'critical')
         GROUP BY project_id, bucket
         ORDER BY project_id, bucket",
    )
    .bind(since)
    .fetch_all(pool)
    .await
    .map_err(Error::db)?;

    let mut per_project: BTreeMap<i64, Vec<ErrorRatePoint>> = BTreeMap::new();
    for (project_id, bucket, error_count, critical_count) in rows {
        per_project.entry(project_id).or_default().push(ErrorRatePoint {
            timestamp: bucket,
            error_count,
            critical_count,
        });
    }

    let projects = per_project.len();
    for (project_id, data) in per_project {
        let snapshot = ErrorRateSnapshot { data };
        metrics_cache::write(
            kv,
            &metrics_cache::error_rate_key(project_id, "5min"),
            &snapshot,
            ttl_secs,
        )
        .await?;
    }
    tracing::debug!(projects, "error rate cache warmed");
    Ok(())
}

/// Per-level counts over the last 24 hours in hourly buckets.
pub async fn warm_log_volume(pool: &PgPool, kv: &KvStore, ttl_secs: u64) -> Result<()> {
    let since = Utc::now() - Duration::hours(24);
    let rows: Vec<(i64, DateTime<Utc>, String, i64)> = sqlx::query_as(
        "SELECT project_id, date_trunc('hour', timestamp) AS bucket, level, COUNT(*)
         FROM logs
         WHERE timestamp >= $1
         GROUP BY project_id, bucket, level
         ORDER BY project_id, bucket",
    )
    .bind(since)
    .fetch_all(pool)
    .await
    .map_err(Error::db)?;

    let mut per_project: BTreeMap<i64, BTreeMap<DateTime<Utc>, LogVolumePoint>> = BTreeMap::new();
    for (project_id, bucket, level, count) in rows {
        let point = per_project
            .entry(project_id)
            .or_default()
            .entry(bucket)
            .or_insert_with(|| LogVolumePoint {
                timestamp: bucket,
                debug: 0,
                info: 0,
                warning: 0,
                error: 0,
                critical: 0,
            });
        match level.as_str() {
            "debug" => point.debug += count,
            "info" => point.info += count,
            "warning" => point.warning += count,
            "error" => point.error += count,
            "critical" => point.critical += count,
            _ => {}
        }
    }

    let projects = per_project.len();
    for (project_id, buckets) in per_project {
        let snapshot = LogVolumeSnapshot {
            data: buckets.into_values().collect(),
        };
        metrics_cache::write(
            kv,
            &metrics_cache::log_volume_key(project_id, "1hour"),
            &snapshot,
            ttl_secs,
        )
        .await?;
    }
    tracing::debug!(projects, "log volume cache warmed");
    Ok(())
}

const TOP_ERRORS_PER_PROJECT: i64 = 50;

/// The most frequent error groups per project.
pub async fn warm_top_errors(pool: &PgPool, kv: &KvStore, ttl_secs: u64) -> Result<()> {
    let rows: Vec<(
        i64,
        String,
        String,
        Option<String>,
        i64,
        DateTime<Utc>,
        DateTime<Utc>,
        String,
        Option<i64>,
    )> = sqlx::query_as(
        "SELECT project_id, fingerprint, error_type, error_message,
                occurrence_count, first_seen, last_seen, status, sample_log_id
         FROM (
             SELECT *, ROW_NUMBER() OVER (
                 PARTITION BY project_id ORDER BY occurrence_count DESC
             ) AS rank
             FROM error_groups
         ) ranked
         WHERE rank <= $1
         ORDER BY project_id, occurrence_count DESC",
    )
    .bind(TOP_ERRORS_PER_PROJECT)
    .fetch_all(pool)
    .await
    .map_err(Error::db)?;

    let mut per_project: BTreeMap<i64, Vec<TopErrorEntry>> = BTreeMap::new();
    for (project_id, fingerprint, error_type, error_message, count, first, last, status, sample) in
        rows
    {
        per_project.entry(project_id).or_default().push(TopErrorEntry {
            fingerprint: fingerprint.trim().to_string(),
            error_type,
            error_message,
            occurrence_count: count,
            first_seen: first,
            last_seen: last,
            status,
            sample_log_id: sample,
        });
    }

    let projects = per_project.len();
    for (project_id, errors) in per_project {
        let snapshot = TopErrorsSnapshot { errors };
        metrics_cache::write(
            kv,
            &metrics_cache::top_errors_key(project_id),
            &snapshot,
            ttl_secs,
        )
        .await?;
    }
    tracing::debug!(projects, "top errors cache warmed");
    Ok(())
}

const USAGE_WINDOW_DAYS: i64 = 30;

/// Daily ingestion counts against the project quota, last 30 days.
pub async fn warm_usage_stats(pool: &PgPool, kv: &KvStore, ttl_secs: u64) -> Result<()> {
    let since = (Utc::now() - Duration::days(USAGE_WINDOW_DAYS)).date_naive();
    let rows: Vec<(i64, chrono::NaiveDate, i64, i64)> = sqlx::query_as(
        "SELECT u.project_id, u.date, u.logs_ingested, p.daily_quota
         FROM daily_usage u
         JOIN projects p ON p.id = u.project_id
         WHERE u.date >= $1
         ORDER BY u.project_id, u.date",
    )
    .bind(since)
    .fetch_all(pool)
    .await
    .map_err(Error::db)?;

    let mut per_project: BTreeMap<i64, (i64, Vec<UsagePoint>)> = BTreeMap::new();
    for (project_id, date, logs_ingested, daily_quota) in rows {
        let quota_used_percent = if daily_quota > 0 {
            (logs_ingested as f64 / daily_quota as f64) * 100.0
        } else {
            0.0
        };
        let entry = per_project.entry(project_id).or_insert((daily_quota, Vec::new()));
        entry.1.push(UsagePoint {
            date,
            log_count: logs_ingested,
            daily_quota,
            quota_used_percent,
        });
    }

    let projects = per_project.len();
    for (project_id, (daily_quota, usage)) in per_project {
        let snapshot = UsageStatsSnapshot { usage, daily_quota };
        metrics_cache::write(
            kv,
            &metrics_cache::usage_stats_key(project_id),
            &snapshot,
            ttl_secs,
        )
        .await?;
    }
    tracing::debug!(projects, "usage stats cache warmed");
    Ok(())
}
