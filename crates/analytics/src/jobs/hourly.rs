//! Hourly rollups into `aggregated_metrics` for the previous completed
//! hour. All three are single INSERT ... SELECT ... ON CONFLICT statements,
//! so re-running an hour overwrites the same buckets (idempotent).

use chrono::Utc;
use sqlx::PgPool;

use ledger_domain::{Error, Result};

const ON_CONFLICT: &str = "ON CONFLICT (
        project_id, date, hour, metric_type,
        COALESCE(endpoint_method, ''), COALESCE(endpoint_path, ''),
        COALESCE(log_level, ''), COALESCE(log_type, '')
    )";

pub async fn aggregate_hourly_metrics(pool: &PgPool) -> Result<()> {
    let (start, end, date, hour) = super::previous_hour(Utc::now());
    tracing::info!(%date, hour, "starting hourly aggregation");

    endpoint_metrics(pool, &date, hour, start, end).await?;
    exception_metrics(pool, &date, hour, start, end).await?;
    log_volume_metrics(pool, &date, hour, start, end).await?;
    Ok(())
}

async fn endpoint_metrics(
    pool: &PgPool,
    date: &str,
    hour: i16,
    start: chrono::DateTime<Utc>,
    end: chrono::DateTime<Utc>,
) -> Result<()> {
    let sql = format!(
        "INSERT INTO aggregated_metrics (
            project_id, date, hour, metric_type, endpoint_method, endpoint_path,
            log_level, log_type, log_count, error_count,
            avg_duration_ms, min_duration_ms, max_duration_ms,
            p95_duration_ms, p99_duration_ms
        )
        SELECT
            project_id,
            $1 AS date,
            $2 AS hour,
            'endpoint' AS metric_type,
            (attributes->'endpoint'->>'method')::VARCHAR AS endpoint_method,
            (attributes->'endpoint'->>'path')::VARCHAR AS endpoint_path,
            NULL AS log_level,
            NULL AS log_type,
            COUNT(*) AS log_count,
            COUNT(*) FILTER (
                WHERE (attributes->'endpoint'->>'status_code')::INTEGER >= 400
            ) AS error_count,
            AVG((attributes->'endpoint'->>'duration_ms')::FLOAT) AS avg_duration_ms,
            ROUND(MIN((attributes->'endpoint'->>'duration_ms')::FLOAT))::INTEGER AS min_duration_ms,
            ROUND(MAX((attributes->'endpoint'->>'duration_ms')::FLOAT))::INTEGER AS max_duration_ms,
            ROUND(PERCENTILE_CONT(0.95) WITHIN GROUP (
                ORDER BY (attributes->'endpoint'->>'duration_ms')::FLOAT
            ))::INTEGER AS p95_duration_ms,
            ROUND(PERCENTILE_CONT(0.99) WITHIN GROUP (
                ORDER BY (attributes->'endpoint'->>'duration_ms')::FLOAT
            ))::INTEGER AS p99_duration_ms
        FROM logs
        WHERE log_type = 'endpoint'
          AND timestamp >= $3 AND timestamp < $4
          AND attributes->'endpoint'->>'method' IS NOT NULL
          AND attributes->'endpoint'->>'path' IS NOT NULL
        GROUP BY project_id, attributes->'endpoint'->>'method', attributes->'endpoint'->>'path'
        {ON_CONFLICT}
        DO UPDATE SET
            log_count = EXCLUDED.log_count,
            error_count = EXCLUDED.error_count,
            avg_duration_ms = EXCLUDED.avg_duration_ms,
            min_duration_ms = EXCLUDED.min_duration_ms,
            max_duration_ms = EXCLUDED.max_duration_ms,
            p95_duration_ms = EXCLUDED.p95_duration_ms,
            p99_duration_ms = EXCLUDED.p99_duration_ms,
            updated_at = NOW()"
    );

    let result = sqlx::query(&sql)
        .bind(date)
        .bind(hour)
        .bind(start)
        .bind(end)
        .execute(pool)
        .await
        .map_err(Error::db)?;
    tracing::info!(date, hour, rows = result.rows_affected(), "endpoint metrics aggregated");
    Ok(())
}

async fn exception_metrics(
    pool: &PgPool,
    date: &str,
    hour: i16,
    start: chrono::DateTime<Utc>,
    end: chrono::DateTime<Utc>,
) -> Result<()> {
    let sql = format!(
        "INSERT INTO aggregated_metrics (
            project_id, date, hour, metric_type, endpoint_method, endpoint_path,
            log_level, log_type, log_count, error_count
        )
        SELECT
            project_id, $1, $2, 'exception', NULL, NULL, NULL, NULL,
            COUNT(*), COUNT(*)
        FROM logs
        WHERE log_type = 'exception'
          AND timestamp >= $3 AND timestamp < $4
        GROUP BY project_id
        {ON_CONFLICT}
        DO UPDATE SET
            log_count = EXCLUDED.log_count,
            error_count = EXCLUDED.error_count,
            updated_at = NOW()"
    );

    let result = sqlx::query(&sql)
        .bind(date)
        .bind(hour)
        .bind(start)
        .bind(end)
        .execute(pool)
        .await
        .map_err(Error::db)?;
    tracing::info!(date, hour, rows = result.rows_affected(), "exception metrics aggregated");
    Ok(())
}

async fn log_volume_metrics(
    pool: &PgPool,
    date: &str,
    hour: i16,
    start: chrono::DateTime<Utc>,
    end: chrono::DateTime<Utc>,
) -> Result<()> {
    let sql = format!(
        "INSERT INTO aggregated_metrics (
            project_id, date, hour, metric_type, endpoint_method, endpoint_path,
            log_level, log_type, log_count, error_count
        )
        SELECT
            project_id, $1, $2, 'log_volume', NULL, NULL, level, log_type,
            COUNT(*),
            COUNT(*) FILTER (WHERE level IN ('error', 'critical'))
        FROM logs
        WHERE timestamp >= $3 AND timestamp < $4
        GROUP BY project_id, level, log_type
        {ON_CONFLICT}
        DO UPDATE SET
            log_count = EXCLUDED.log_count,
            error_count = EXCLUDED.error_count,
            updated_at = NOW()"
    );

    let result = sqlx::query(&sql)
        .bind(date)
        .bind(hour)
        .bind(start)
        .bind(end)
        .execute(pool)
        .await
        .map_err(Error::db)?;
    tracing::info!(date, hour, rows = result.rows_affected(), "log volume metrics aggregated");
    Ok(())
}
