//! Per-project route bottleneck rollups for the previous completed hour.
//! Every configured route gets a row — zero-filled when the hour had no
//! traffic — and projects without configured routes are skipped.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use ledger_domain::{Error, Result};

#[derive(Debug, Clone, sqlx::FromRow)]
struct RouteMetrics {
    route: String,
    log_count: i64,
    min_duration_ms: Option<i32>,
    max_duration_ms: Option<i32>,
    avg_duration_ms: Option<f64>,
    median_duration_ms: Option<i32>,
}

pub async fn aggregate_bottleneck_metrics(pool: &PgPool) -> Result<()> {
    let (start, end, date, hour) = super::previous_hour(Utc::now());

    let active: Vec<(i64,)> = sqlx::query_as(
        "SELECT DISTINCT project_id FROM logs
         WHERE timestamp >= $1 AND timestamp < $2
         ORDER BY project_id",
    )
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await
    .map_err(Error::db)?;

    if active.is_empty() {
        tracing::info!(%date, hour, "no projects with logs in the previous hour");
        return Ok(());
    }

    for (project_id,) in active {
        // One slow or failing project must not sink the whole run.
        if let Err(e) = aggregate_project(pool, project_id, &date, hour, start, end).await {
            tracing::error!(project_id, error = %e, "bottleneck aggregation failed for project");
        }
    }
    Ok(())
}

async fn aggregate_project(
    pool: &PgPool,
    project_id: i64,
    date: &str,
    hour: i16,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<()> {
    let routes: Option<Vec<String>> =
        sqlx::query_scalar("SELECT available_routes FROM projects WHERE id = $1")
            .bind(project_id)
            .fetch_optional(pool)
            .await
            .map_err(Error::db)?;

    let routes = routes.unwrap_or_default();
    if routes.is_empty() {
        tracing::debug!(project_id, "no available_routes configured, skipping");
        return Ok(());
    }

    let measured = sqlx::query_as::<_, RouteMetrics>(
        "SELECT
            (attributes->'endpoint'->>'path')::VARCHAR AS route,
            COUNT(*) AS log_count,
            ROUND(MIN((attributes->'endpoint'->>'duration_ms')::FLOAT))::INTEGER AS min_duration_ms,
            ROUND(MAX((attributes->'endpoint'->>'duration_ms')::FLOAT))::INTEGER AS max_duration_ms,
            AVG((attributes->'endpoint'->>'duration_ms')::FLOAT) AS avg_duration_ms,
            ROUND(PERCENTILE_CONT(0.5) WITHIN GROUP (
                ORDER BY (attributes->'endpoint'->>'duration_ms')::FLOAT
            ))::INTEGER AS median_duration_ms
         FROM logs
         WHERE project_id = $1
           AND log_type = 'endpoint'
           AND timestamp >= $2 AND timestamp < $3
           AND attributes->'endpoint'->>'path' IS NOT NULL
           AND attributes->'endpoint'->>'duration_ms' IS NOT NULL
         GROUP BY attributes->'endpoint'->>'path'",
    )
    .bind(project_id)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await
    .map_err(Error::db)?;

    let mut with_data = 0usize;
    for route in &routes {
        let metrics = measured.iter().find(|m| &m.route == route);
        if metrics.is_some() {
            with_data += 1;
        }
        sqlx::query(
            "INSERT INTO bottleneck_metrics (
                project_id, date, hour, route, log_count,
                min_duration_ms, max_duration_ms, avg_duration_ms, median_duration_ms
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (project_id, date, hour, route)
            DO UPDATE SET
                log_count = EXCLUDED.log_count,
                min_duration_ms = EXCLUDED.min_duration_ms,
                max_duration_ms = EXCLUDED.max_duration_ms,
                avg_duration_ms = EXCLUDED.avg_duration_ms,
                median_duration_ms = EXCLUDED.median_duration_ms,
                updated_at = NOW()",
        )
        .bind(project_id)
        .bind(date)
        .bind(hour)
        .bind(route)
        .bind(metrics.map_or(0, |m| m.log_count))
        .bind(metrics.and_then(|m| m.min_duration_ms).unwrap_or(0))
        .bind(metrics.and_then(|m| m.max_duration_ms).unwrap_or(0))
        .bind(metrics.and_then(|m| m.avg_duration_ms).unwrap_or(0.0))
        .bind(metrics.and_then(|m| m.median_duration_ms).unwrap_or(0))
        .execute(pool)
        .await
        .map_err(Error::db)?;
    }

    tracing::info!(
        project_id,
        routes = routes.len(),
        with_data,
        "bottleneck metrics aggregated"
    );
    Ok(())
}
