//! Available-routes discovery: merge the endpoint paths observed in recent
//! logs into each project's `available_routes`.

use chrono::{Duration, Utc};
use sqlx::PgPool;

use ledger_domain::{Error, Result};

const LOOKBACK_HOURS: i64 = 24;

pub async fn update_available_routes(pool: &PgPool) -> Result<()> {
    let since = Utc::now() - Duration::hours(LOOKBACK_HOURS);
    let rows: Vec<(i64, String)> = sqlx::query_as(
        "SELECT DISTINCT project_id, attributes->'endpoint'->>'path' AS route
         FROM logs
         WHERE log_type = 'endpoint'
           AND timestamp >= $1
           AND attributes->'endpoint'->>'path' IS NOT NULL
         ORDER BY project_id",
    )
    .bind(since)
    .fetch_all(pool)
    .await
    .map_err(Error::db)?;

    let mut current: Option<(i64, Vec<String>)> = None;
    let mut flushes = 0usize;
    for (project_id, route) in rows {
        match &mut current {
            Some((pid, routes)) if *pid == project_id => routes.push(route),
            _ => {
                if let Some((pid, routes)) = current.take() {
                    merge_routes(pool, pid, &routes).await?;
                    flushes += 1;
                }
                current = Some((project_id, vec![route]));
            }
        }
    }
    if let Some((pid, routes)) = current.take() {
        merge_routes(pool, pid, &routes).await?;
        flushes += 1;
    }

    tracing::info!(projects = flushes, "available routes updated");
    Ok(())
}

async fn merge_routes(pool: &PgPool, project_id: i64, routes: &[String]) -> Result<()> {
    sqlx::query(
        "UPDATE projects SET
             available_routes = (
                 SELECT ARRAY(
                     SELECT DISTINCT r
                     FROM UNNEST(available_routes || $2::text[]) AS r
                     ORDER BY r
                 )
             ),
             updated_at = NOW()
         WHERE id = $1",
    )
    .bind(project_id)
    .bind(routes)
    .execute(pool)
    .await
    .map_err(Error::db)?;
    Ok(())
}
