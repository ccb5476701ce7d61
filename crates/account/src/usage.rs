//! Daily usage reads for quota displays and billing.

use chrono::NaiveDate;
use sqlx::PgPool;

use ledger_domain::{Error, Result};

#[derive(Debug, Clone, Default)]
pub struct DailyUsage {
    pub logs_ingested: i64,
    pub logs_queried: i64,
    pub storage_bytes: i64,
}

/// Usage for one (project, calendar-day). Missing rows read as zeros.
pub async fn get(pool: &PgPool, project_id: i64, date: NaiveDate) -> Result<DailyUsage> {
    let row: Option<(i64, i64, i64)> = sqlx::query_as(
        "SELECT logs_ingested, logs_queried, storage_bytes
         FROM daily_usage WHERE project_id = $1 AND date = $2",
    )
    .bind(project_id)
    .bind(date)
    .fetch_optional(pool)
    .await
    .map_err(Error::db)?;

    Ok(row
        .map(|(logs_ingested, logs_queried, storage_bytes)| DailyUsage {
            logs_ingested,
            logs_queried,
            storage_bytes,
        })
        .unwrap_or_default())
}
