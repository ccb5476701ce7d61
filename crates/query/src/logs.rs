//! Raw log access: filtered queries, substring search, point lookups and
//! the error list. All listings are newest-first with offset/limit
//! pagination and report the total plus a has-more flag.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use ledger_domain::{Error, Result};
use ledger_store::rows::LogRow;

const LOG_COLUMNS: &str = "id, project_id, timestamp, ingested_at, level, log_type, importance, \
                           environment, release, message, error_type, error_message, stack_trace, \
                           attributes, sdk_version, platform, platform_version, \
                           processing_time_ms, error_fingerprint";

#[derive(Debug, Clone, Default)]
pub struct LogFilters {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub level: Option<String>,
    pub log_type: Option<String>,
    pub environment: Option<String>,
    pub error_fingerprint: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: 100,
            offset: 0,
        }
    }
}

impl Pagination {
    /// Clamp wire values to sane bounds.
    pub fn clamped(limit: u32, offset: u32) -> Self {
        Self {
            limit: (limit as i64).clamp(1, 1000),
            offset: offset as i64,
        }
    }
}

#[derive(Debug)]
pub struct LogsPage {
    pub logs: Vec<LogRow>,
    pub total: i64,
    pub has_more: bool,
}

fn page(logs: Vec<LogRow>, total: i64, pagination: Pagination) -> LogsPage {
    let has_more = pagination.offset + logs.len() as i64 < total;
    LogsPage {
        logs,
        total,
        has_more,
    }
}

pub async fn query_logs(
    pool: &PgPool,
    project_id: i64,
    filters: &LogFilters,
    pagination: Pagination,
) -> Result<LogsPage> {
    const WHERE: &str = "project_id = $1
        AND ($2::timestamptz IS NULL OR timestamp >= $2)
        AND ($3::timestamptz IS NULL OR timestamp <= $3)
        AND ($4::text IS NULL OR level = $4)
        AND ($5::text IS NULL OR log_type = $5)
        AND ($6::text IS NULL OR environment = $6)
        AND ($7::text IS NULL OR error_fingerprint = $7)";

    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM logs WHERE {WHERE}"))
        .bind(project_id)
        .bind(filters.start_time)
        .bind(filters.end_time)
        .bind(&filters.level)
        .bind(&filters.log_type)
        .bind(&filters.environment)
        .bind(&filters.error_fingerprint)
        .fetch_one(pool)
        .await
        .map_err(Error::db)?;

    let logs = sqlx::query_as::<_, LogRow>(&format!(
        "SELECT {LOG_COLUMNS} FROM logs WHERE {WHERE}
         ORDER BY timestamp DESC LIMIT $8 OFFSET $9"
    ))
    .bind(project_id)
    .bind(filters.start_time)
    .bind(filters.end_time)
    .bind(&filters.level)
    .bind(&filters.log_type)
    .bind(&filters.environment)
    .bind(&filters.error_fingerprint)
    .bind(pagination.limit)
    .bind(pagination.offset)
    .fetch_all(pool)
    .await
    .map_err(Error::db)?;

    Ok(page(logs, total, pagination))
}

/// Case-insensitive substring search over message, error_message and
/// error_type.
pub async fn search_logs(
    pool: &PgPool,
    project_id: i64,
    query: &str,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    pagination: Pagination,
) -> Result<LogsPage> {
    if query.trim().is_empty() {
        return Err(Error::invalid_input("search query must not be empty"));
    }
    let pattern = format!("%{}%", query.trim());

    const WHERE: &str = "project_id = $1
        AND ($2::timestamptz IS NULL OR timestamp >= $2)
        AND ($3::timestamptz IS NULL OR timestamp <= $3)
        AND (message ILIKE $4 OR error_message ILIKE $4 OR error_type ILIKE $4)";

    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM logs WHERE {WHERE}"))
        .bind(project_id)
        .bind(start_time)
        .bind(end_time)
        .bind(&pattern)
        .fetch_one(pool)
        .await
        .map_err(Error::db)?;

    let logs = sqlx::query_as::<_, LogRow>(&format!(
        "SELECT {LOG_COLUMNS} FROM logs WHERE {WHERE}
         ORDER BY timestamp DESC LIMIT $5 OFFSET $6"
    ))
    .bind(project_id)
    .bind(start_time)
    .bind(end_time)
    .bind(&pattern)
    .bind(pagination.limit)
    .bind(pagination.offset)
    .fetch_all(pool)
    .await
    .map_err(Error::db)?;

    Ok(page(logs, total, pagination))
}

/// The row, iff it belongs to the project.
pub async fn get_log(pool: &PgPool, log_id: i64, project_id: i64) -> Result<LogRow> {
    sqlx::query_as::<_, LogRow>(&format!(
        "SELECT {LOG_COLUMNS} FROM logs WHERE id = $1 AND project_id = $2"
    ))
    .bind(log_id)
    .bind(project_id)
    .fetch_optional(pool)
    .await
    .map_err(Error::db)?
    .ok_or_else(|| Error::not_found("log not found"))
}

/// Error/critical rows over a window, newest first.
pub async fn error_list(
    pool: &PgPool,
    project_id: i64,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    pagination: Pagination,
) -> Result<LogsPage> {
    const WHERE: &str = "project_id = $1
        AND timestamp >= $2 AND timestamp <= $3
        AND level IN ('error', 'critical')";

    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM logs WHERE {WHERE}"))
        .bind(project_id)
        .bind(start_time)
        .bind(end_time)
        .fetch_one(pool)
        .await
        .map_err(Error::db)?;

    let logs = sqlx::query_as::<_, LogRow>(&format!(
        "SELECT {LOG_COLUMNS} FROM logs WHERE {WHERE}
         ORDER BY timestamp DESC LIMIT $4 OFFSET $5"
    ))
    .bind(project_id)
    .bind(start_time)
    .bind(end_time)
    .bind(pagination.limit)
    .bind(pagination.offset)
    .fetch_all(pool)
    .await
    .map_err(Error::db)?;

    Ok(page(logs, total, pagination))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_clamps_limit() {
        let p = Pagination::clamped(0, 10);
        assert_eq!(p.limit, 1);
        let p = Pagination::clamped(5000, 0);
        assert_eq!(p.limit, 1000);
        let p = Pagination::clamped(50, 200);
        assert_eq!((p.limit, p.offset), (50, 200));
    }

    #[test]
    fn has_more_accounts_for_offset() {
        let p = Pagination {
            limit: 10,
            offset: 0,
        };
        assert!(page(Vec::new(), 5, p).total == 5);
        // 10 rows fetched at offset 90 of 100 total: nothing further.
        let p = Pagination {
            limit: 10,
            offset: 90,
        };
        let result = page(Vec::new(), 100, p);
        assert!(result.has_more); // empty page still short of total
    }
}
