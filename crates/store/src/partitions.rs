//! Time-range partition management for the `logs` table.
//!
//! One child partition per calendar day. Creation is idempotent and safe
//! under concurrent callers: `IF NOT EXISTS` plus treating Postgres's
//! duplicate-table error as success, since workers and the scheduler race
//! for the same dates as a matter of course.

use chrono::{Duration, Months, NaiveDate, Utc};
use sqlx::PgPool;

use ledger_domain::{Error, Result};

/// Child table name for one day, e.g. `logs_p20250115`.
pub fn partition_name(table: &str, date: NaiveDate) -> String {
    format!("{table}_p{}", date.format("%Y%m%d"))
}

/// DDL creating the child partition covering `[date, date+1)`.
pub fn partition_ddl(table: &str, date: NaiveDate) -> String {
    let name = partition_name(table, date);
    let from = date.format("%Y-%m-%d");
    let to = (date + Duration::days(1)).format("%Y-%m-%d");
    format!(
        "CREATE TABLE IF NOT EXISTS {name} PARTITION OF {table} \
         FOR VALUES FROM ('{from}') TO ('{to}')"
    )
}

fn is_duplicate_table(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == "42P07")
}

/// Ensure the partition covering `date` exists. "Already exists" — whether
/// via `IF NOT EXISTS` or a lost creation race — is success.
pub async fn ensure_partition_for_date(pool: &PgPool, table: &str, date: NaiveDate) -> Result<()> {
    let ddl = partition_ddl(table, date);
    match sqlx::query(&ddl).execute(pool).await {
        Ok(_) => Ok(()),
        Err(e) if is_duplicate_table(&e) => Ok(()),
        Err(e) => Err(Error::db(e)),
    }
}

/// All dates from `start` up to (not including) `start + months`.
pub fn dates_ahead(start: NaiveDate, months: u32) -> Vec<NaiveDate> {
    let end = start + Months::new(months);
    let mut dates = Vec::new();
    let mut current = start;
    while current < end {
        dates.push(current);
        current += Duration::days(1);
    }
    dates
}

/// Pre-create daily partitions for the next `months_ahead` months.
pub async fn ensure_months_ahead(pool: &PgPool, table: &str, months_ahead: u32) -> Result<()> {
    let today = Utc::now().date_naive();
    let dates = dates_ahead(today, months_ahead);
    let total = dates.len();
    for date in dates {
        ensure_partition_for_date(pool, table, date).await?;
    }
    tracing::info!(table, months_ahead, partitions = total, "partitions ensured");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn partition_name_format() {
        assert_eq!(partition_name("logs", date(2025, 1, 15)), "logs_p20250115");
        assert_eq!(partition_name("logs", date(2025, 11, 3)), "logs_p20251103");
    }

    #[test]
    fn partition_ddl_covers_one_day() {
        let ddl = partition_ddl("logs", date(2025, 1, 15));
        assert!(ddl.contains("CREATE TABLE IF NOT EXISTS logs_p20250115"));
        assert!(ddl.contains("FROM ('2025-01-15') TO ('2025-01-16')"));
    }

    #[test]
    fn partition_ddl_crosses_month_boundary() {
        let ddl = partition_ddl("logs", date(2025, 1, 31));
        assert!(ddl.contains("FROM ('2025-01-31') TO ('2025-02-01')"));
    }

    #[test]
    fn dates_ahead_spans_whole_months() {
        let dates = dates_ahead(date(2025, 1, 1), 1);
        assert_eq!(dates.len(), 31);
        assert_eq!(dates[0], date(2025, 1, 1));
        assert_eq!(*dates.last().unwrap(), date(2025, 1, 31));
    }

    #[test]
    fn dates_ahead_six_months_is_half_a_year() {
        let dates = dates_ahead(date(2025, 1, 1), 6);
        // Jan..Jun 2025 = 31+28+31+30+31+30
        assert_eq!(dates.len(), 181);
    }
}
