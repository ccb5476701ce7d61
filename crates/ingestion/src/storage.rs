//! Batch persistence: one transaction per pop batch — bulk log insert,
//! grouped error-group upserts, daily-usage upsert.

use std::collections::HashSet;

use chrono::NaiveDate;
use sqlx::PgPool;

use ledger_domain::log::QueuedLog;
use ledger_domain::{Error, Result};
use ledger_store::partitions;

/// In-batch rollup for one (project, fingerprint).
#[derive(Debug, Clone, PartialEq)]
pub struct FingerprintGroup {
    pub fingerprint: String,
    pub error_type: String,
    pub error_message: Option<String>,
    pub first_seen: chrono::DateTime<chrono::Utc>,
    pub last_seen: chrono::DateTime<chrono::Utc>,
    pub count: i64,
    pub sample_stack_trace: Option<String>,
}

/// Group a batch by fingerprint so each group becomes one upsert whose
/// increment equals the number of committed events.
pub fn group_fingerprints(logs: &[QueuedLog]) -> Vec<FingerprintGroup> {
    let mut groups: Vec<FingerprintGroup> = Vec::new();
    for log in logs {
        let Some(fingerprint) = &log.error_fingerprint else {
            continue;
        };
        match groups.iter_mut().find(|g| &g.fingerprint == fingerprint) {
            Some(group) => {
                group.count += 1;
                if log.timestamp < group.first_seen {
                    group.first_seen = log.timestamp;
                }
                if log.timestamp > group.last_seen {
                    group.last_seen = log.timestamp;
                }
            }
            None => groups.push(FingerprintGroup {
                fingerprint: fingerprint.clone(),
                error_type: log
                    .error_type
                    .clone()
                    .unwrap_or_else(|| "UnknownError".into()),
                error_message: log.error_message.clone(),
                first_seen: log.timestamp,
                last_seen: log.timestamp,
                count: 1,
                sample_stack_trace: log.stack_trace.clone(),
            }),
        }
    }
    groups
}

/// The distinct partition days a batch will land in.
pub fn partition_dates(logs: &[QueuedLog]) -> Vec<NaiveDate> {
    let mut dates: HashSet<NaiveDate> = HashSet::new();
    for log in logs {
        dates.insert(log.timestamp.date_naive());
    }
    let mut dates: Vec<_> = dates.into_iter().collect();
    dates.sort();
    dates
}

/// Persist one batch for one project.
///
/// Partitions are ensured outside the transaction (DDL must survive a
/// rollback of the data writes), then the inserts and upserts commit
/// atomically.
pub async fn persist_batch(pool: &PgPool, project_id: i64, logs: &[QueuedLog]) -> Result<()> {
    if logs.is_empty() {
        return Ok(());
    }

    for date in partition_dates(logs) {
        partitions::ensure_partition_for_date(pool, "logs", date).await?;
    }

    let mut tx = pool.begin().await.map_err(Error::db)?;

    // Column-major arrays for a single UNNEST insert.
    let n = logs.len();
    let mut timestamps = Vec::with_capacity(n);
    let mut ingested = Vec::with_capacity(n);
    let mut levels = Vec::with_capacity(n);
    let mut log_types = Vec::with_capacity(n);
    let mut importances = Vec::with_capacity(n);
    let mut environments: Vec<Option<String>> = Vec::with_capacity(n);
    let mut releases: Vec<Option<String>> = Vec::with_capacity(n);
    let mut messages: Vec<Option<String>> = Vec::with_capacity(n);
    let mut error_types: Vec<Option<String>> = Vec::with_capacity(n);
    let mut error_messages: Vec<Option<String>> = Vec::with_capacity(n);
    let mut stack_traces: Vec<Option<String>> = Vec::with_capacity(n);
    let mut attributes: Vec<Option<serde_json::Value>> = Vec::with_capacity(n);
    let mut sdk_versions: Vec<Option<String>> = Vec::with_capacity(n);
    let mut platforms: Vec<Option<String>> = Vec::with_capacity(n);
    let mut platform_versions: Vec<Option<String>> = Vec::with_capacity(n);
    let mut processing_times: Vec<Option<i16>> = Vec::with_capacity(n);
    let mut fingerprints: Vec<Option<String>> = Vec::with_capacity(n);

    for log in logs {
        timestamps.push(log.timestamp);
        ingested.push(log.ingested_at);
        levels.push(log.level.as_str().to_string());
        log_types.push(log.log_type.as_str().to_string());
        importances.push(log.importance.as_str().to_string());
        environments.push(log.environment.clone());
        releases.push(log.release.clone());
        messages.push(log.message.clone());
        error_types.push(log.error_type.clone());
        error_messages.push(log.error_message.clone());
        stack_traces.push(log.stack_trace.clone());
        attributes.push(log.attributes.clone());
        sdk_versions.push(log.sdk_version.clone());
        platforms.push(log.platform.clone());
        platform_versions.push(log.platform_version.clone());
        processing_times.push(log.processing_time_ms);
        fingerprints.push(log.error_fingerprint.clone());
    }

    sqlx::query(
        "INSERT INTO logs
             (project_id, timestamp, ingested_at, level, log_type, importance,
              environment, release, message, error_type, error_message, stack_trace,
              attributes, sdk_version, platform, platform_version,
              processing_time_ms, error_fingerprint)
         SELECT $1, * FROM UNNEST(
             $2::timestamptz[], $3::timestamptz[], $4::text[], $5::text[], $6::text[],
             $7::text[], $8::text[], $9::text[], $10::text[], $11::text[], $12::text[],
             $13::jsonb[], $14::text[], $15::text[], $16::text[],
             $17::smallint[], $18::text[])",
    )
    .bind(project_id)
    .bind(&timestamps)
    .bind(&ingested)
    .bind(&levels)
    .bind(&log_types)
    .bind(&importances)
    .bind(&environments)
    .bind(&releases)
    .bind(&messages)
    .bind(&error_types)
    .bind(&error_messages)
    .bind(&stack_traces)
    .bind(&attributes)
    .bind(&sdk_versions)
    .bind(&platforms)
    .bind(&platform_versions)
    .bind(&processing_times)
    .bind(&fingerprints)
    .execute(&mut *tx)
    .await
    .map_err(Error::db)?;

    for group in group_fingerprints(logs) {
        sqlx::query(
            "INSERT INTO error_groups
                 (project_id, fingerprint, error_type, error_message,
                  first_seen, last_seen, occurrence_count, sample_stack_trace)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (project_id, fingerprint) DO UPDATE SET
                 last_seen = GREATEST(error_groups.last_seen, EXCLUDED.last_seen),
                 occurrence_count = error_groups.occurrence_count + EXCLUDED.occurrence_count,
                 error_message = EXCLUDED.error_message,
                 updated_at = NOW()",
        )
        .bind(project_id)
        .bind(&group.fingerprint)
        .bind(&group.error_type)
        .bind(&group.error_message)
        .bind(group.first_seen)
        .bind(group.last_seen)
        .bind(group.count)
        .bind(&group.sample_stack_trace)
        .execute(&mut *tx)
        .await
        .map_err(Error::db)?;
    }

    // Per-day ingested counts for the usage table.
    for date in partition_dates(logs) {
        let count = logs
            .iter()
            .filter(|l| l.timestamp.date_naive() == date)
            .count() as i64;
        sqlx::query(
            "INSERT INTO daily_usage (project_id, date, logs_ingested)
             VALUES ($1, $2, $3)
             ON CONFLICT (project_id, date) DO UPDATE SET
                 logs_ingested = daily_usage.logs_ingested + EXCLUDED.logs_ingested,
                 updated_at = NOW()",
        )
        .bind(project_id)
        .bind(date)
        .bind(count)
        .execute(&mut *tx)
        .await
        .map_err(Error::db)?;
    }

    tx.commit().await.map_err(Error::db)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use ledger_domain::log::{Importance, LogLevel, LogType};

    fn log(fingerprint: Option<&str>, hours_ago: i64) -> QueuedLog {
        let ts = Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap() - Duration::hours(hours_ago);
        QueuedLog {
            project_id: 1,
            timestamp: ts,
            ingested_at: ts,
            level: LogLevel::Error,
            log_type: LogType::Exception,
            importance: Importance::Standard,
            environment: None,
            release: None,
            message: None,
            error_type: Some("ValueError".into()),
            error_message: Some("bad".into()),
            stack_trace: Some("at foo".into()),
            attributes: None,
            sdk_version: None,
            platform: None,
            platform_version: None,
            processing_time_ms: None,
            error_fingerprint: fingerprint.map(|f| f.repeat(64 / f.len())),
        }
    }

    #[test]
    fn grouping_counts_per_fingerprint() {
        let logs = vec![log(Some("a"), 0), log(Some("a"), 1), log(Some("b"), 2)];
        let groups = group_fingerprints(&logs);
        assert_eq!(groups.len(), 2);
        let a = groups.iter().find(|g| g.fingerprint.starts_with('a')).unwrap();
        assert_eq!(a.count, 2);
        let b = groups.iter().find(|g| g.fingerprint.starts_with('b')).unwrap();
        assert_eq!(b.count, 1);
    }

    #[test]
    fn grouping_tracks_first_and_last_seen() {
        let logs = vec![log(Some("a"), 5), log(Some("a"), 1), log(Some("a"), 3)];
        let groups = group_fingerprints(&logs);
        assert_eq!(groups.len(), 1);
        assert!(groups[0].first_seen < groups[0].last_seen);
        assert_eq!(groups[0].count, 3);
    }

    #[test]
    fn logs_without_fingerprints_are_skipped() {
        let logs = vec![log(None, 0), log(None, 1)];
        assert!(group_fingerprints(&logs).is_empty());
    }

    #[test]
    fn partition_dates_are_distinct_and_sorted() {
        let logs = vec![log(None, 0), log(None, 1), log(None, 30)];
        let dates = partition_dates(&logs);
        assert_eq!(dates.len(), 2);
        assert!(dates[0] < dates[1]);
    }
}
