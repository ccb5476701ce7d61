//! Cache-backed metric readers. These never touch SQL: a cold cache means
//! empty data, and the analytics warmers repopulate on their own schedule.

use chrono::{DateTime, Utc};

use ledger_domain::Result;
use ledger_kv::metrics_cache::{
    self, ErrorRateSnapshot, LogVolumeSnapshot, TopErrorsSnapshot, UsageStatsSnapshot,
};
use ledger_kv::KvStore;

pub async fn error_rate(
    kv: &KvStore,
    project_id: i64,
    interval: &str,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<ErrorRateSnapshot> {
    let mut snapshot: ErrorRateSnapshot =
        metrics_cache::read(kv, &metrics_cache::error_rate_key(project_id, interval)).await?;
    snapshot
        .data
        .retain(|p| in_window(p.timestamp, start, end));
    Ok(snapshot)
}

pub async fn log_volume(
    kv: &KvStore,
    project_id: i64,
    interval: &str,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<LogVolumeSnapshot> {
    let mut snapshot: LogVolumeSnapshot =
        metrics_cache::read(kv, &metrics_cache::log_volume_key(project_id, interval)).await?;
    snapshot
        .data
        .retain(|p| in_window(p.timestamp, start, end));
    Ok(snapshot)
}

pub async fn top_errors(
    kv: &KvStore,
    project_id: i64,
    limit: usize,
    status: Option<&str>,
) -> Result<TopErrorsSnapshot> {
    let mut snapshot: TopErrorsSnapshot =
        metrics_cache::read(kv, &metrics_cache::top_errors_key(project_id)).await?;
    if let Some(status) = status {
        snapshot.errors.retain(|e| e.status == status);
    }
    snapshot.errors.truncate(limit.max(1));
    Ok(snapshot)
}

pub async fn usage_stats(kv: &KvStore, project_id: i64) -> Result<UsageStatsSnapshot> {
    metrics_cache::read(kv, &metrics_cache::usage_stats_key(project_id)).await
}

fn in_window(t: DateTime<Utc>, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> bool {
    if let Some(start) = start {
        if t < start {
            return false;
        }
    }
    if let Some(end) = end {
        if t > end {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn window_filter_bounds_are_inclusive() {
        let now = Utc::now();
        assert!(in_window(now, Some(now), Some(now)));
        assert!(!in_window(now - Duration::seconds(1), Some(now), None));
        assert!(!in_window(now + Duration::seconds(1), None, Some(now)));
        assert!(in_window(now, None, None));
    }
}
