//! Cache keys and payload shapes shared by the analytics warmers (writers)
//! and the query service (readers). The query path never computes these —
//! a cold key reads as empty data.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use ledger_domain::Result;

use crate::client::KvStore;

pub fn error_rate_key(project_id: i64, interval: &str) -> String {
    format!("metrics:error_rate:{project_id}:{interval}")
}

pub fn log_volume_key(project_id: i64, interval: &str) -> String {
    format!("metrics:log_volume:{project_id}:{interval}")
}

pub fn top_errors_key(project_id: i64) -> String {
    format!("metrics:top_errors:{project_id}")
}

pub fn usage_stats_key(project_id: i64) -> String {
    format!("metrics:usage_stats:{project_id}")
}

// ── Payloads ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorRatePoint {
    pub timestamp: DateTime<Utc>,
    pub error_count: i64,
    pub critical_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ErrorRateSnapshot {
    pub data: Vec<ErrorRatePoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogVolumePoint {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub debug: i64,
    #[serde(default)]
    pub info: i64,
    #[serde(default)]
    pub warning: i64,
    #[serde(default)]
    pub error: i64,
    #[serde(default)]
    pub critical: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LogVolumeSnapshot {
    pub data: Vec<LogVolumePoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopErrorEntry {
    pub fingerprint: String,
    pub error_type: String,
    #[serde(default)]
    pub error_message: Option<String>,
    pub occurrence_count: i64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub status: String,
    #[serde(default)]
    pub sample_log_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TopErrorsSnapshot {
    pub errors: Vec<TopErrorEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UsagePoint {
    pub date: NaiveDate,
    pub log_count: i64,
    pub daily_quota: i64,
    pub quota_used_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UsageStatsSnapshot {
    pub usage: Vec<UsagePoint>,
    #[serde(default)]
    pub daily_quota: i64,
}

// ── Typed access ────────────────────────────────────────────────────

pub async fn read<T: serde::de::DeserializeOwned + Default>(kv: &KvStore, key: &str) -> Result<T> {
    let raw = kv.get(key).await?;
    Ok(raw
        .and_then(|v| serde_json::from_str(&v).ok())
        .unwrap_or_default())
}

pub async fn write<T: Serialize>(kv: &KvStore, key: &str, value: &T, ttl_secs: u64) -> Result<()> {
    let raw = serde_json::to_string(value)?;
    kv.set_ex(key, &raw, ttl_secs).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_stable_strings() {
        assert_eq!(error_rate_key(7, "5min"), "metrics:error_rate:7:5min");
        assert_eq!(log_volume_key(7, "1hour"), "metrics:log_volume:7:1hour");
        assert_eq!(top_errors_key(7), "metrics:top_errors:7");
        assert_eq!(usage_stats_key(7), "metrics:usage_stats:7");
    }

    #[test]
    fn snapshots_roundtrip_and_default_empty() {
        let snapshot = ErrorRateSnapshot {
            data: vec![ErrorRatePoint {
                timestamp: Utc::now(),
                error_count: 3,
                critical_count: 1,
            }],
        };
        let raw = serde_json::to_string(&snapshot).unwrap();
        let back: ErrorRateSnapshot = serde_json::from_str(&raw).unwrap();
        assert_eq!(back.data, snapshot.data);

        let empty: UsageStatsSnapshot = serde_json::from_str("{}").unwrap_or_default();
        assert!(empty.usage.is_empty());
    }
}
