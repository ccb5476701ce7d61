use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Aggregation jobs
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Intervals (minutes) and cache TTLs (seconds) for the analytics jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationConfig {
    #[serde(default = "d_5")]
    pub error_rate_interval_mins: u64,
    #[serde(default = "d_5")]
    pub log_volume_interval_mins: u64,
    #[serde(default = "d_15")]
    pub top_errors_interval_mins: u64,
    #[serde(default = "d_1")]
    pub usage_stats_interval_mins: u64,
    #[serde(default = "d_60")]
    pub aggregated_metrics_interval_mins: u64,
    #[serde(default = "d_60")]
    pub available_routes_interval_mins: u64,
    /// A job firing later than this past its slot is skipped, not run late.
    #[serde(default = "d_grace")]
    pub misfire_grace_secs: u64,

    #[serde(default = "d_ttl_600")]
    pub error_rate_ttl_secs: u64,
    #[serde(default = "d_ttl_600")]
    pub log_volume_ttl_secs: u64,
    #[serde(default = "d_ttl_900")]
    pub top_errors_ttl_secs: u64,
    #[serde(default = "d_ttl_3600")]
    pub usage_stats_ttl_secs: u64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            error_rate_interval_mins: 5,
            log_volume_interval_mins: 5,
            top_errors_interval_mins: 15,
            usage_stats_interval_mins: 1,
            aggregated_metrics_interval_mins: 60,
            available_routes_interval_mins: 60,
            misfire_grace_secs: d_grace(),
            error_rate_ttl_secs: 600,
            log_volume_ttl_secs: 600,
            top_errors_ttl_secs: 900,
            usage_stats_ttl_secs: 3600,
        }
    }
}

fn d_1() -> u64 {
    1
}
fn d_5() -> u64 {
    5
}
fn d_15() -> u64 {
    15
}
fn d_60() -> u64 {
    60
}
fn d_grace() -> u64 {
    60
}
fn d_ttl_600() -> u64 {
    600
}
fn d_ttl_900() -> u64 {
    900
}
fn d_ttl_3600() -> u64 {
    3600
}
