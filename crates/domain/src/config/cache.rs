use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Cache TTLs
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// API-key validation record TTL.
    #[serde(default = "d_api_key_ttl")]
    pub api_key_ttl_secs: u64,
    /// TTL used when re-writing a record served from stale cache while the
    /// account service is down.
    #[serde(default = "d_emergency_ttl")]
    pub emergency_ttl_secs: u64,
    /// Dashboard panel cache TTL.
    #[serde(default = "d_dashboard_ttl")]
    pub dashboard_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            api_key_ttl_secs: d_api_key_ttl(),
            emergency_ttl_secs: d_emergency_ttl(),
            dashboard_ttl_secs: d_dashboard_ttl(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Circuit breaker
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    #[serde(default = "d_failure_threshold")]
    pub failure_threshold: u32,
    /// Seconds to wait in OPEN before admitting probes.
    #[serde(default = "d_recovery_timeout")]
    pub recovery_timeout_secs: u64,
    /// Max concurrent probe calls while HALF_OPEN.
    #[serde(default = "d_half_open_max")]
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: d_failure_threshold(),
            recovery_timeout_secs: d_recovery_timeout(),
            half_open_max_calls: d_half_open_max(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Notifications
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "d_true")]
    pub enabled: bool,
    /// SSE heartbeat interval, seconds.
    #[serde(default = "d_heartbeat")]
    pub heartbeat_interval_secs: u64,
    #[serde(default = "d_max_connections")]
    pub max_connections_per_user: u32,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            heartbeat_interval_secs: d_heartbeat(),
            max_connections_per_user: d_max_connections(),
        }
    }
}

fn d_api_key_ttl() -> u64 {
    300
}
fn d_emergency_ttl() -> u64 {
    600
}
fn d_dashboard_ttl() -> u64 {
    300
}
fn d_failure_threshold() -> u32 {
    5
}
fn d_recovery_timeout() -> u64 {
    30
}
fn d_half_open_max() -> u32 {
    3
}
fn d_true() -> bool {
    true
}
fn d_heartbeat() -> u64 {
    30
}
fn d_max_connections() -> u32 {
    5
}
