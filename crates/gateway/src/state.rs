//! Shared application state passed to all handlers and middleware.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use ledger_domain::config::Config;
use ledger_kv::{ApiKeyCache, KvStore, RateLimiter};

use crate::middleware::circuit::CircuitBreakers;
use crate::rpc::RpcClients;
use crate::token::TokenService;

/// Authentication context attached to each request by the auth middleware.
///
/// `project_id` is absent for session tokens, which are account-scoped.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub account_id: i64,
    pub project_id: Option<i64>,
    pub rate_limit_per_minute: u32,
    pub rate_limit_per_hour: u32,
    pub daily_quota: i64,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub kv: KvStore,
    pub api_key_cache: ApiKeyCache,
    pub rate_limiter: RateLimiter,
    pub rpc: Arc<RpcClients>,
    pub breakers: Arc<CircuitBreakers>,
    pub tokens: Arc<TokenService>,
    pub auth_stats: Arc<AuthStats>,
    pub rate_limit_stats: Arc<RateLimitStats>,
}

// ── Middleware statistics ───────────────────────────────────────────

#[derive(Default)]
pub struct AuthStats {
    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
    pub failures: AtomicU64,
}

#[derive(Debug, Serialize)]
pub struct AuthStatsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_hit_rate: f64,
    pub failures: u64,
}

impl AuthStats {
    pub fn snapshot(&self) -> AuthStatsSnapshot {
        let hits = self.cache_hits.load(Ordering::Relaxed);
        let misses = self.cache_misses.load(Ordering::Relaxed);
        let total = hits + misses;
        AuthStatsSnapshot {
            cache_hits: hits,
            cache_misses: misses,
            cache_hit_rate: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64 * 100.0
            },
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Default)]
pub struct RateLimitStats {
    pub total_requests: AtomicU64,
    pub limited_requests: AtomicU64,
}

#[derive(Debug, Serialize)]
pub struct RateLimitStatsSnapshot {
    pub total_requests: u64,
    pub limited_requests: u64,
    pub limited_percentage: f64,
}

impl RateLimitStats {
    pub fn snapshot(&self) -> RateLimitStatsSnapshot {
        let total = self.total_requests.load(Ordering::Relaxed);
        let limited = self.limited_requests.load(Ordering::Relaxed);
        RateLimitStatsSnapshot {
            total_requests: total,
            limited_requests: limited,
            limited_percentage: if total == 0 {
                0.0
            } else {
                limited as f64 / total as f64 * 100.0
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_stats_hit_rate() {
        let stats = AuthStats::default();
        assert_eq!(stats.snapshot().cache_hit_rate, 0.0);
        stats.cache_hits.fetch_add(3, Ordering::Relaxed);
        stats.cache_misses.fetch_add(1, Ordering::Relaxed);
        assert_eq!(stats.snapshot().cache_hit_rate, 75.0);
    }
}
