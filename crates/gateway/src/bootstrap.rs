//! AppState construction shared by `main` and the integration tests.

use std::sync::Arc;

use anyhow::Context;

use ledger_domain::config::{Config, ConfigSeverity};
use ledger_kv::{ApiKeyCache, KvStore, RateLimiter};

use crate::middleware::circuit::CircuitBreakers;
use crate::rpc::RpcClients;
use crate::state::{AppState, AuthStats, RateLimitStats};
use crate::token::TokenService;

/// Validate config, connect every subsystem and return a fully wired
/// [`AppState`].
pub async fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if Config::has_errors(&issues) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    let kv = KvStore::connect(&config.redis)
        .await
        .context("connecting to the KV store")?;
    tracing::info!("kv store ready");

    let rpc = RpcClients::connect(&config.rpc).context("building RPC channel pools")?;
    tracing::info!(pool_size = config.rpc.pool_size, "rpc channel pools ready");

    let breakers = Arc::new(CircuitBreakers::new(config.circuit_breaker.clone()));
    // Downstreams are registered eagerly so /metrics shows them before
    // the first call.
    breakers.get("account");
    breakers.get("ingestion");
    breakers.get("query");

    let tokens = Arc::new(TokenService::new(&config.security));
    let api_key_cache = ApiKeyCache::new(kv.clone(), config.cache.api_key_ttl_secs);
    let rate_limiter = RateLimiter::new(kv.clone());

    Ok(AppState {
        config,
        kv,
        api_key_cache,
        rate_limiter,
        rpc,
        breakers,
        tokens,
        auth_stats: Arc::new(AuthStats::default()),
        rate_limit_stats: Arc::new(RateLimitStats::default()),
    })
}
