//! Analytics worker binary: the interval scheduler plus every rollup,
//! warmer and maintenance job.

mod jobs;
mod scheduler;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use ledger_domain::config::{Config, ConfigSeverity};

#[derive(Parser)]
#[command(name = "ledger-analytics", about = "Ledger analytics workers")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "ledger.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Arc::new(Config::load(&cli.config).context("loading config")?);
    ledger_domain::telemetry::init(&config);

    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if Config::has_errors(&issues) {
        anyhow::bail!("config validation failed");
    }

    let pool = ledger_store::connect(&config.database)
        .await
        .context("connecting to Postgres")?;
    let kv = ledger_kv::KvStore::connect(&config.redis)
        .await
        .context("connecting to the KV store")?;
    tracing::info!("analytics workers starting");

    let agg = &config.aggregation;
    let grace = Duration::from_secs(agg.misfire_grace_secs);
    let mins = Duration::from_secs;

    let mut sched = scheduler::JobScheduler::new();

    {
        let pool = pool.clone();
        sched.register(
            "aggregated_metrics",
            mins(agg.aggregated_metrics_interval_mins * 60),
            grace,
            move || {
                let pool = pool.clone();
                async move { jobs::hourly::aggregate_hourly_metrics(&pool).await }
            },
        );
    }
    {
        let pool = pool.clone();
        sched.register(
            "bottleneck_metrics",
            mins(agg.aggregated_metrics_interval_mins * 60),
            grace,
            move || {
                let pool = pool.clone();
                async move { jobs::bottlenecks::aggregate_bottleneck_metrics(&pool).await }
            },
        );
    }
    {
        let (pool, kv, ttl) = (pool.clone(), kv.clone(), agg.error_rate_ttl_secs);
        sched.register(
            "error_rate",
            mins(agg.error_rate_interval_mins * 60),
            grace,
            move || {
                let (pool, kv) = (pool.clone(), kv.clone());
                async move { jobs::warmers::warm_error_rate(&pool, &kv, ttl).await }
            },
        );
    }
    {
        let (pool, kv, ttl) = (pool.clone(), kv.clone(), agg.log_volume_ttl_secs);
        sched.register(
            "log_volume",
            mins(agg.log_volume_interval_mins * 60),
            grace,
            move || {
                let (pool, kv) = (pool.clone(), kv.clone());
                async move { jobs::warmers::warm_log_volume(&pool, &kv, ttl).await }
            },
        );
    }
    {
        let (pool, kv, ttl) = (pool.clone(), kv.clone(), agg.top_errors_ttl_secs);
        sched.register(
            "top_errors",
            mins(agg.top_errors_interval_mins * 60),
            grace,
            move || {
                let (pool, kv) = (pool.clone(), kv.clone());
                async move { jobs::warmers::warm_top_errors(&pool, &kv, ttl).await }
            },
        );
    }
    {
        let (pool, kv, ttl) = (pool.clone(), kv.clone(), agg.usage_stats_ttl_secs);
        sched.register(
            "usage_stats",
            mins(agg.usage_stats_interval_mins * 60),
            grace,
            move || {
                let (pool, kv) = (pool.clone(), kv.clone());
                async move { jobs::warmers::warm_usage_stats(&pool, &kv, ttl).await }
            },
        );
    }
    {
        let pool = pool.clone();
        sched.register(
            "available_routes",
            mins(agg.available_routes_interval_mins * 60),
            grace,
            move || {
                let pool = pool.clone();
                async move { jobs::routes::update_available_routes(&pool).await }
            },
        );
    }
    if config.partitions.scheduler_enabled {
        let pool = pool.clone();
        let months_ahead = config.partitions.months_ahead;
        sched.register(
            "partition_maintenance",
            Duration::from_secs(24 * 3600),
            grace,
            move || {
                let pool = pool.clone();
                async move { jobs::partitions::ensure_partitions(&pool, months_ahead).await }
            },
        );
    } else {
        tracing::info!("partition scheduler disabled by configuration");
    }

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    tracing::info!("shutdown signal received");
    sched.shutdown().await;
    Ok(())
}
