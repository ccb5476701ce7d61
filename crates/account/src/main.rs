//! Account service binary: accounts, projects, API keys, dashboards.

mod accounts;
mod api_keys;
mod dashboards;
mod preferences;
mod projects;
mod server;
mod usage;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use ledger_domain::config::{Config, ConfigSeverity};
use ledger_proto::account::account_service_server::AccountServiceServer;

#[derive(Parser)]
#[command(name = "ledger-account", about = "Ledger account service")]
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
    ledger_store::migrate(&pool).await.context("running migrations")?;
    tracing::info!(pool_size = config.database.max_connections(), "database ready");

    let kv = ledger_kv::KvStore::connect(&config.redis)
        .await
        .context("connecting to the KV store")?;
    tracing::info!("kv store ready");

    let addr = format!("{}:{}", config.server.host, config.rpc.account_port)
        .parse()
        .context("parsing listen address")?;
    let servicer = server::AccountServicer::new(config.clone(), pool, kv);

    tracing::info!(%addr, "account service listening");
    tonic::transport::Server::builder()
        .add_service(AccountServiceServer::new(servicer))
        .serve_with_shutdown(addr, async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await
        .context("serving gRPC")?;

    Ok(())
}
