//! Query service binary.

mod cached;
mod logs;
mod metrics;
mod period;
mod server;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use ledger_domain::config::{Config, ConfigSeverity};
use ledger_proto::query::query_service_server::QueryServiceServer;

#[derive(Parser)]
#[command(name = "ledger-query", about = "Ledger query service")]
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
    tracing::info!("database ready");

    let kv = ledger_kv::KvStore::connect(&config.redis)
        .await
        .context("connecting to the KV store")?;
    tracing::info!("kv store ready");

    let addr = format!("{}:{}", config.server.host, config.rpc.query_port)
        .parse()
        .context("parsing listen address")?;
    let servicer = server::QueryServicer::new(config.clone(), pool, kv);

    tracing::info!(%addr, "query service listening");
    tonic::transport::Server::builder()
        .add_service(QueryServiceServer::new(servicer))
        .serve_with_shutdown(addr, async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await
        .context("serving gRPC")?;
    Ok(())
}
