//! Ingestion service binary.
//!
//! `serve` runs the gRPC acceptance path; `worker` runs the storage
//! worker pool that drains the queues into Postgres.

mod enrich;
mod server;
mod storage;
mod validate;
mod worker;

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use ledger_domain::config::{Config, ConfigSeverity};
use ledger_proto::ingestion::ingestion_service_server::IngestionServiceServer;

#[derive(Parser)]
#[command(name = "ledger-ingestion", about = "Ledger ingestion service")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "ledger.toml")]
    config: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Accept logs over gRPC and enqueue them.
    Serve,
    /// Drain the queues into the partitioned log table.
    Worker,
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

    match cli.command {
        Command::Serve => serve(config).await,
        Command::Worker => run_workers(config).await,
    }
}

async fn serve(config: Arc<Config>) -> anyhow::Result<()> {
    let kv = ledger_kv::KvStore::connect(&config.redis)
        .await
        .context("connecting to the KV store")?;
    tracing::info!("kv store ready");

    let addr = format!("{}:{}", config.server.host, config.rpc.ingestion_port)
        .parse()
        .context("parsing listen address")?;
    let servicer = server::IngestionServicer::new(config.clone(), kv);

    tracing::info!(%addr, "ingestion service listening");
    tonic::transport::Server::builder()
        .add_service(IngestionServiceServer::new(servicer))
        .serve_with_shutdown(addr, async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await
        .context("serving gRPC")?;
    Ok(())
}

async fn run_workers(config: Arc<Config>) -> anyhow::Result<()> {
    let pool = ledger_store::connect(&config.database)
        .await
        .context("connecting to Postgres")?;
    ledger_store::migrate(&pool).await.context("running migrations")?;

    // Pre-create partitions so the safety-net path in the workers is the
    // exception, not the rule. A failure here is survivable.
    if let Err(e) =
        ledger_store::partitions::ensure_months_ahead(&pool, "logs", config.partitions.months_ahead)
            .await
    {
        tracing::error!(error = %e, "partition pre-creation failed; workers will ensure per-batch");
    }

    let kv = ledger_kv::KvStore::connect(&config.redis)
        .await
        .context("connecting to the KV store")?;

    let manager = worker::WorkerManager::start(config, pool, kv);

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    tracing::info!("shutdown signal received, draining workers");
    manager.stop().await;
    Ok(())
}
