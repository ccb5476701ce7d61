//! Gateway binary: the public REST surface in front of the account,
//! ingestion and query services.

mod bootstrap;
mod error;
mod middleware;
mod routes;
mod rpc;
mod state;
mod token;

use std::sync::Arc;

use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use clap::Parser;

use ledger_domain::config::Config;

#[derive(Parser)]
#[command(name = "ledger-gateway", about = "Ledger API gateway")]
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

    let state = bootstrap::build_app_state(config.clone()).await?;

    // Layer order matters: auth is outermost (it produces the request
    // context), then the rate limiter consumes it, then the handlers run
    // with the breakers available from state.
    let app = routes::router()
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit::enforce,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::authenticate,
        ))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(
            config.server.request_body_limit_mb * 1024 * 1024,
        ))
        .with_state(state);

    let addr = format!("{}:{}", config.server.host, config.server.http_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await
        .context("serving HTTP")?;

    Ok(())
}
