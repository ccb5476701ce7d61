//! Postgres pool construction and migrations.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use ledger_domain::config::DatabaseConfig;
use ledger_domain::{Error, Result};

/// Build the shared connection pool.
///
/// `test_before_acquire` pings each connection on checkout so idle drops
/// (load balancers, server restarts) surface as reconnects, not query
/// failures.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.max_connections())
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .test_before_acquire(true)
        .connect(&config.connect_url())
        .await
        .map_err(Error::db)
}

/// Apply any pending schema migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(Error::db)
}
