//! Daily partition pre-creation, keeping the configured horizon of child
//! partitions ahead of arrivals.

use sqlx::PgPool;

use ledger_domain::Result;
use ledger_store::partitions;

pub async fn ensure_partitions(pool: &PgPool, months_ahead: u32) -> Result<()> {
    partitions::ensure_months_ahead(pool, "logs", months_ahead).await
}
