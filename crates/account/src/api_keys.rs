//! API key issuance, validation and revocation.
//!
//! Secrets are `ledger_` + 43 URL-safe random characters. Only the SHA-256
//! hash is stored; validation is a unique-index lookup on that hash, and
//! the same digest addresses the gateway's cache entry, so revocation
//! invalidates exactly the revoked key.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use rand::RngCore;
use sqlx::{FromRow, PgPool};

use ledger_domain::config::SecurityConfig;
use ledger_domain::{Error, Result};
use ledger_kv::{hash_secret, ApiKeyCache, ApiKeyRecord, RateLimiter};

pub const KEY_PREFIX_HUMAN: &str = "ledger_";
const KEY_PREFIX_STORED_LEN: usize = 20;

#[derive(Debug, Clone, FromRow)]
pub struct ApiKeyRow {
    pub id: i64,
    pub project_id: i64,
    pub key_prefix: String,
    pub key_hash: String,
    pub name: Option<String>,
    pub status: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub rate_limit_per_minute: i32,
    pub rate_limit_per_hour: i32,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

/// Generate a fresh secret and its stored prefix.
pub fn generate_secret() -> (String, String) {
    let mut random = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut random);
    let full_key = format!("{KEY_PREFIX_HUMAN}{}", URL_SAFE_NO_PAD.encode(random));
    let prefix = full_key[..KEY_PREFIX_STORED_LEN].to_string();
    (full_key, prefix)
}

pub async fn create(
    pool: &PgPool,
    security: &SecurityConfig,
    project_id: i64,
    name: Option<&str>,
) -> Result<(String, ApiKeyRow)> {
    // Reject unknown projects up front with a clean not-found instead of a
    // foreign-key violation.
    crate::projects::get_by_id(pool, project_id).await?;

    let (full_key, prefix) = generate_secret();
    let key_hash = hash_secret(&full_key);

    let row = sqlx::query_as::<_, ApiKeyRow>(
        "INSERT INTO api_keys
             (project_id, key_prefix, key_hash, name, status,
              rate_limit_per_minute, rate_limit_per_hour)
         VALUES ($1, $2, $3, $4, 'active', $5, $6)
         RETURNING id, project_id, key_prefix, key_hash, name, status, expires_at,
                   rate_limit_per_minute, rate_limit_per_hour, created_at, last_used_at",
    )
    .bind(project_id)
    .bind(&prefix)
    .bind(&key_hash)
    .bind(name)
    .bind(security.default_rate_limit_per_minute as i32)
    .bind(security.default_rate_limit_per_hour as i32)
    .fetch_one(pool)
    .await
    .map_err(Error::db)?;

    Ok((full_key, row))
}

/// Validate a secret. `Ok(None)` means the key is unknown, revoked or
/// expired — the caller reports `valid = false`, not an error.
pub async fn validate(
    pool: &PgPool,
    limiter: &RateLimiter,
    secret: &str,
) -> Result<Option<ApiKeyRecord>> {
    let key_hash = hash_secret(secret);

    let row: Option<(i64, i64, i64, Option<DateTime<Utc>>, i32, i32, i64, i16)> =
        sqlx::query_as(
            "SELECT k.id, k.project_id, p.account_id, k.expires_at,
                    k.rate_limit_per_minute, k.rate_limit_per_hour,
                    p.daily_quota, p.retention_days
             FROM api_keys k
             JOIN projects p ON p.id = k.project_id
             WHERE k.key_hash = $1 AND k.status = 'active'",
        )
        .bind(&key_hash)
        .fetch_optional(pool)
        .await
        .map_err(Error::db)?;

    let Some((key_id, project_id, account_id, expires_at, per_minute, per_hour, quota, retention)) =
        row
    else {
        return Ok(None);
    };

    if let Some(expires_at) = expires_at {
        if expires_at < Utc::now() {
            return Ok(None);
        }
    }

    sqlx::query("UPDATE api_keys SET last_used_at = NOW() WHERE id = $1")
        .bind(key_id)
        .execute(pool)
        .await
        .map_err(Error::db)?;

    let current_usage = limiter.daily_usage(project_id).await.unwrap_or(0);

    Ok(Some(ApiKeyRecord {
        project_id,
        account_id,
        rate_limit_per_minute: per_minute.max(0) as u32,
        rate_limit_per_hour: per_hour.max(0) as u32,
        daily_quota: quota,
        retention_days: retention as i32,
        current_usage,
    }))
}

/// Flip the key to revoked and drop its cache entry (and only its entry).
pub async fn revoke(pool: &PgPool, cache: &ApiKeyCache, key_id: i64) -> Result<()> {
    let key_hash: Option<String> = sqlx::query_scalar(
        "UPDATE api_keys SET status = 'revoked' WHERE id = $1 RETURNING key_hash",
    )
    .bind(key_id)
    .fetch_optional(pool)
    .await
    .map_err(Error::db)?;

    let Some(key_hash) = key_hash else {
        return Err(Error::not_found("API key not found"));
    };

    if let Err(e) = cache.invalidate_hash(key_hash.trim()).await {
        // The entry ages out at its TTL anyway.
        tracing::warn!(key_id, error = %e, "failed to invalidate API key cache entry");
    }
    Ok(())
}

pub async fn list_for_project(pool: &PgPool, project_id: i64) -> Result<Vec<ApiKeyRow>> {
    sqlx::query_as::<_, ApiKeyRow>(
        "SELECT id, project_id, key_prefix, key_hash, name, status, expires_at,
                rate_limit_per_minute, rate_limit_per_hour, created_at, last_used_at
         FROM api_keys WHERE project_id = $1 ORDER BY created_at DESC",
    )
    .bind(project_id)
    .fetch_all(pool)
    .await
    .map_err(Error::db)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_secret_has_expected_shape() {
        let (full_key, prefix) = generate_secret();
        assert!(full_key.starts_with(KEY_PREFIX_HUMAN));
        // 7-char human prefix + 43 chars of base64url(32 bytes).
        assert_eq!(full_key.len(), 50);
        assert_eq!(prefix.len(), 20);
        assert!(full_key.starts_with(&prefix));
        assert!(full_key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
    }

    #[test]
    fn generated_secrets_are_unique() {
        let (a, _) = generate_secret();
        let (b, _) = generate_secret();
        assert_ne!(a, b);
    }

    #[test]
    fn stored_hash_matches_cache_key_digest() {
        let (full_key, _) = generate_secret();
        // The account store and the gateway cache must agree on the digest.
        assert_eq!(hash_secret(&full_key).len(), 64);
    }
}
