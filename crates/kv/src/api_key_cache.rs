//! The API-key validation cache.
//!
//! Values are JSON-encoded [`ApiKeyRecord`]s keyed by the SHA-256 of the
//! secret, so the cache key equals the hash stored in the account database
//! and revocation can invalidate exactly one entry.

use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use ledger_domain::Result;

use crate::client::KvStore;

/// SHA-256 of an API-key secret, hex-encoded. The same digest is stored as
/// `api_keys.key_hash`, used for validation lookups, and used as the cache
/// key suffix.
pub fn hash_secret(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

/// The validation record the gateway caches per API key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiKeyRecord {
    pub project_id: i64,
    pub account_id: i64,
    pub rate_limit_per_minute: u32,
    pub rate_limit_per_hour: u32,
    pub daily_quota: i64,
    pub retention_days: i32,
    #[serde(default)]
    pub current_usage: i64,
}

#[derive(Clone)]
pub struct ApiKeyCache {
    kv: KvStore,
    ttl_secs: u64,
}

impl ApiKeyCache {
    pub fn new(kv: KvStore, ttl_secs: u64) -> Self {
        Self { kv, ttl_secs }
    }

    fn cache_key(secret_hash: &str) -> String {
        format!("api_key:{secret_hash}")
    }

    /// Fresh read. Returns `None` on miss or undecodable value.
    pub async fn get(&self, secret: &str) -> Result<Option<ApiKeyRecord>> {
        let key = Self::cache_key(&hash_secret(secret));
        let raw = self.kv.get(&key).await?;
        Ok(raw.and_then(|v| serde_json::from_str(&v).ok()))
    }

    /// Stale read — identical to [`get`]; serving past-TTL entries is a
    /// policy choice made by the caller, and expiry means the entry is
    /// simply gone.
    pub async fn get_stale(&self, secret: &str) -> Result<Option<ApiKeyRecord>> {
        self.get(secret).await
    }

    pub async fn set(&self, secret: &str, record: &ApiKeyRecord) -> Result<()> {
        self.set_with_ttl(secret, record, self.ttl_secs).await
    }

    pub async fn set_with_ttl(
        &self,
        secret: &str,
        record: &ApiKeyRecord,
        ttl_secs: u64,
    ) -> Result<()> {
        let key = Self::cache_key(&hash_secret(secret));
        let value = serde_json::to_string(record)?;
        self.kv.set_ex(&key, &value, ttl_secs).await
    }

    /// Remove the entry for one key, addressed by its stored hash.
    pub async fn invalidate_hash(&self, secret_hash: &str) -> Result<()> {
        self.kv.delete(&Self::cache_key(secret_hash)).await
    }

    /// Read with a probabilistic early-refresh signal: when the remaining
    /// TTL is under 60 s, roughly one caller in ten is told to refresh in
    /// the background, which keeps a hot key from stampeding the account
    /// service at expiry.
    pub async fn get_with_refresh_hint(
        &self,
        secret: &str,
    ) -> Result<(Option<ApiKeyRecord>, bool)> {
        let key = Self::cache_key(&hash_secret(secret));
        let raw = self.kv.get(&key).await?;
        let Some(raw) = raw else {
            return Ok((None, false));
        };
        let record = serde_json::from_str(&raw).ok();
        let ttl = self.kv.ttl(&key).await.unwrap_or(-1);
        let refresh = ttl > 0 && ttl < 60 && rand::thread_rng().gen_bool(0.1);
        Ok((record, refresh))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_64_hex_chars() {
        let h = hash_secret("ledger_abc123");
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn hash_is_deterministic_and_distinct() {
        assert_eq!(hash_secret("a"), hash_secret("a"));
        assert_ne!(hash_secret("a"), hash_secret("b"));
    }

    #[test]
    fn record_json_roundtrip() {
        let record = ApiKeyRecord {
            project_id: 7,
            account_id: 3,
            rate_limit_per_minute: 1000,
            rate_limit_per_hour: 50_000,
            daily_quota: 1_000_000,
            retention_days: 30,
            current_usage: 42,
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: ApiKeyRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn record_tolerates_missing_current_usage() {
        let json = r#"{
            "project_id": 1, "account_id": 2,
            "rate_limit_per_minute": 100, "rate_limit_per_hour": 1000,
            "daily_quota": 5000, "retention_days": 30
        }"#;
        let record: ApiKeyRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.current_usage, 0);
    }
}
