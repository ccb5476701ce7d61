//! Connection handling and the generic key-value operations.

use std::time::Duration;

use ledger_domain::config::RedisConfig;
use ledger_domain::{Error, Result};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

/// Shared handle to the KV store.
///
/// Wraps a multiplexed [`ConnectionManager`] (auto-reconnecting) plus the
/// underlying client for pub/sub connections. Cheap to clone.
#[derive(Clone)]
pub struct KvStore {
    client: redis::Client,
    manager: ConnectionManager,
    timeout: Duration,
}

impl KvStore {
    /// Connect and verify the server responds to PING.
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        let client = redis::Client::open(config.connect_url()).map_err(Error::kv)?;
        let manager = ConnectionManager::new(client.clone())
            .await
            .map_err(Error::kv)?;

        let store = Self {
            client,
            manager,
            timeout: Duration::from_secs(config.timeout_secs),
        };
        store.ping().await?;
        Ok(store)
    }

    pub async fn ping(&self) -> Result<()> {
        let mut con = self.manager.clone();
        self.deadline(async move {
            redis::cmd("PING")
                .query_async::<String>(&mut con)
                .await
                .map_err(Error::kv)
        })
        .await?;
        Ok(())
    }

    /// Run a KV future under the configured operation deadline.
    pub(crate) async fn deadline<T>(
        &self,
        fut: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| Error::Kv("operation timed out".into()))?
    }

    pub(crate) fn connection(&self) -> ConnectionManager {
        self.manager.clone()
    }

    pub(crate) fn client(&self) -> &redis::Client {
        &self.client
    }

    // ── Generic operations ───────────────────────────────────────────

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut con = self.connection();
        let key = key.to_owned();
        self.deadline(async move { con.get(&key).await.map_err(Error::kv) })
            .await
    }

    pub async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let mut con = self.connection();
        let (key, value) = (key.to_owned(), value.to_owned());
        self.deadline(async move {
            con.set_ex::<_, _, ()>(&key, &value, ttl_secs)
                .await
                .map_err(Error::kv)
        })
        .await
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        let mut con = self.connection();
        let key = key.to_owned();
        self.deadline(async move { con.del::<_, ()>(&key).await.map_err(Error::kv) })
            .await
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        let mut con = self.connection();
        let key = key.to_owned();
        self.deadline(async move { con.exists(&key).await.map_err(Error::kv) })
            .await
    }

    pub async fn ttl(&self, key: &str) -> Result<i64> {
        let mut con = self.connection();
        let key = key.to_owned();
        self.deadline(async move { con.ttl(&key).await.map_err(Error::kv) })
            .await
    }

    /// Collect every key matching `pattern` via cursor scans.
    ///
    /// Unbounded by the operation deadline — SCAN over a large keyspace is
    /// legitimately slower than a point read.
    pub async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>> {
        let mut con = self.connection();
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, mut batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut con)
                .await
                .map_err(Error::kv)?;
            keys.append(&mut batch);
            cursor = next;
            if cursor == 0 {
                break;
            }
        }
        Ok(keys)
    }

    /// Delete every key matching `pattern`.
    pub async fn delete_pattern(&self, pattern: &str) -> Result<usize> {
        let keys = self.scan_keys(pattern).await?;
        if keys.is_empty() {
            return Ok(0);
        }
        let mut con = self.connection();
        let count = keys.len();
        con.del::<_, ()>(keys).await.map_err(Error::kv)?;
        Ok(count)
    }
}
