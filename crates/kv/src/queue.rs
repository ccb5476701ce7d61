//! Per-project FIFO log queues.
//!
//! Records are MessagePack-encoded [`QueuedLog`]s on `queue:logs:<project>`
//! lists. Producers LPUSH (multi-arg for batches, one round trip); workers
//! RPOP with a count, so a pop batch comes back oldest-first and order is
//! preserved within it.

use std::num::NonZeroUsize;

use redis::AsyncCommands;

use ledger_domain::log::QueuedLog;
use ledger_domain::{Error, Result};

use crate::client::KvStore;

pub const QUEUE_KEY_PREFIX: &str = "queue:logs:";

pub fn queue_key(project_id: i64) -> String {
    format!("{QUEUE_KEY_PREFIX}{project_id}")
}

/// Parse the project id back out of a `queue:logs:<id>` key.
pub fn project_id_from_key(key: &str) -> Option<i64> {
    key.strip_prefix(QUEUE_KEY_PREFIX)?.parse().ok()
}

pub fn encode(log: &QueuedLog) -> Result<Vec<u8>> {
    rmp_serde::to_vec_named(log).map_err(Error::internal)
}

pub fn decode(payload: &[u8]) -> Result<QueuedLog> {
    rmp_serde::from_slice(payload)
        .map_err(|e| Error::invalid_input(format!("undecodable queue record: {e}")))
}

#[derive(Clone)]
pub struct LogQueue {
    kv: KvStore,
    max_depth: usize,
}

impl LogQueue {
    pub fn new(kv: KvStore, max_depth: usize) -> Self {
        Self { kv, max_depth }
    }

    pub async fn depth(&self, project_id: i64) -> Result<usize> {
        let mut con = self.kv.connection();
        let key = queue_key(project_id);
        self.kv
            .deadline(async move { con.llen(&key).await.map_err(Error::kv) })
            .await
    }

    async fn reject_if_full(&self, project_id: i64) -> Result<()> {
        let depth = self.depth(project_id).await?;
        if depth >= self.max_depth {
            return Err(Error::Backpressure(format!(
                "queue for project {project_id} at depth {depth} (max {})",
                self.max_depth
            )));
        }
        Ok(())
    }

    pub async fn enqueue(&self, log: &QueuedLog) -> Result<()> {
        self.reject_if_full(log.project_id).await?;
        let payload = encode(log)?;
        let key = queue_key(log.project_id);
        let mut con = self.kv.connection();
        self.kv
            .deadline(async move { con.lpush::<_, _, ()>(&key, payload).await.map_err(Error::kv) })
            .await
    }

    /// Enqueue a batch, grouped per project, one multi-value LPUSH each.
    pub async fn enqueue_batch(&self, logs: &[QueuedLog]) -> Result<()> {
        if logs.is_empty() {
            return Ok(());
        }

        let mut per_project: Vec<(i64, Vec<Vec<u8>>)> = Vec::new();
        for log in logs {
            let payload = encode(log)?;
            match per_project.iter_mut().find(|(pid, _)| *pid == log.project_id) {
                Some((_, items)) => items.push(payload),
                None => per_project.push((log.project_id, vec![payload])),
            }
        }

        for (project_id, payloads) in per_project {
            self.reject_if_full(project_id).await?;
            let key = queue_key(project_id);
            let mut con = self.kv.connection();
            self.kv
                .deadline(async move {
                    con.lpush::<_, _, ()>(&key, payloads)
                        .await
                        .map_err(Error::kv)
                })
                .await?;
        }
        Ok(())
    }

    /// Pop up to `batch_size` records, oldest first. Records that fail to
    /// decode are dropped with a warning rather than wedging the queue.
    pub async fn pop_batch(&self, project_id: i64, batch_size: usize) -> Result<Vec<QueuedLog>> {
        let Some(count) = NonZeroUsize::new(batch_size) else {
            return Ok(Vec::new());
        };
        let key = queue_key(project_id);
        let mut con = self.kv.connection();
        let payloads: Vec<Vec<u8>> = self
            .kv
            .deadline(async move { con.rpop(&key, Some(count)).await.map_err(Error::kv) })
            .await?;

        let mut logs = Vec::with_capacity(payloads.len());
        for payload in &payloads {
            match decode(payload) {
                Ok(log) => logs.push(log),
                Err(e) => {
                    tracing::warn!(project_id, error = %e, "dropping undecodable queue record")
                }
            }
        }
        Ok(logs)
    }

    /// Keys of every project queue currently present in the KV store.
    pub async fn discover_queues(&self) -> Result<Vec<i64>> {
        let keys = self.kv.scan_keys(&format!("{QUEUE_KEY_PREFIX}*")).await?;
        Ok(keys.iter().filter_map(|k| project_id_from_key(k)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ledger_domain::log::{Importance, LogLevel, LogType};

    fn sample(project_id: i64, message: &str) -> QueuedLog {
        QueuedLog {
            project_id,
            timestamp: Utc::now(),
            ingested_at: Utc::now(),
            level: LogLevel::Info,
            log_type: LogType::Console,
            importance: Importance::Standard,
            environment: Some("production".into()),
            release: None,
            message: Some(message.into()),
            error_type: None,
            error_message: None,
            stack_trace: None,
            attributes: Some(serde_json::json!({"user_id": "usr_123"})),
            sdk_version: None,
            platform: Some("rust".into()),
            platform_version: None,
            processing_time_ms: Some(2),
            error_fingerprint: None,
        }
    }

    #[test]
    fn queue_key_roundtrip() {
        assert_eq!(queue_key(42), "queue:logs:42");
        assert_eq!(project_id_from_key("queue:logs:42"), Some(42));
        assert_eq!(project_id_from_key("queue:logs:nope"), None);
        assert_eq!(project_id_from_key("other:42"), None);
    }

    #[test]
    fn encode_decode_preserves_fields() {
        let log = sample(1, "hello");
        let payload = encode(&log).unwrap();
        let back = decode(&payload).unwrap();
        assert_eq!(back.project_id, 1);
        assert_eq!(back.message.as_deref(), Some("hello"));
        assert_eq!(back.level, LogLevel::Info);
        assert_eq!(back.attributes, log.attributes);
    }

    #[test]
    fn encoding_is_field_named() {
        // Named-field encoding keeps records readable by other consumers
        // (map keys rather than positional arrays).
        let payload = encode(&sample(1, "x")).unwrap();
        let as_map: serde_json::Value = rmp_serde::from_slice(&payload).unwrap();
        assert_eq!(as_map["message"], "x");
        assert_eq!(as_map["project_id"], 1);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode(b"not msgpack").is_err());
    }
}
