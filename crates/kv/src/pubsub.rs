//! Error-notification pub/sub on `notifications:errors:<project>` topics.

use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use chrono::{DateTime, Utc};
use ledger_domain::log::{LogLevel, LogType, QueuedLog};
use ledger_domain::{Error, Result};

use crate::client::KvStore;

const MESSAGE_TRUNCATE_LEN: usize = 1_000;

fn topic(project_id: i64) -> String {
    format!("notifications:errors:{project_id}")
}

/// Payload published for each qualifying log event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub project_id: i64,
    pub level: LogLevel,
    pub log_type: LogType,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdk_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
}

impl NotificationMessage {
    pub fn from_log(log: &QueuedLog) -> Self {
        let mut message = log.message.clone().unwrap_or_default();
        if message.len() > MESSAGE_TRUNCATE_LEN {
            let mut cut = MESSAGE_TRUNCATE_LEN;
            while !message.is_char_boundary(cut) {
                cut -= 1;
            }
            message.truncate(cut);
        }
        Self {
            project_id: log.project_id,
            level: log.level,
            log_type: log.log_type,
            message,
            error_type: log.error_type.clone(),
            timestamp: log.timestamp,
            fingerprint: log.error_fingerprint.clone(),
            attributes: log.attributes.clone(),
            sdk_version: log.sdk_version.clone(),
            platform: log.platform.clone(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Publisher
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Clone)]
pub struct NotificationPublisher {
    kv: KvStore,
}

impl NotificationPublisher {
    pub fn new(kv: KvStore) -> Self {
        Self { kv }
    }

    /// Publish to the project's topic. Errors are reported to the caller;
    /// the ingestion path swallows them so a notification hiccup never
    /// fails a log write.
    pub async fn publish(&self, message: &NotificationMessage) -> Result<()> {
        let payload = serde_json::to_string(message)?;
        let channel = topic(message.project_id);
        let mut con = self.kv.connection();
        self.kv
            .deadline(async move {
                redis::cmd("PUBLISH")
                    .arg(&channel)
                    .arg(&payload)
                    .query_async::<i64>(&mut con)
                    .await
                    .map_err(Error::kv)?;
                Ok(())
            })
            .await
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Subscriber
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A subscription covering every topic of one client's projects.
///
/// Holds a dedicated pub/sub connection; dropping the subscriber tears it
/// down, which unsubscribes cleanly.
pub struct NotificationSubscriber {
    rx: mpsc::Receiver<String>,
    _task: tokio::task::JoinHandle<()>,
}

impl NotificationSubscriber {
    pub async fn subscribe(kv: &KvStore, project_ids: &[i64]) -> Result<Self> {
        let mut pubsub = kv
            .client()
            .get_async_pubsub()
            .await
            .map_err(Error::kv)?;
        for pid in project_ids {
            pubsub.subscribe(topic(*pid)).await.map_err(Error::kv)?;
        }

        let (tx, rx) = mpsc::channel(64);
        let task = tokio::spawn(async move {
            let mut stream = pubsub.on_message();
            while let Some(msg) = stream.next().await {
                let payload: String = match msg.get_payload() {
                    Ok(p) => p,
                    Err(e) => {
                        tracing::warn!(error = %e, "undecodable notification payload");
                        continue;
                    }
                };
                // Receiver gone = client disconnected; stop listening.
                if tx.send(payload).await.is_err() {
                    break;
                }
            }
        });

        Ok(Self { rx, _task: task })
    }

    /// Next raw JSON payload, or `None` once the connection is gone.
    pub async fn next_message(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

impl Drop for NotificationSubscriber {
    fn drop(&mut self) {
        self._task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_domain::log::Importance;

    fn log_with_message(message: &str) -> QueuedLog {
        QueuedLog {
            project_id: 9,
            timestamp: Utc::now(),
            ingested_at: Utc::now(),
            level: LogLevel::Error,
            log_type: LogType::Exception,
            importance: Importance::High,
            environment: None,
            release: None,
            message: Some(message.into()),
            error_type: Some("ValueError".into()),
            error_message: Some("bad value".into()),
            stack_trace: None,
            attributes: None,
            sdk_version: Some("1.0.0".into()),
            platform: Some("python".into()),
            platform_version: None,
            processing_time_ms: None,
            error_fingerprint: Some("ab".repeat(32)),
        }
    }

    #[test]
    fn topic_name_is_per_project() {
        assert_eq!(topic(5), "notifications:errors:5");
    }

    #[test]
    fn message_carries_log_fields() {
        let msg = NotificationMessage::from_log(&log_with_message("boom"));
        assert_eq!(msg.project_id, 9);
        assert_eq!(msg.message, "boom");
        assert_eq!(msg.error_type.as_deref(), Some("ValueError"));
        assert_eq!(msg.fingerprint.as_deref().map(|f| f.len()), Some(64));
    }

    #[test]
    fn long_messages_are_truncated() {
        let long = "x".repeat(5_000);
        let msg = NotificationMessage::from_log(&log_with_message(&long));
        assert_eq!(msg.message.len(), 1_000);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let long = "é".repeat(800); // 2 bytes each
        let msg = NotificationMessage::from_log(&log_with_message(&long));
        assert!(msg.message.len() <= 1_000);
        assert!(msg.message.is_char_boundary(msg.message.len()));
    }

    #[test]
    fn optional_fields_are_omitted_from_json() {
        let mut log = log_with_message("m");
        log.error_type = None;
        log.error_fingerprint = None;
        log.attributes = None;
        log.sdk_version = None;
        log.platform = None;
        let json = serde_json::to_value(NotificationMessage::from_log(&log)).unwrap();
        assert!(json.get("error_type").is_none());
        assert!(json.get("fingerprint").is_none());
    }
}
