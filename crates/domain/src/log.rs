//! The log-event model shared by the ingestion path, the storage workers
//! and the query surface.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Enums
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Critical => "critical",
        }
    }

    /// Levels that count as errors for metrics and notifications.
    pub fn is_error(self) -> bool {
        matches!(self, LogLevel::Error | LogLevel::Critical)
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            "critical" => Ok(LogLevel::Critical),
            other => Err(Error::invalid_input(format!("invalid level: {other:?}"))),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogType {
    Console,
    Logger,
    Exception,
    Network,
    Database,
    Endpoint,
    Custom,
}

impl LogType {
    pub fn as_str(self) -> &'static str {
        match self {
            LogType::Console => "console",
            LogType::Logger => "logger",
            LogType::Exception => "exception",
            LogType::Network => "network",
            LogType::Database => "database",
            LogType::Endpoint => "endpoint",
            LogType::Custom => "custom",
        }
    }
}

impl FromStr for LogType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "console" => Ok(LogType::Console),
            "logger" => Ok(LogType::Logger),
            "exception" => Ok(LogType::Exception),
            "network" => Ok(LogType::Network),
            "database" => Ok(LogType::Database),
            "endpoint" => Ok(LogType::Endpoint),
            "custom" => Ok(LogType::Custom),
            other => Err(Error::invalid_input(format!("invalid log_type: {other:?}"))),
        }
    }
}

impl fmt::Display for LogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    Critical,
    High,
    #[default]
    Standard,
    Low,
}

impl Importance {
    pub fn as_str(self) -> &'static str {
        match self {
            Importance::Critical => "critical",
            Importance::High => "high",
            Importance::Standard => "standard",
            Importance::Low => "low",
        }
    }
}

impl FromStr for Importance {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "critical" => Ok(Importance::Critical),
            "high" => Ok(Importance::High),
            "standard" => Ok(Importance::Standard),
            "low" => Ok(Importance::Low),
            other => Err(Error::invalid_input(format!(
                "invalid importance: {other:?}"
            ))),
        }
    }
}

impl fmt::Display for Importance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wire shapes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A log event as submitted by an SDK, before enrichment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub log_type: LogType,
    #[serde(default)]
    pub importance: Importance,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub stack_trace: Option<String>,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub release: Option<String>,
    #[serde(default)]
    pub attributes: Option<serde_json::Value>,
    #[serde(default)]
    pub sdk_version: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub platform_version: Option<String>,
}

impl LogEntry {
    /// Endpoint logs carry their request facts under `attributes.endpoint`.
    pub fn endpoint_attributes(&self) -> Option<&serde_json::Value> {
        self.attributes.as_ref()?.get("endpoint")
    }
}

/// The flat record that travels through the per-project queue
/// (MessagePack-encoded) from the ingestion servicer to a storage worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedLog {
    pub project_id: i64,
    pub timestamp: DateTime<Utc>,
    pub ingested_at: DateTime<Utc>,
    pub level: LogLevel,
    pub log_type: LogType,
    pub importance: Importance,
    pub environment: Option<String>,
    pub release: Option<String>,
    pub message: Option<String>,
    pub error_type: Option<String>,
    pub error_message: Option<String>,
    pub stack_trace: Option<String>,
    pub attributes: Option<serde_json::Value>,
    pub sdk_version: Option<String>,
    pub platform: Option<String>,
    pub platform_version: Option<String>,
    pub processing_time_ms: Option<i16>,
    /// 64 hex chars, present only for exception logs.
    pub error_fingerprint: Option<String>,
}

impl QueuedLog {
    /// Whether this event should fan out to the notification topic.
    pub fn qualifies_for_notification(&self) -> bool {
        self.level.is_error() || self.log_type == LogType::Exception
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_parse_roundtrip() {
        for s in ["debug", "info", "warning", "error", "critical"] {
            let level: LogLevel = s.parse().unwrap();
            assert_eq!(level.as_str(), s);
        }
        assert!("invalid_level".parse::<LogLevel>().is_err());
    }

    #[test]
    fn level_error_classification() {
        assert!(LogLevel::Error.is_error());
        assert!(LogLevel::Critical.is_error());
        assert!(!LogLevel::Warning.is_error());
        assert!(!LogLevel::Info.is_error());
    }

    #[test]
    fn log_type_parse_roundtrip() {
        for s in [
            "console", "logger", "exception", "network", "database", "endpoint", "custom",
        ] {
            let lt: LogType = s.parse().unwrap();
            assert_eq!(lt.as_str(), s);
        }
        assert!("".parse::<LogType>().is_err());
    }

    #[test]
    fn serde_uses_lowercase() {
        let json = serde_json::to_string(&LogLevel::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
        let lt: LogType = serde_json::from_str("\"endpoint\"").unwrap();
        assert_eq!(lt, LogType::Endpoint);
    }

    fn queued(level: LogLevel, log_type: LogType) -> QueuedLog {
        QueuedLog {
            project_id: 1,
            timestamp: Utc::now(),
            ingested_at: Utc::now(),
            level,
            log_type,
            importance: Importance::Standard,
            environment: None,
            release: None,
            message: Some("m".into()),
            error_type: None,
            error_message: None,
            stack_trace: None,
            attributes: None,
            sdk_version: None,
            platform: None,
            platform_version: None,
            processing_time_ms: None,
            error_fingerprint: None,
        }
    }

    #[test]
    fn notification_qualification() {
        assert!(queued(LogLevel::Error, LogType::Logger).qualifies_for_notification());
        assert!(queued(LogLevel::Critical, LogType::Console).qualifies_for_notification());
        assert!(queued(LogLevel::Info, LogType::Exception).qualifies_for_notification());
        assert!(!queued(LogLevel::Info, LogType::Logger).qualifies_for_notification());
        assert!(!queued(LogLevel::Warning, LogType::Endpoint).qualifies_for_notification());
    }

    #[test]
    fn endpoint_attributes_lookup() {
        let entry = LogEntry {
            timestamp: Utc::now(),
            level: LogLevel::Info,
            log_type: LogType::Endpoint,
            importance: Importance::Standard,
            message: None,
            error_type: None,
            error_message: None,
            stack_trace: None,
            environment: None,
            release: None,
            attributes: Some(serde_json::json!({
                "endpoint": {"method": "GET", "path": "/a", "status_code": 200, "duration_ms": 12.5}
            })),
            sdk_version: None,
            platform: None,
            platform_version: None,
        };
        let ep = entry.endpoint_attributes().unwrap();
        assert_eq!(ep["method"], "GET");
    }
}
