mod aggregation;
mod cache;
mod ingestion;
mod rpc;
mod security;
mod server;
mod storage;

pub use aggregation::*;
pub use cache::*;
pub use ingestion::*;
pub use rpc::*;
pub use security::*;
pub use server::*;
pub use storage::*;

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Process-wide configuration, loaded once at startup and immutable after.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub partitions: PartitionConfig,
    #[serde(default)]
    pub aggregation: AggregationConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

impl Config {
    /// Load configuration from a TOML file, then apply environment
    /// overrides (`LEDGER_DATABASE_URL`, `LEDGER_REDIS_URL`,
    /// `LEDGER_JWT_SECRET`). A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let mut config: Config = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            toml::from_str(&raw).map_err(|e| {
                crate::Error::Config(format!("{}: {e}", path.display()))
            })?
        } else {
            Config::default()
        };

        if let Ok(url) = std::env::var("LEDGER_DATABASE_URL") {
            config.database.url = Some(url);
        }
        if let Ok(url) = std::env::var("LEDGER_REDIS_URL") {
            config.redis.url = Some(url);
        }
        if let Ok(secret) = std::env::var("LEDGER_JWT_SECRET") {
            config.security.jwt_secret = secret;
        }

        Ok(config)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

fn error(field: &str, message: impl Into<String>) -> ConfigIssue {
    ConfigIssue {
        severity: ConfigSeverity::Error,
        field: field.into(),
        message: message.into(),
    }
}

fn warning(field: &str, message: impl Into<String>) -> ConfigIssue {
    ConfigIssue {
        severity: ConfigSeverity::Warning,
        field: field.into(),
        message: message.into(),
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.server.http_port == 0 {
            issues.push(error("server.http_port", "port must be greater than 0"));
        }
        if self.server.host.is_empty() {
            issues.push(error("server.host", "host must not be empty"));
        }

        if !(5..=100).contains(&self.database.pool_size) {
            issues.push(error("database.pool_size", "must be within 5..=100"));
        }
        if self.database.max_overflow > 50 {
            issues.push(error("database.max_overflow", "must be within 0..=50"));
        }
        if self.redis.db > 15 {
            issues.push(error("redis.db", "must be within 0..=15"));
        }

        if !(1..=50).contains(&self.rpc.pool_size) {
            issues.push(error("rpc.pool_size", "must be within 1..=50"));
        }

        if !(60..=3600).contains(&self.cache.api_key_ttl_secs) {
            issues.push(error("cache.api_key_ttl_secs", "must be within 60..=3600"));
        }
        if !(300..=1800).contains(&self.cache.emergency_ttl_secs) {
            issues.push(error("cache.emergency_ttl_secs", "must be within 300..=1800"));
        }
        if !(60..=3600).contains(&self.cache.dashboard_ttl_secs) {
            issues.push(error("cache.dashboard_ttl_secs", "must be within 60..=3600"));
        }

        if !(3..=20).contains(&self.circuit_breaker.failure_threshold) {
            issues.push(error(
                "circuit_breaker.failure_threshold",
                "must be within 3..=20",
            ));
        }
        if !(10..=300).contains(&self.circuit_breaker.recovery_timeout_secs) {
            issues.push(error(
                "circuit_breaker.recovery_timeout_secs",
                "must be within 10..=300",
            ));
        }
        if !(1..=10).contains(&self.circuit_breaker.half_open_max_calls) {
            issues.push(error(
                "circuit_breaker.half_open_max_calls",
                "must be within 1..=10",
            ));
        }

        if !(1..=10_000).contains(&self.validation.max_batch_logs) {
            issues.push(error("validation.max_batch_logs", "must be within 1..=10000"));
        }

        if !(10_000..=1_000_000).contains(&self.queue.max_depth) {
            issues.push(error("queue.max_depth", "must be within 10000..=1000000"));
        }
        if !(100..=10_000).contains(&self.queue.batch_size) {
            issues.push(error("queue.batch_size", "must be within 100..=10000"));
        }
        if !(1..=50).contains(&self.queue.worker_count) {
            issues.push(error("queue.worker_count", "must be within 1..=50"));
        }
        if !(5..=300).contains(&self.queue.pop_timeout_secs) {
            issues.push(error("queue.pop_timeout_secs", "must be within 5..=300"));
        }

        if !(1..=24).contains(&self.partitions.months_ahead) {
            issues.push(error("partitions.months_ahead", "must be within 1..=24"));
        }

        if !(10..=300).contains(&self.aggregation.misfire_grace_secs) {
            issues.push(error(
                "aggregation.misfire_grace_secs",
                "must be within 10..=300",
            ));
        }

        // JWT secret: hard requirement in production, warning elsewhere.
        if self.security.jwt_secret.len() < 32 {
            if self.server.environment == Environment::Production {
                issues.push(error(
                    "security.jwt_secret",
                    "production requires a secret of at least 32 characters",
                ));
            } else {
                issues.push(warning(
                    "security.jwt_secret",
                    "secret shorter than 32 characters (rejected in production)",
                ));
            }
        }
        if !(10..=14).contains(&self.security.bcrypt_cost) {
            issues.push(error("security.bcrypt_cost", "must be within 10..=14"));
        }
        if !(5..=1440).contains(&self.security.access_token_ttl_mins) {
            issues.push(error(
                "security.access_token_ttl_mins",
                "must be within 5..=1440",
            ));
        }
        if !(1..=30).contains(&self.security.refresh_token_ttl_days) {
            issues.push(error(
                "security.refresh_token_ttl_days",
                "must be within 1..=30",
            ));
        }
        if !(10..=100_000).contains(&self.security.default_rate_limit_per_minute) {
            issues.push(error(
                "security.default_rate_limit_per_minute",
                "must be within 10..=100000",
            ));
        }
        if !(100..=10_000_000).contains(&self.security.default_rate_limit_per_hour) {
            issues.push(error(
                "security.default_rate_limit_per_hour",
                "must be within 100..=10000000",
            ));
        }
        if !(1_000..=100_000_000).contains(&self.security.default_daily_quota) {
            issues.push(error(
                "security.default_daily_quota",
                "must be within 1000..=100000000",
            ));
        }

        issues
    }

    /// True when any issue is a hard error.
    pub fn has_errors(issues: &[ConfigIssue]) -> bool {
        issues.iter().any(|i| i.severity == ConfigSeverity::Error)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn find_issue<'a>(issues: &'a [ConfigIssue], field: &str) -> Option<&'a ConfigIssue> {
        issues.iter().find(|i| i.field.starts_with(field))
    }

    #[test]
    fn default_config_has_no_errors() {
        let issues = Config::default().validate();
        let errors: Vec<_> = issues
            .iter()
            .filter(|i| i.severity == ConfigSeverity::Error)
            .collect();
        assert!(errors.is_empty(), "expected no errors, got: {errors:?}");
    }

    #[test]
    fn default_config_warns_about_jwt_secret() {
        let issues = Config::default().validate();
        let issue = find_issue(&issues, "security.jwt_secret").expect("expected warning");
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn production_requires_long_jwt_secret() {
        let mut cfg = Config::default();
        cfg.server.environment = Environment::Production;
        cfg.security.jwt_secret = "short".into();
        let issues = cfg.validate();
        let issue = find_issue(&issues, "security.jwt_secret").expect("expected error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn production_with_long_secret_passes() {
        let mut cfg = Config::default();
        cfg.server.environment = Environment::Production;
        cfg.security.jwt_secret = "x".repeat(32);
        let issues = cfg.validate();
        assert!(find_issue(&issues, "security.jwt_secret").is_none());
    }

    #[test]
    fn pool_size_out_of_range_is_error() {
        let mut cfg = Config::default();
        cfg.database.pool_size = 2;
        let issues = cfg.validate();
        let issue = find_issue(&issues, "database.pool_size").expect("expected error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn queue_depth_bounds() {
        let mut cfg = Config::default();
        cfg.queue.max_depth = 9_999;
        assert!(find_issue(&cfg.validate(), "queue.max_depth").is_some());
        cfg.queue.max_depth = 10_000;
        assert!(find_issue(&cfg.validate(), "queue.max_depth").is_none());
        cfg.queue.max_depth = 1_000_001;
        assert!(find_issue(&cfg.validate(), "queue.max_depth").is_some());
    }

    #[test]
    fn breaker_threshold_bounds() {
        let mut cfg = Config::default();
        cfg.circuit_breaker.failure_threshold = 2;
        assert!(find_issue(&cfg.validate(), "circuit_breaker.failure_threshold").is_some());
        cfg.circuit_breaker.failure_threshold = 20;
        assert!(find_issue(&cfg.validate(), "circuit_breaker.failure_threshold").is_none());
    }

    #[test]
    fn issue_display_format() {
        let issue = ConfigIssue {
            severity: ConfigSeverity::Error,
            field: "server.http_port".into(),
            message: "port must be greater than 0".into(),
        };
        assert_eq!(
            format!("{issue}"),
            "[ERROR] server.http_port: port must be greater than 0"
        );
    }

    #[test]
    fn toml_roundtrip_with_partial_file() {
        let raw = r#"
            [server]
            http_port = 9000

            [queue]
            worker_count = 8
        "#;
        let cfg: Config = toml::from_str(raw).expect("parse");
        assert_eq!(cfg.server.http_port, 9000);
        assert_eq!(cfg.queue.worker_count, 8);
        // Untouched sections keep their defaults.
        assert_eq!(cfg.queue.batch_size, 1000);
        assert_eq!(cfg.cache.api_key_ttl_secs, 300);
    }
}
