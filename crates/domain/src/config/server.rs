use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Deployment environment tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
    Test,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default = "d_true")]
    pub debug: bool,
    /// `tracing` filter directive, e.g. `info` or `ledger_gateway=debug`.
    #[serde(default = "d_log_level")]
    pub log_level: String,
    #[serde(default = "d_host")]
    pub host: String,
    /// Gateway HTTP port (ignored by the RPC services).
    #[serde(default = "d_http_port")]
    pub http_port: u16,
    /// Max accepted request body, in MiB.
    #[serde(default = "d_body_limit")]
    pub request_body_limit_mb: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            debug: true,
            log_level: d_log_level(),
            host: d_host(),
            http_port: d_http_port(),
            request_body_limit_mb: d_body_limit(),
        }
    }
}

fn d_true() -> bool {
    true
}
fn d_log_level() -> String {
    "info".into()
}
fn d_host() -> String {
    "0.0.0.0".into()
}
fn d_http_port() -> u16 {
    8000
}
fn d_body_limit() -> usize {
    5
}
