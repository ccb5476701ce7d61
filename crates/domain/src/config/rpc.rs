use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// RPC plumbing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "d_account_addr")]
    pub account_addr: String,
    #[serde(default = "d_ingestion_addr")]
    pub ingestion_addr: String,
    #[serde(default = "d_query_addr")]
    pub query_addr: String,
    /// Listen ports for the service binaries themselves.
    #[serde(default = "d_account_port")]
    pub account_port: u16,
    #[serde(default = "d_ingestion_port")]
    pub ingestion_port: u16,
    #[serde(default = "d_query_port")]
    pub query_port: u16,
    /// Channels per downstream service.
    #[serde(default = "d_pool_size")]
    pub pool_size: usize,
    /// HTTP/2 keepalive ping interval, milliseconds.
    #[serde(default = "d_keepalive_ms")]
    pub keepalive_time_ms: u64,
    #[serde(default = "d_keepalive_timeout_ms")]
    pub keepalive_timeout_ms: u64,
    /// Default per-call deadline, seconds.
    #[serde(default = "d_timeout")]
    pub request_timeout_secs: u64,
    /// Deadline for batch ingestion calls, seconds.
    #[serde(default = "d_batch_timeout")]
    pub batch_timeout_secs: u64,
    /// Max inbound/outbound message size, MiB.
    #[serde(default = "d_max_message_mb")]
    pub max_message_mb: usize,
}

impl RpcConfig {
    pub fn max_message_bytes(&self) -> usize {
        self.max_message_mb * 1024 * 1024
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            account_addr: d_account_addr(),
            ingestion_addr: d_ingestion_addr(),
            query_addr: d_query_addr(),
            account_port: d_account_port(),
            ingestion_port: d_ingestion_port(),
            query_port: d_query_port(),
            pool_size: d_pool_size(),
            keepalive_time_ms: d_keepalive_ms(),
            keepalive_timeout_ms: d_keepalive_timeout_ms(),
            request_timeout_secs: d_timeout(),
            batch_timeout_secs: d_batch_timeout(),
            max_message_mb: d_max_message_mb(),
        }
    }
}

fn d_account_addr() -> String {
    "http://localhost:50051".into()
}
fn d_ingestion_addr() -> String {
    "http://localhost:50052".into()
}
fn d_query_addr() -> String {
    "http://localhost:50053".into()
}
fn d_account_port() -> u16 {
    50051
}
fn d_ingestion_port() -> u16 {
    50052
}
fn d_query_port() -> u16 {
    50053
}
fn d_pool_size() -> usize {
    10
}
fn d_keepalive_ms() -> u64 {
    10_000
}
fn d_keepalive_timeout_ms() -> u64 {
    5_000
}
fn d_timeout() -> u64 {
    5
}
fn d_batch_timeout() -> u64 {
    10
}
fn d_max_message_mb() -> usize {
    16
}
