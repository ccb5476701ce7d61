//! Pooled gRPC channels to the downstream services.
//!
//! Each service gets a fixed-size pool of lazily connected channels with
//! HTTP/2 keepalive; a round-robin index picks the channel for each call.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tonic::transport::{Channel, Endpoint};

use ledger_domain::config::RpcConfig;
use ledger_domain::{Error, Result};
use ledger_proto::account::account_service_client::AccountServiceClient;
use ledger_proto::ingestion::ingestion_service_client::IngestionServiceClient;
use ledger_proto::query::query_service_client::QueryServiceClient;

pub struct ChannelPool {
    service: &'static str,
    address: String,
    channels: Vec<Channel>,
    next: AtomicUsize,
}

impl ChannelPool {
    fn connect(
        service: &'static str,
        address: &str,
        config: &RpcConfig,
        call_timeout: Duration,
    ) -> Result<Self> {
        let mut channels = Vec::with_capacity(config.pool_size);
        for _ in 0..config.pool_size {
            let endpoint = Endpoint::from_shared(address.to_string())
                .map_err(|e| Error::Config(format!("invalid {service} address: {e}")))?
                .http2_keep_alive_interval(Duration::from_millis(config.keepalive_time_ms))
                .keep_alive_timeout(Duration::from_millis(config.keepalive_timeout_ms))
                .timeout(call_timeout)
                .connect_timeout(Duration::from_secs(5));
            channels.push(endpoint.connect_lazy());
        }
        Ok(Self {
            service,
            address: address.to_string(),
            channels,
            next: AtomicUsize::new(0),
        })
    }

    /// Round-robin pick.
    pub fn channel(&self) -> Channel {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.channels.len();
        self.channels[index].clone()
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            service: self.service,
            address: self.address.clone(),
            pool_size: self.channels.len(),
            next_index: self.next.load(Ordering::Relaxed) % self.channels.len().max(1),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PoolStats {
    pub service: &'static str,
    pub address: String,
    pub pool_size: usize,
    pub next_index: usize,
}

/// All downstream pools plus typed client constructors.
pub struct RpcClients {
    account: ChannelPool,
    ingestion: ChannelPool,
    query: ChannelPool,
    max_message_bytes: usize,
}

impl RpcClients {
    pub fn connect(config: &RpcConfig) -> Result<Arc<Self>> {
        let request_timeout = Duration::from_secs(config.request_timeout_secs);
        let batch_timeout = Duration::from_secs(config.batch_timeout_secs);
        Ok(Arc::new(Self {
            account: ChannelPool::connect("account", &config.account_addr, config, request_timeout)?,
            // Ingestion carries batches; it gets the longer deadline.
            ingestion: ChannelPool::connect(
                "ingestion",
                &config.ingestion_addr,
                config,
                batch_timeout,
            )?,
            query: ChannelPool::connect("query", &config.query_addr, config, request_timeout)?,
            max_message_bytes: config.max_message_bytes(),
        }))
    }

    pub fn account(&self) -> AccountServiceClient<Channel> {
        AccountServiceClient::new(self.account.channel())
            .max_decoding_message_size(self.max_message_bytes)
            .max_encoding_message_size(self.max_message_bytes)
    }

    pub fn ingestion(&self) -> IngestionServiceClient<Channel> {
        IngestionServiceClient::new(self.ingestion.channel())
            .max_decoding_message_size(self.max_message_bytes)
            .max_encoding_message_size(self.max_message_bytes)
    }

    pub fn query(&self) -> QueryServiceClient<Channel> {
        QueryServiceClient::new(self.query.channel())
            .max_decoding_message_size(self.max_message_bytes)
            .max_encoding_message_size(self.max_message_bytes)
    }

    pub fn stats(&self) -> Vec<PoolStats> {
        vec![
            self.account.stats(),
            self.ingestion.stats(),
            self.query.stats(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_robin_cycles_over_the_pool() {
        let config = RpcConfig {
            pool_size: 3,
            ..RpcConfig::default()
        };
        let pool =
            ChannelPool::connect("account", "http://localhost:50051", &config, Duration::from_secs(5))
                .unwrap();
        // Three picks advance the index across the whole pool and wrap.
        for expected in [1, 2, 0, 1] {
            let _ = pool.channel();
            assert_eq!(pool.stats().next_index, expected);
        }
    }

    #[test]
    fn invalid_address_is_a_config_error() {
        let config = RpcConfig::default();
        let result = ChannelPool::connect("account", "not a uri", &config, Duration::from_secs(5));
        assert!(result.is_err());
    }
}
