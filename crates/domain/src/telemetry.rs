//! Tracing setup shared by all service binaries.

use crate::config::{Config, Environment};

/// Initialize the global tracing subscriber.
///
/// Development gets compact human-readable output; staging and production
/// get JSON lines. `RUST_LOG` overrides the configured filter.
pub fn init(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.server.log_level.clone()));

    match config.server.environment {
        Environment::Development | Environment::Test => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .compact()
                .init();
        }
        Environment::Staging | Environment::Production => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .init();
        }
    }
}
