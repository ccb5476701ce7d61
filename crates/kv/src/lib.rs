//! Typed access to the shared KV store.
//!
//! Every Redis interaction in the platform goes through this crate — the
//! API-key cache, the dual-window rate limiter, the daily quota counters,
//! the per-project log queues and the notification pub/sub. Raw commands
//! never leak into service code.

pub mod api_key_cache;
pub mod client;
pub mod metrics_cache;
pub mod pubsub;
pub mod queue;
pub mod rate_limit;

pub use api_key_cache::{hash_secret, ApiKeyCache, ApiKeyRecord};
pub use client::KvStore;
pub use pubsub::{NotificationMessage, NotificationPublisher, NotificationSubscriber};
pub use queue::LogQueue;
pub use rate_limit::{RateLimitDecision, RateLimiter};
