/// Shared error type used across all Ledger crates.
///
/// Variants map one-to-one onto the platform's externally visible error
/// kinds; the gateway translates them to HTTP statuses and the services
/// translate them to gRPC status codes.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    /// Per-minute or per-hour window exceeded. `retry_after` is seconds.
    #[error("rate limited: {detail}")]
    RateLimited { retry_after: u64, detail: String },

    #[error("daily quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Queue at max depth; upstream should back off.
    #[error("backpressure: {0}")]
    Backpressure(String),

    #[error("{service} unavailable: {detail}")]
    Unavailable { service: String, detail: String },

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database: {0}")]
    Database(String),

    #[error("kv store: {0}")]
    Kv(String),

    #[error("config: {0}")]
    Config(String),

    #[error("internal: {0}")]
    Internal(String),
}

impl Error {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn unauthenticated(msg: impl Into<String>) -> Self {
        Self::Unauthenticated(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn unavailable(service: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Unavailable {
            service: service.into(),
            detail: detail.into(),
        }
    }

    /// Wrap a database driver error.
    pub fn db(err: impl std::fmt::Display) -> Self {
        Self::Database(err.to_string())
    }

    /// Wrap a KV store driver error.
    pub fn kv(err: impl std::fmt::Display) -> Self {
        Self::Kv(err.to_string())
    }

    pub fn internal(err: impl std::fmt::Display) -> Self {
        Self::Internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
