use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SQL store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Full connection URL. Takes precedence over the host/port fields
    /// when set (also settable via `LEDGER_DATABASE_URL`).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "d_localhost")]
    pub host: String,
    #[serde(default = "d_pg_port")]
    pub port: u16,
    #[serde(default = "d_db_name")]
    pub name: String,
    #[serde(default = "d_postgres")]
    pub user: String,
    #[serde(default = "d_postgres")]
    pub password: String,
    #[serde(default = "d_pool_size")]
    pub pool_size: u32,
    #[serde(default = "d_overflow")]
    pub max_overflow: u32,
    #[serde(default = "d_acquire_timeout")]
    pub acquire_timeout_secs: u64,
}

impl DatabaseConfig {
    /// The effective connection URL.
    pub fn connect_url(&self) -> String {
        match &self.url {
            Some(url) => url.clone(),
            None => format!(
                "postgres://{}:{}@{}:{}/{}",
                self.user, self.password, self.host, self.port, self.name
            ),
        }
    }

    /// Pool ceiling: configured size plus overflow headroom.
    pub fn max_connections(&self) -> u32 {
        self.pool_size + self.max_overflow
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: d_localhost(),
            port: d_pg_port(),
            name: d_db_name(),
            user: d_postgres(),
            password: d_postgres(),
            pool_size: d_pool_size(),
            max_overflow: d_overflow(),
            acquire_timeout_secs: d_acquire_timeout(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// KV store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Full connection URL (also settable via `LEDGER_REDIS_URL`).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "d_localhost")]
    pub host: String,
    #[serde(default = "d_redis_port")]
    pub port: u16,
    #[serde(default)]
    pub db: u8,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "d_max_conns")]
    pub max_connections: u32,
    /// Per-operation timeout, seconds.
    #[serde(default = "d_kv_timeout")]
    pub timeout_secs: u64,
}

impl RedisConfig {
    pub fn connect_url(&self) -> String {
        match &self.url {
            Some(url) => url.clone(),
            None => match &self.password {
                Some(pw) => format!("redis://:{}@{}:{}/{}", pw, self.host, self.port, self.db),
                None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
            },
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: d_localhost(),
            port: d_redis_port(),
            db: 0,
            password: None,
            max_connections: d_max_conns(),
            timeout_secs: d_kv_timeout(),
        }
    }
}

fn d_localhost() -> String {
    "localhost".into()
}
fn d_pg_port() -> u16 {
    5432
}
fn d_db_name() -> String {
    "ledger".into()
}
fn d_postgres() -> String {
    "postgres".into()
}
fn d_pool_size() -> u32 {
    20
}
fn d_overflow() -> u32 {
    10
}
fn d_acquire_timeout() -> u64 {
    30
}
fn d_redis_port() -> u16 {
    6379
}
fn d_max_conns() -> u32 {
    50
}
fn d_kv_timeout() -> u64 {
    1
}
