use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Security
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// HMAC secret for session tokens. Must be at least 32 characters in
    /// production; also settable via `LEDGER_JWT_SECRET`.
    #[serde(default = "d_jwt_secret")]
    pub jwt_secret: String,
    #[serde(default = "d_access_ttl")]
    pub access_token_ttl_mins: i64,
    #[serde(default = "d_refresh_ttl")]
    pub refresh_token_ttl_days: i64,
    #[serde(default = "d_bcrypt_cost")]
    pub bcrypt_cost: u32,
    /// Defaults applied to newly created API keys / projects.
    #[serde(default = "d_per_minute")]
    pub default_rate_limit_per_minute: u32,
    #[serde(default = "d_per_hour")]
    pub default_rate_limit_per_hour: u32,
    #[serde(default = "d_daily_quota")]
    pub default_daily_quota: i64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            jwt_secret: d_jwt_secret(),
            access_token_ttl_mins: d_access_ttl(),
            refresh_token_ttl_days: d_refresh_ttl(),
            bcrypt_cost: d_bcrypt_cost(),
            default_rate_limit_per_minute: d_per_minute(),
            default_rate_limit_per_hour: d_per_hour(),
            default_daily_quota: d_daily_quota(),
        }
    }
}

fn d_jwt_secret() -> String {
    // Dev-only placeholder; validation rejects it in production.
    "dev-secret".into()
}
fn d_access_ttl() -> i64 {
    15
}
fn d_refresh_ttl() -> i64 {
    7
}
fn d_bcrypt_cost() -> u32 {
    12
}
fn d_per_minute() -> u32 {
    1_000
}
fn d_per_hour() -> u32 {
    50_000
}
fn d_daily_quota() -> i64 {
    1_000_000
}
