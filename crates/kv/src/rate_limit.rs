//! Fixed-window rate limiting and daily quota counters.
//!
//! Lock-free: all coordination happens through atomic INCRs on
//! `ratelimit:<project>:min:<bucket>` / `ratelimit:<project>:hour:<bucket>`
//! keys and the `usage:<project>:<yyyymmdd>` quota counter.

use chrono::Utc;

use ledger_domain::{Error, Result};

use crate::client::KvStore;

/// Outcome of one rate-limit check, carrying both window counts so the
/// caller can build response headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub minute_count: i64,
    pub minute_limit: u32,
    pub hour_count: i64,
    pub hour_limit: u32,
}

impl RateLimitDecision {
    pub fn allowed(&self) -> bool {
        self.minute_count <= self.minute_limit as i64 && self.hour_count <= self.hour_limit as i64
    }

    pub fn hour_exceeded(&self) -> bool {
        self.hour_count > self.hour_limit as i64
    }

    /// Seconds the client should wait before retrying: the full hour window
    /// when the hourly budget is spent, otherwise the minute window.
    pub fn retry_after_secs(&self) -> u64 {
        if self.hour_exceeded() {
            3600
        } else {
            60
        }
    }

    pub fn minute_remaining(&self) -> i64 {
        (self.minute_limit as i64 - self.minute_count).max(0)
    }

    pub fn hour_remaining(&self) -> i64 {
        (self.hour_limit as i64 - self.hour_count).max(0)
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    kv: KvStore,
}

impl RateLimiter {
    pub fn new(kv: KvStore) -> Self {
        Self { kv }
    }

    /// Count this request against both windows in one pipelined round trip:
    /// INCR minute, EXPIRE minute 60, INCR hour, EXPIRE hour 3600.
    pub async fn check(
        &self,
        project_id: i64,
        limit_per_minute: u32,
        limit_per_hour: u32,
    ) -> Result<RateLimitDecision> {
        let now = Utc::now().timestamp();
        let minute_key = format!("ratelimit:{project_id}:min:{}", now / 60);
        let hour_key = format!("ratelimit:{project_id}:hour:{}", now / 3600);

        let mut con = self.kv.connection();
        let (minute_count, _, hour_count, _): (i64, i64, i64, i64) = self
            .kv
            .deadline(async move {
                redis::pipe()
                    .incr(&minute_key, 1)
                    .expire(&minute_key, 60)
                    .incr(&hour_key, 1)
                    .expire(&hour_key, 3600)
                    .query_async(&mut con)
                    .await
                    .map_err(Error::kv)
            })
            .await?;

        Ok(RateLimitDecision {
            minute_count,
            minute_limit: limit_per_minute,
            hour_count,
            hour_limit: limit_per_hour,
        })
    }

    // ── Daily quota ──────────────────────────────────────────────────

    fn usage_key(project_id: i64) -> String {
        format!("usage:{project_id}:{}", Utc::now().format("%Y%m%d"))
    }

    pub async fn daily_usage(&self, project_id: i64) -> Result<i64> {
        let raw = self.kv.get(&Self::usage_key(project_id)).await?;
        Ok(raw.and_then(|v| v.parse().ok()).unwrap_or(0))
    }

    /// Bump the calendar-day counter; the 48 h expiry outlives the day it
    /// counts so late readers still see it.
    pub async fn increment_daily_usage(&self, project_id: i64, amount: i64) -> Result<()> {
        let key = Self::usage_key(project_id);
        let mut con = self.kv.connection();
        self.kv
            .deadline(async move {
                redis::pipe()
                    .incr(&key, amount)
                    .expire(&key, 48 * 3600)
                    .query_async::<()>(&mut con)
                    .await
                    .map_err(Error::kv)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decision(minute: i64, hour: i64) -> RateLimitDecision {
        RateLimitDecision {
            minute_count: minute,
            minute_limit: 3,
            hour_count: hour,
            hour_limit: 100,
        }
    }

    #[test]
    fn within_both_windows_is_allowed() {
        assert!(decision(3, 50).allowed());
    }

    #[test]
    fn minute_window_rejects_with_60s_retry() {
        let d = decision(4, 50);
        assert!(!d.allowed());
        assert!(!d.hour_exceeded());
        assert_eq!(d.retry_after_secs(), 60);
    }

    #[test]
    fn hour_window_rejects_with_3600s_retry() {
        let d = decision(1, 101);
        assert!(!d.allowed());
        assert!(d.hour_exceeded());
        assert_eq!(d.retry_after_secs(), 3600);
    }

    #[test]
    fn remaining_counts_never_go_negative() {
        let d = decision(10, 200);
        assert_eq!(d.minute_remaining(), 0);
        assert_eq!(d.hour_remaining(), 0);
        let d = decision(1, 1);
        assert_eq!(d.minute_remaining(), 2);
        assert_eq!(d.hour_remaining(), 99);
    }
}
