//! Per-downstream circuit breakers.
//!
//! CLOSED passes calls through and counts consecutive failures; OPEN
//! fast-fails until the recovery timeout has elapsed; HALF_OPEN admits a
//! bounded number of concurrent probes — one success closes the circuit,
//! any failure reopens it. Only transport-class errors count as failures:
//! a clean application error from the downstream proves the service is up.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

use ledger_domain::config::CircuitBreakerConfig;
use ledger_domain::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
    half_open_calls: u32,
}

pub struct CircuitBreaker {
    service: String,
    failure_threshold: u32,
    recovery_timeout: Duration,
    half_open_max_calls: u32,
    inner: Mutex<Inner>,
    total_calls: AtomicU64,
    failed_calls: AtomicU64,
    rejected_calls: AtomicU64,
}

/// Errors that indicate the downstream itself is unhealthy, as opposed to
/// a well-formed rejection of this particular request.
fn counts_as_failure(err: &Error) -> bool {
    matches!(
        err,
        Error::Unavailable { .. }
            | Error::Internal(_)
            | Error::Database(_)
            | Error::Kv(_)
            | Error::Io(_)
    )
}

impl CircuitBreaker {
    pub fn new(service: impl Into<String>, config: &CircuitBreakerConfig) -> Self {
        Self {
            service: service.into(),
            failure_threshold: config.failure_threshold,
            recovery_timeout: Duration::from_secs(config.recovery_timeout_secs),
            half_open_max_calls: config.half_open_max_calls,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure: None,
                half_open_calls: 0,
            }),
            total_calls: AtomicU64::new(0),
            failed_calls: AtomicU64::new(0),
            rejected_calls: AtomicU64::new(0),
        }
    }

    /// Run `f` under the breaker.
    pub async fn call<T, F, Fut>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        let admitted_half_open = self.admit().await?;

        let result = f().await;

        match &result {
            Ok(_) => self.on_success().await,
            Err(e) if counts_as_failure(e) => self.on_failure().await,
            // Application-level errors complete the probe successfully.
            Err(_) => self.on_success().await,
        }

        if admitted_half_open {
            let mut inner = self.inner.lock().await;
            inner.half_open_calls = inner.half_open_calls.saturating_sub(1);
        }

        result
    }

    /// Gate the call. Returns whether it was admitted as a half-open probe.
    async fn admit(&self) -> Result<bool> {
        let mut inner = self.inner.lock().await;

        if inner.state == CircuitState::Open {
            let recovered = inner
                .last_failure
                .is_some_and(|t| t.elapsed() >= self.recovery_timeout);
            if recovered {
                tracing::info!(service = %self.service, "circuit breaker transitioning to HALF_OPEN");
                inner.state = CircuitState::HalfOpen;
                inner.half_open_calls = 0;
            } else {
                self.rejected_calls.fetch_add(1, Ordering::Relaxed);
                return Err(Error::unavailable(
                    self.service.clone(),
                    "currently unavailable",
                ));
            }
        }

        if inner.state == CircuitState::HalfOpen {
            if inner.half_open_calls >= self.half_open_max_calls {
                self.rejected_calls.fetch_add(1, Ordering::Relaxed);
                return Err(Error::unavailable(
                    self.service.clone(),
                    "recovering, try again",
                ));
            }
            inner.half_open_calls += 1;
            return Ok(true);
        }

        Ok(false)
    }

    async fn on_success(&self) {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CircuitState::HalfOpen => {
                tracing::info!(service = %self.service, "circuit breaker transitioning to CLOSED");
                inner.state = CircuitState::Closed;
                inner.failure_count = 0;
                inner.last_failure = None;
            }
            CircuitState::Closed => inner.failure_count = 0,
            CircuitState::Open => {}
        }
    }

    async fn on_failure(&self) {
        self.failed_calls.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.lock().await;
        inner.failure_count += 1;
        inner.last_failure = Some(Instant::now());

        match inner.state {
            CircuitState::HalfOpen => {
                tracing::warn!(service = %self.service, "circuit breaker reopening after failed probe");
                inner.state = CircuitState::Open;
            }
            CircuitState::Closed if inner.failure_count >= self.failure_threshold => {
                tracing::error!(
                    service = %self.service,
                    failures = inner.failure_count,
                    "circuit breaker transitioning to OPEN"
                );
                inner.state = CircuitState::Open;
            }
            _ => {}
        }
    }

    pub async fn state(&self) -> CircuitState {
        self.inner.lock().await.state
    }

    pub async fn stats(&self) -> BreakerStats {
        let inner = self.inner.lock().await;
        BreakerStats {
            service: self.service.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            total_calls: self.total_calls.load(Ordering::Relaxed),
            failed_calls: self.failed_calls.load(Ordering::Relaxed),
            rejected_calls: self.rejected_calls.load(Ordering::Relaxed),
            last_failure_secs_ago: inner.last_failure.map(|t| t.elapsed().as_secs()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BreakerStats {
    pub service: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub total_calls: u64,
    pub failed_calls: u64,
    pub rejected_calls: u64,
    pub last_failure_secs_ago: Option<u64>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Registry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One breaker per downstream, created on first use.
pub struct CircuitBreakers {
    config: CircuitBreakerConfig,
    breakers: parking_lot::RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl CircuitBreakers {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: parking_lot::RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, service: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.read().get(service) {
            return breaker.clone();
        }
        let mut breakers = self.breakers.write();
        breakers
            .entry(service.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(service, &self.config)))
            .clone()
    }

    pub async fn all_stats(&self) -> Vec<BreakerStats> {
        let breakers: Vec<_> = self.breakers.read().values().cloned().collect();
        let mut stats = Vec::with_capacity(breakers.len());
        for breaker in breakers {
            stats.push(breaker.stats().await);
        }
        stats.sort_by(|a, b| a.service.cmp(&b.service));
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 3,
            recovery_timeout_secs: 30,
            half_open_max_calls: 2,
        }
    }

    async fn fail(breaker: &CircuitBreaker) {
        let _ = breaker
            .call(|| async { Err::<(), _>(Error::unavailable("svc", "down")) })
            .await;
    }

    #[tokio::test]
    async fn opens_after_threshold_consecutive_failures() {
        let breaker = CircuitBreaker::new("svc", &config());
        for _ in 0..3 {
            fail(&breaker).await;
        }
        assert_eq!(breaker.state().await, CircuitState::Open);
    }

    #[tokio::test]
    async fn open_circuit_fast_fails_without_invoking() {
        let breaker = CircuitBreaker::new("svc", &config());
        for _ in 0..3 {
            fail(&breaker).await;
        }

        let mut invoked = false;
        let result = breaker
            .call(|| {
                invoked = true;
                async { Ok::<_, Error>(()) }
            })
            .await;
        assert!(result.is_err());
        assert!(!invoked, "open breaker must not invoke the wrapped call");
        assert_eq!(breaker.stats().await.rejected_calls, 1);
    }

    #[tokio::test]
    async fn success_resets_consecutive_failure_count() {
        let breaker = CircuitBreaker::new("svc", &config());
        fail(&breaker).await;
        fail(&breaker).await;
        breaker.call(|| async { Ok::<_, Error>(()) }).await.unwrap();
        assert_eq!(breaker.stats().await.failure_count, 0);
        fail(&breaker).await;
        fail(&breaker).await;
        // Two more failures after the reset should not open a threshold-3
        // breaker.
        assert_eq!(breaker.state().await, CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_through_half_open_on_success() {
        let breaker = CircuitBreaker::new("svc", &config());
        for _ in 0..3 {
            fail(&breaker).await;
        }
        assert_eq!(breaker.state().await, CircuitState::Open);

        tokio::time::advance(Duration::from_secs(31)).await;
        breaker.call(|| async { Ok::<_, Error>(()) }).await.unwrap();
        assert_eq!(breaker.state().await, CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_failure_reopens() {
        let breaker = CircuitBreaker::new("svc", &config());
        for _ in 0..3 {
            fail(&breaker).await;
        }
        tokio::time::advance(Duration::from_secs(31)).await;
        fail(&breaker).await;
        assert_eq!(breaker.state().await, CircuitState::Open);
    }

    #[tokio::test]
    async fn application_errors_do_not_trip_the_breaker() {
        let breaker = CircuitBreaker::new("svc", &config());
        for _ in 0..10 {
            let _ = breaker
                .call(|| async { Err::<(), _>(Error::not_found("missing")) })
                .await;
        }
        assert_eq!(breaker.state().await, CircuitState::Closed);
        assert_eq!(breaker.stats().await.failed_calls, 0);
    }

    #[tokio::test]
    async fn registry_reuses_instances() {
        let registry = CircuitBreakers::new(config());
        let a = registry.get("account");
        let b = registry.get("account");
        assert!(Arc::ptr_eq(&a, &b));
        let _ = registry.get("query");
        assert_eq!(registry.all_stats().await.len(), 2);
    }
}
