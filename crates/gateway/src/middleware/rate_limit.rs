//! Rate limiting and daily quota enforcement.
//!
//! Runs after authentication and only for project-scoped requests. On a KV
//! failure the check fails open — admission control must never take the
//! platform down with it. Every authenticated response carries the
//! per-minute and per-hour limit headers.

use std::sync::atomic::Ordering;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use ledger_domain::Error;

use crate::error::ApiError;
use crate::state::{AppState, AuthContext};

const EXEMPT_PATHS: &[&str] = &["/health", "/health/deep", "/metrics"];

pub async fn enforce(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if EXEMPT_PATHS.contains(&req.uri().path()) {
        return next.run(req).await;
    }

    // No context (public path) or no project (session token): nothing to
    // meter.
    let Some(ctx) = req.extensions().get::<AuthContext>().cloned() else {
        return next.run(req).await;
    };
    let Some(project_id) = ctx.project_id else {
        return next.run(req).await;
    };

    state
        .rate_limit_stats
        .total_requests
        .fetch_add(1, Ordering::Relaxed);

    match state
        .rate_limiter
        .check(project_id, ctx.rate_limit_per_minute, ctx.rate_limit_per_hour)
        .await
    {
        Ok(decision) if !decision.allowed() => {
            state
                .rate_limit_stats
                .limited_requests
                .fetch_add(1, Ordering::Relaxed);
            let detail = if decision.hour_exceeded() {
                format!(
                    "Hourly rate limit exceeded. Current: {}, Limit: {}",
                    decision.hour_count, decision.hour_limit
                )
            } else {
                format!(
                    "Per-minute rate limit exceeded. Current: {}, Limit: {}",
                    decision.minute_count, decision.minute_limit
                )
            };
            tracing::warn!(project_id, %detail, "rate limit exceeded");
            return ApiError::from(Error::RateLimited {
                retry_after: decision.retry_after_secs(),
                detail,
            })
            .with_header(
                "X-RateLimit-Limit-Minute",
                decision.minute_limit.to_string(),
            )
            .with_header(
                "X-RateLimit-Remaining-Minute",
                decision.minute_remaining().to_string(),
            )
            .with_header("X-RateLimit-Limit-Hour", decision.hour_limit.to_string())
            .with_header(
                "X-RateLimit-Remaining-Hour",
                decision.hour_remaining().to_string(),
            )
            .into_response();
        }
        Ok(_) => {}
        Err(e) => {
            // Fail open; the window resets on its own.
            tracing::error!(project_id, error = %e, "rate limit check failed, allowing request");
        }
    }

    // Daily quota is a distinct rejection with its own status code.
    match state.rate_limiter.daily_usage(project_id).await {
        Ok(usage) if usage >= ctx.daily_quota => {
            tracing::warn!(project_id, usage, quota = ctx.daily_quota, "daily quota exceeded");
            return ApiError::from(Error::QuotaExceeded(format!(
                "Daily quota exceeded: {usage}/{}",
                ctx.daily_quota
            )))
            .into_response();
        }
        Ok(_) => {}
        Err(e) => tracing::error!(project_id, error = %e, "quota check failed, allowing request"),
    }

    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&ctx.rate_limit_per_minute.to_string()) {
        headers.insert("X-RateLimit-Limit-Minute", value);
    }
    if let Ok(value) = HeaderValue::from_str(&ctx.rate_limit_per_hour.to_string()) {
        headers.insert("X-RateLimit-Limit-Hour", value);
    }
    response
}
