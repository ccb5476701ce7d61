//! Authentication middleware.
//!
//! Public paths pass straight through. Otherwise a credential is extracted
//! (X-API-Key, then Authorization), validated — API keys against the cache
//! with an account-service fallback behind the circuit breaker, session
//! tokens against the shared secret — and the resulting [`AuthContext`] is
//! attached to the request.

use std::sync::atomic::Ordering;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use sha2::{Digest, Sha256};

use ledger_domain::Error;
use ledger_kv::ApiKeyRecord;
use ledger_proto::account::ValidateApiKeyRequest;
use ledger_proto::convert::status_to_error;

use crate::error::ApiError;
use crate::state::{AppState, AuthContext};

const PUBLIC_PATHS: &[&str] = &[
    "/health",
    "/health/deep",
    "/metrics",
    "/docs",
    "/openapi.json",
    "/api/v1/accounts/register",
    "/api/v1/accounts/login",
    "/api/v1/accounts/refresh",
];

const API_KEY_PREFIX: &str = "ledger_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    ApiKey,
    Session,
}

/// Extract the credential per the documented precedence: `X-API-Key`,
/// then `Authorization: Bearer <v>` (prefix-sniffed), then a bare
/// `Authorization` token treated as an API key.
pub fn extract_credential(
    api_key_header: Option<&str>,
    authorization: Option<&str>,
) -> Result<(String, CredentialKind), Error> {
    if let Some(value) = api_key_header {
        return Ok((value.to_string(), CredentialKind::ApiKey));
    }

    let Some(header) = authorization else {
        return Err(Error::unauthenticated(
            "missing authentication header (X-API-Key or Authorization)",
        ));
    };

    let parts: Vec<&str> = header.split_whitespace().collect();
    match parts.as_slice() {
        [scheme, token] if scheme.eq_ignore_ascii_case("bearer") => {
            if token.starts_with(API_KEY_PREFIX) {
                Ok((token.to_string(), CredentialKind::ApiKey))
            } else {
                Ok((token.to_string(), CredentialKind::Session))
            }
        }
        [token] => Ok((token.to_string(), CredentialKind::ApiKey)),
        _ => Err(Error::unauthenticated("invalid Authorization header format")),
    }
}

/// Key under which a revoked session token is remembered.
pub fn session_revocation_key(token: &str) -> String {
    format!("session:{}", hex::encode(Sha256::digest(token.as_bytes())))
}

pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if PUBLIC_PATHS.contains(&req.uri().path()) {
        return next.run(req).await;
    }

    let api_key_header = req
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let authorization = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let (credential, kind) =
        match extract_credential(api_key_header.as_deref(), authorization.as_deref()) {
            Ok(found) => found,
            Err(e) => {
                state.auth_stats.failures.fetch_add(1, Ordering::Relaxed);
                return ApiError::from(e).into_response();
            }
        };

    let context = match kind {
        CredentialKind::Session => validate_session(&state, &credential).await,
        CredentialKind::ApiKey => validate_api_key(&state, &credential).await,
    };

    match context {
        Ok(context) => {
            req.extensions_mut().insert(context);
            next.run(req).await
        }
        Err(e) => {
            if e.status == axum::http::StatusCode::UNAUTHORIZED {
                state.auth_stats.failures.fetch_add(1, Ordering::Relaxed);
            }
            e.into_response()
        }
    }
}

async fn validate_session(state: &AppState, token: &str) -> Result<AuthContext, ApiError> {
    let claims = state.tokens.verify_access(token).map_err(ApiError::from)?;

    // Logout leaves a revocation marker; a KV outage fails open.
    match state.kv.get(&session_revocation_key(token)).await {
        Ok(Some(_)) => return Err(ApiError::unauthorized("token has been revoked")),
        Ok(None) => {}
        Err(e) => tracing::warn!(error = %e, "session revocation check failed, proceeding"),
    }

    Ok(AuthContext {
        account_id: claims.account_id().map_err(ApiError::from)?,
        project_id: None,
        rate_limit_per_minute: state.config.security.default_rate_limit_per_minute,
        rate_limit_per_hour: state.config.security.default_rate_limit_per_hour,
        daily_quota: state.config.security.default_daily_quota,
    })
}

fn context_from_record(record: &ApiKeyRecord) -> AuthContext {
    AuthContext {
        account_id: record.account_id,
        project_id: Some(record.project_id),
        rate_limit_per_minute: record.rate_limit_per_minute,
        rate_limit_per_hour: record.rate_limit_per_hour,
        daily_quota: record.daily_quota,
    }
}

async fn validate_api_key(state: &AppState, secret: &str) -> Result<AuthContext, ApiError> {
    match state.api_key_cache.get_with_refresh_hint(secret).await {
        Ok((Some(record), refresh)) => {
            state.auth_stats.cache_hits.fetch_add(1, Ordering::Relaxed);
            if refresh {
                spawn_cache_refresh(state.clone(), secret.to_string());
            }
            return Ok(context_from_record(&record));
        }
        Ok((None, _)) => {}
        Err(e) => tracing::warn!(error = %e, "API key cache read failed, falling back to RPC"),
    }

    state.auth_stats.cache_misses.fetch_add(1, Ordering::Relaxed);

    match fetch_validation(state, secret).await {
        Ok(Some(record)) => {
            // Populate the cache off the request path.
            let cache = state.api_key_cache.clone();
            let secret = secret.to_string();
            let record_clone = record.clone();
            tokio::spawn(async move {
                if let Err(e) = cache.set(&secret, &record_clone).await {
                    tracing::warn!(error = %e, "failed to cache API key record");
                }
            });
            Ok(context_from_record(&record))
        }
        Ok(None) => Err(ApiError::unauthorized("invalid or expired API key")),
        Err(Error::Unavailable { service, detail }) => {
            // Degraded mode: a stale cache entry beats turning away traffic.
            match state.api_key_cache.get_stale(secret).await {
                Ok(Some(record)) => {
                    tracing::warn!(%service, "using stale API key cache entry");
                    // Re-arm the entry with the emergency TTL so it outlives
                    // the outage instead of expiring mid-incident.
                    let cache = state.api_key_cache.clone();
                    let secret = secret.to_string();
                    let ttl = state.config.cache.emergency_ttl_secs;
                    let record_clone = record.clone();
                    tokio::spawn(async move {
                        let _ = cache.set_with_ttl(&secret, &record_clone, ttl).await;
                    });
                    Ok(context_from_record(&record))
                }
                _ => Err(ApiError::from(Error::Unavailable { service, detail })),
            }
        }
        Err(e) => Err(ApiError::from(e)),
    }
}

/// ValidateApiKey via the account breaker. `Ok(None)` = known-invalid key.
async fn fetch_validation(state: &AppState, secret: &str) -> Result<Option<ApiKeyRecord>, Error> {
    let breaker = state.breakers.get("account");
    let rpc = state.rpc.clone();
    let timeout = Duration::from_secs(state.config.rpc.request_timeout_secs);
    let api_key = secret.to_string();

    breaker
        .call(move || async move {
            let mut client = rpc.account();
            let request = ValidateApiKeyRequest { api_key };
            let response = tokio::time::timeout(timeout, client.validate_api_key(request))
                .await
                .map_err(|_| Error::unavailable("account", "validation timed out"))?
                .map_err(|status| status_to_error("account", status))?
                .into_inner();

            if !response.valid {
                return Ok(None);
            }
            Ok(Some(ApiKeyRecord {
                project_id: response.project_id,
                account_id: response.account_id,
                rate_limit_per_minute: response.rate_limit_per_minute,
                rate_limit_per_hour: response.rate_limit_per_hour,
                daily_quota: response.daily_quota,
                retention_days: response.retention_days,
                current_usage: response.current_usage,
            }))
        })
        .await
}

fn spawn_cache_refresh(state: AppState, secret: String) {
    tokio::spawn(async move {
        match fetch_validation(&state, &secret).await {
            Ok(Some(record)) => {
                if let Err(e) = state.api_key_cache.set(&secret, &record).await {
                    tracing::debug!(error = %e, "background cache refresh write failed");
                }
            }
            Ok(None) => {
                // Key went invalid; drop the cached entry.
                let hash = ledger_kv::hash_secret(&secret);
                let _ = state.api_key_cache.invalidate_hash(&hash).await;
            }
            Err(e) => tracing::debug!(error = %e, "background cache refresh failed"),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn x_api_key_header_wins() {
        let (token, kind) =
            extract_credential(Some("ledger_abc"), Some("Bearer other")).unwrap();
        assert_eq!(token, "ledger_abc");
        assert_eq!(kind, CredentialKind::ApiKey);
    }

    #[test]
    fn bearer_with_key_prefix_is_api_key() {
        let (token, kind) = extract_credential(None, Some("Bearer ledger_abc123")).unwrap();
        assert_eq!(token, "ledger_abc123");
        assert_eq!(kind, CredentialKind::ApiKey);
    }

    #[test]
    fn bearer_without_prefix_is_session() {
        let (_, kind) = extract_credential(None, Some("Bearer eyJhbGciOi.x.y")).unwrap();
        assert_eq!(kind, CredentialKind::Session);
    }

    #[test]
    fn bare_token_is_api_key() {
        let (token, kind) = extract_credential(None, Some("sometoken")).unwrap();
        assert_eq!(token, "sometoken");
        assert_eq!(kind, CredentialKind::ApiKey);
    }

    #[test]
    fn missing_headers_fail() {
        assert!(extract_credential(None, None).is_err());
    }

    #[test]
    fn three_part_header_fails() {
        assert!(extract_credential(None, Some("Basic user pass")).is_err());
    }

    #[test]
    fn bearer_is_case_insensitive() {
        let (_, kind) = extract_credential(None, Some("bearer sometoken")).unwrap();
        assert_eq!(kind, CredentialKind::Session);
    }

    #[test]
    fn revocation_key_is_hashed() {
        let key = session_revocation_key("my.jwt.token");
        assert!(key.starts_with("session:"));
        assert_eq!(key.len(), "session:".len() + 64);
        assert!(!key.contains("my.jwt.token"));
    }
}
