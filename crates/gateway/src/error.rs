//! HTTP error mapping. Every failure becomes a JSON body with a short
//! `detail` field; rejections carry their retry headers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use ledger_domain::Error;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
    pub headers: Vec<(&'static str, String)>,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, detail)
            .with_header("WWW-Authenticate", "Bearer")
    }

    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidInput(detail) => Self::new(StatusCode::BAD_REQUEST, detail),
            Error::Unauthenticated(detail) => Self::unauthorized(detail),
            Error::Forbidden(detail) => Self::new(StatusCode::FORBIDDEN, detail),
            Error::NotFound(detail) => Self::new(StatusCode::NOT_FOUND, detail),
            Error::Conflict(detail) => Self::new(StatusCode::CONFLICT, detail),
            Error::RateLimited {
                retry_after,
                detail,
            } => Self::new(StatusCode::TOO_MANY_REQUESTS, detail)
                .with_header("Retry-After", retry_after.to_string()),
            Error::QuotaExceeded(detail) => Self::new(StatusCode::PAYMENT_REQUIRED, detail),
            Error::Backpressure(_) => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "Service temporarily unavailable - queue full",
            )
            .with_header("Retry-After", "60"),
            Error::Unavailable { service, .. } => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                format!("{service} service unavailable"),
            ),
            // Never echo driver details to clients.
            Error::Database(e) | Error::Kv(e) | Error::Internal(e) | Error::Config(e) => {
                tracing::error!(error = %e, "internal error");
                Self::internal()
            }
            Error::Io(e) => {
                tracing::error!(error = %e, "io error");
                Self::internal()
            }
            Error::Json(_) => Self::new(StatusCode::BAD_REQUEST, "invalid JSON body"),
        }
    }
}

impl From<tonic::Status> for ApiError {
    fn from(status: tonic::Status) -> Self {
        ledger_proto::convert::status_to_error("downstream", status).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response =
            (self.status, Json(serde_json::json!({ "detail": self.detail }))).into_response();
        for (name, value) in self.headers {
            if let Ok(value) = value.parse() {
                response.headers_mut().insert(name, value);
            }
        }
        response
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backpressure_maps_to_503_with_retry_after() {
        let err: ApiError = Error::Backpressure("queue full".into()).into();
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(err.headers.iter().any(|(n, v)| *n == "Retry-After" && v == "60"));
    }

    #[test]
    fn quota_maps_to_402() {
        let err: ApiError = Error::QuotaExceeded("10/5".into()).into();
        assert_eq!(err.status, StatusCode::PAYMENT_REQUIRED);
    }

    #[test]
    fn rate_limited_carries_retry_after() {
        let err: ApiError = Error::RateLimited {
            retry_after: 3600,
            detail: "hourly limit".into(),
        }
        .into();
        assert_eq!(err.status, StatusCode::TOO_MANY_REQUESTS);
        assert!(err.headers.iter().any(|(_, v)| v == "3600"));
    }

    #[test]
    fn internal_errors_hide_detail() {
        let err: ApiError = Error::Database("secrets in dsn".into()).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.detail.contains("secrets"));
    }

    #[test]
    fn conflict_maps_to_409() {
        let err: ApiError = Error::conflict("slug taken").into();
        assert_eq!(err.status, StatusCode::CONFLICT);
    }
}
