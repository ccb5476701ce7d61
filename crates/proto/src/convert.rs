//! Mapping between the shared error enum and gRPC status codes.

use ledger_domain::Error;
use tonic::{Code, Status};

/// Translate a domain error into the status a servicer should return.
pub fn error_to_status(err: Error) -> Status {
    match err {
        Error::InvalidInput(msg) => Status::invalid_argument(msg),
        Error::Unauthenticated(msg) => Status::unauthenticated(msg),
        Error::Forbidden(msg) => Status::permission_denied(msg),
        Error::NotFound(msg) => Status::not_found(msg),
        Error::Conflict(msg) => Status::already_exists(msg),
        Error::RateLimited { detail, .. } => Status::resource_exhausted(detail),
        Error::QuotaExceeded(msg) => Status::resource_exhausted(msg),
        Error::Backpressure(msg) => Status::resource_exhausted(msg),
        Error::Unavailable { service, detail } => {
            Status::unavailable(format!("{service}: {detail}"))
        }
        // Driver and internal errors are logged at the call site; clients
        // get a generic message, never the underlying detail.
        Error::Database(_) | Error::Kv(_) | Error::Io(_) | Error::Json(_) => {
            Status::internal("internal error")
        }
        Error::Config(_) | Error::Internal(_) => Status::internal("internal error"),
    }
}

/// Translate a status received from a downstream back into a domain error,
/// tagged with the downstream's name.
pub fn status_to_error(service: &str, status: Status) -> Error {
    match status.code() {
        Code::InvalidArgument => Error::InvalidInput(status.message().to_string()),
        Code::Unauthenticated => Error::Unauthenticated(status.message().to_string()),
        Code::PermissionDenied => Error::Forbidden(status.message().to_string()),
        Code::NotFound => Error::NotFound(status.message().to_string()),
        Code::AlreadyExists => Error::Conflict(status.message().to_string()),
        Code::ResourceExhausted => Error::Backpressure(status.message().to_string()),
        Code::Unavailable | Code::DeadlineExceeded => Error::Unavailable {
            service: service.to_string(),
            detail: status.message().to_string(),
        },
        _ => Error::Internal(format!("{service}: {}", status.message())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_input_maps_to_invalid_argument() {
        let status = error_to_status(Error::invalid_input("bad level"));
        assert_eq!(status.code(), Code::InvalidArgument);
        assert_eq!(status.message(), "bad level");
    }

    #[test]
    fn backpressure_maps_to_resource_exhausted() {
        let status = error_to_status(Error::Backpressure("queue full".into()));
        assert_eq!(status.code(), Code::ResourceExhausted);
    }

    #[test]
    fn internal_detail_is_not_leaked() {
        let status = error_to_status(Error::Database("password=hunter2 in dsn".into()));
        assert_eq!(status.code(), Code::Internal);
        assert_eq!(status.message(), "internal error");
    }

    #[test]
    fn unavailable_roundtrip() {
        let err = status_to_error("account", Status::unavailable("connect refused"));
        assert!(matches!(err, Error::Unavailable { ref service, .. } if service == "account"));
    }

    #[test]
    fn deadline_is_treated_as_unavailable() {
        let err = status_to_error("account", Status::deadline_exceeded("timed out"));
        assert!(matches!(err, Error::Unavailable { .. }));
    }
}
