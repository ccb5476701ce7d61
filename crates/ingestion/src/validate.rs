//! Log entry validation: parsing the wire shape, size caps and the
//! cross-field rules for exception and endpoint logs.

use chrono::{DateTime, Duration, Utc};

use ledger_domain::config::ValidationConfig;
use ledger_domain::log::{Importance, LogEntry, LogLevel, LogType};
use ledger_domain::{Error, Result};
use ledger_proto::ingestion as proto;

/// Parse and validate one wire entry against the configured caps.
///
/// `now` is injected so boundary behavior is testable.
pub fn parse_and_validate(
    entry: &proto::LogEntry,
    caps: &ValidationConfig,
    now: DateTime<Utc>,
) -> Result<LogEntry> {
    let timestamp = DateTime::parse_from_rfc3339(&entry.timestamp)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| {
            Error::invalid_input(format!("invalid timestamp format: {:?}", entry.timestamp))
        })?;

    let max_future = now + Duration::minutes(caps.future_tolerance_minutes);
    if timestamp > max_future {
        return Err(Error::invalid_input(format!(
            "timestamp cannot be more than {} minutes in the future",
            caps.future_tolerance_minutes
        )));
    }

    let level: LogLevel = entry.level.parse()?;
    let log_type: LogType = if entry.log_type.is_empty() {
        LogType::Logger
    } else {
        entry.log_type.parse()?
    };
    let importance: Importance = if entry.importance.is_empty() {
        Importance::Standard
    } else {
        entry.importance.parse()?
    };

    check_len("message", entry.message.as_deref(), caps.max_message_length)?;
    check_len(
        "error_message",
        entry.error_message.as_deref(),
        caps.max_error_message_length,
    )?;
    check_len(
        "stack_trace",
        entry.stack_trace.as_deref(),
        caps.max_stack_trace_length,
    )?;
    check_len(
        "error_type",
        entry.error_type.as_deref(),
        caps.max_error_type_length,
    )?;

    let attributes = match entry.attributes.as_deref() {
        Some(raw) => {
            let value: serde_json::Value = serde_json::from_str(raw)
                .map_err(|_| Error::invalid_input("invalid JSON in attributes field"))?;
            // Cap applies to the canonical serialized size, not the wire size.
            let size = serde_json::to_string(&value)?.len();
            if size > caps.max_attributes_bytes {
                return Err(Error::invalid_input(format!(
                    "attributes cannot exceed {} bytes",
                    caps.max_attributes_bytes
                )));
            }
            Some(value)
        }
        None => None,
    };

    let parsed = LogEntry {
        timestamp,
        level,
        log_type,
        importance,
        message: entry.message.clone(),
        error_type: entry.error_type.clone(),
        error_message: entry.error_message.clone(),
        stack_trace: entry.stack_trace.clone(),
        environment: entry.environment.clone(),
        release: entry.release.clone(),
        attributes,
        sdk_version: entry.sdk_version.clone(),
        platform: entry.platform.clone(),
        platform_version: entry.platform_version.clone(),
    };

    validate_cross_fields(&parsed)?;
    Ok(parsed)
}

fn check_len(field: &str, value: Option<&str>, max: usize) -> Result<()> {
    if let Some(value) = value {
        if value.len() > max {
            return Err(Error::invalid_input(format!(
                "{field} cannot exceed {max} characters"
            )));
        }
    }
    Ok(())
}

fn validate_cross_fields(entry: &LogEntry) -> Result<()> {
    if entry.log_type == LogType::Exception {
        if entry.error_type.as_deref().unwrap_or("").is_empty() {
            return Err(Error::invalid_input(
                "error_type is required when log_type is 'exception'",
            ));
        }
        if entry.error_message.as_deref().unwrap_or("").is_empty() {
            return Err(Error::invalid_input(
                "error_message is required when log_type is 'exception'",
            ));
        }
    }

    if entry.log_type == LogType::Endpoint {
        let Some(endpoint) = entry.endpoint_attributes() else {
            return Err(Error::invalid_input(
                "attributes.endpoint is required when log_type is 'endpoint' \
                 (method, path, status_code, duration_ms)",
            ));
        };
        let missing: Vec<&str> = ["method", "path", "status_code", "duration_ms"]
            .into_iter()
            .filter(|field| endpoint.get(field).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(Error::invalid_input(format!(
                "attributes.endpoint missing required fields: {}",
                missing.join(", ")
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps() -> ValidationConfig {
        ValidationConfig::default()
    }

    fn base_entry() -> proto::LogEntry {
        proto::LogEntry {
            timestamp: Utc::now().to_rfc3339(),
            level: "info".into(),
            log_type: "logger".into(),
            importance: "standard".into(),
            message: Some("hello".into()),
            error_type: None,
            error_message: None,
            stack_trace: None,
            environment: None,
            release: None,
            sdk_version: None,
            platform: None,
            platform_version: None,
            attributes: None,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn valid_entry_passes() {
        let parsed = parse_and_validate(&base_entry(), &caps(), now()).unwrap();
        assert_eq!(parsed.level, LogLevel::Info);
        assert_eq!(parsed.message.as_deref(), Some("hello"));
    }

    #[test]
    fn future_timestamp_within_tolerance_is_accepted() {
        let mut entry = base_entry();
        entry.timestamp = (now() + Duration::minutes(4)).to_rfc3339();
        assert!(parse_and_validate(&entry, &caps(), now()).is_ok());
    }

    #[test]
    fn future_timestamp_beyond_tolerance_is_rejected() {
        let mut entry = base_entry();
        entry.timestamp = (now() + Duration::minutes(6)).to_rfc3339();
        let err = parse_and_validate(&entry, &caps(), now()).unwrap_err();
        assert!(err.to_string().contains("future"));
    }

    #[test]
    fn garbage_timestamp_is_rejected() {
        let mut entry = base_entry();
        entry.timestamp = "yesterday".into();
        assert!(parse_and_validate(&entry, &caps(), now()).is_err());
    }

    #[test]
    fn invalid_level_is_rejected() {
        let mut entry = base_entry();
        entry.level = "invalid_level".into();
        let err = parse_and_validate(&entry, &caps(), now()).unwrap_err();
        assert!(err.to_string().contains("level"));
    }

    #[test]
    fn message_over_cap_is_rejected() {
        let mut entry = base_entry();
        entry.message = Some("x".repeat(10_001));
        assert!(parse_and_validate(&entry, &caps(), now()).is_err());
        entry.message = Some("x".repeat(10_000));
        assert!(parse_and_validate(&entry, &caps(), now()).is_ok());
    }

    #[test]
    fn attributes_at_exact_cap_is_accepted() {
        // {"k":"vvv..."} serializes to exactly max_attributes_bytes.
        let caps = caps();
        let overhead = r#"{"k":""}"#.len();
        let fill = "v".repeat(caps.max_attributes_bytes - overhead);
        let mut entry = base_entry();
        entry.attributes = Some(format!(r#"{{"k":"{fill}"}}"#));
        assert!(parse_and_validate(&entry, &caps, now()).is_ok());

        let fill = "v".repeat(caps.max_attributes_bytes - overhead + 1);
        entry.attributes = Some(format!(r#"{{"k":"{fill}"}}"#));
        assert!(parse_and_validate(&entry, &caps, now()).is_err());
    }

    #[test]
    fn attributes_must_be_json() {
        let mut entry = base_entry();
        entry.attributes = Some("{not json".into());
        let err = parse_and_validate(&entry, &caps(), now()).unwrap_err();
        assert!(err.to_string().contains("JSON"));
    }

    #[test]
    fn exception_requires_error_fields() {
        let mut entry = base_entry();
        entry.log_type = "exception".into();
        assert!(parse_and_validate(&entry, &caps(), now()).is_err());

        entry.error_type = Some("ValueError".into());
        assert!(parse_and_validate(&entry, &caps(), now()).is_err());

        entry.error_message = Some("bad value".into());
        assert!(parse_and_validate(&entry, &caps(), now()).is_ok());
    }

    #[test]
    fn endpoint_requires_endpoint_attributes() {
        let mut entry = base_entry();
        entry.log_type = "endpoint".into();
        assert!(parse_and_validate(&entry, &caps(), now()).is_err());

        entry.attributes = Some(r#"{"endpoint": {"method": "GET", "path": "/a"}}"#.into());
        let err = parse_and_validate(&entry, &caps(), now()).unwrap_err();
        assert!(err.to_string().contains("status_code"));

        entry.attributes = Some(
            r#"{"endpoint": {"method": "GET", "path": "/a", "status_code": 200, "duration_ms": 12}}"#
                .into(),
        );
        assert!(parse_and_validate(&entry, &caps(), now()).is_ok());
    }

    #[test]
    fn empty_log_type_defaults_to_logger() {
        let mut entry = base_entry();
        entry.log_type = String::new();
        let parsed = parse_and_validate(&entry, &caps(), now()).unwrap();
        assert_eq!(parsed.log_type, LogType::Logger);
    }
}
