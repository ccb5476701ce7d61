//! Enrichment: error fingerprinting and ingestion stamping.

use std::sync::OnceLock;

use chrono::Utc;
use regex::Regex;
use sha2::{Digest, Sha256};

use ledger_domain::log::{LogEntry, LogType, QueuedLog};

const FINGERPRINT_FRAMES: usize = 5;

fn re_line_no() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(, line \d+|:\d+)").unwrap())
}

fn re_hex_addr() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"0x[0-9a-fA-F]+").unwrap())
}

fn re_whitespace() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

/// Strip the parts of a stack frame that vary between otherwise identical
/// errors: line/column numbers, hex addresses, whitespace runs.
fn normalize_frame(line: &str) -> String {
    let line = re_line_no().replace_all(line.trim(), "");
    let line = re_hex_addr().replace_all(&line, "0x?");
    re_whitespace().replace_all(&line, " ").into_owned()
}

/// Deterministic identity for a class of equivalent errors: SHA-256 over
/// the error type, the normalized top frames and the platform. 64 hex chars.
pub fn compute_fingerprint(
    error_type: &str,
    stack_trace: Option<&str>,
    platform: Option<&str>,
) -> String {
    let frames: Vec<String> = stack_trace
        .unwrap_or("")
        .lines()
        .filter(|line| !line.trim().is_empty())
        .take(FINGERPRINT_FRAMES)
        .map(normalize_frame)
        .collect();

    let canonical = format!(
        "{error_type}\n{}\n{}",
        frames.join("\n"),
        platform.unwrap_or("")
    );
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

/// Turn a validated entry into the queue record: stamp the ingestion time,
/// fingerprint exceptions, carry the measured processing time.
pub fn enrich(entry: LogEntry, project_id: i64, processing_time_ms: Option<i16>) -> QueuedLog {
    let error_fingerprint = if entry.log_type == LogType::Exception {
        Some(compute_fingerprint(
            entry.error_type.as_deref().unwrap_or("UnknownError"),
            entry.stack_trace.as_deref(),
            entry.platform.as_deref(),
        ))
    } else {
        None
    };

    QueuedLog {
        project_id,
        timestamp: entry.timestamp,
        ingested_at: Utc::now(),
        level: entry.level,
        log_type: entry.log_type,
        importance: entry.importance,
        environment: entry.environment,
        release: entry.release,
        message: entry.message,
        error_type: entry.error_type,
        error_message: entry.error_message,
        stack_trace: entry.stack_trace,
        attributes: entry.attributes,
        sdk_version: entry.sdk_version,
        platform: entry.platform,
        platform_version: entry.platform_version,
        processing_time_ms,
        error_fingerprint,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ledger_domain::log::{Importance, LogLevel};

    #[test]
    fn fingerprint_is_64_hex_chars() {
        let fp = compute_fingerprint("ValueError", None, Some("python"));
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let a = compute_fingerprint("ValueError", Some("at foo\nat bar"), Some("python"));
        let b = compute_fingerprint("ValueError", Some("at foo\nat bar"), Some("python"));
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_distinguishes_error_types_and_platforms() {
        let stack = Some("at foo\nat bar");
        assert_ne!(
            compute_fingerprint("ValueError", stack, Some("python")),
            compute_fingerprint("TypeError", stack, Some("python")),
        );
        assert_ne!(
            compute_fingerprint("ValueError", stack, Some("python")),
            compute_fingerprint("ValueError", stack, Some("node")),
        );
    }

    #[test]
    fn fingerprint_ignores_line_numbers_and_addresses() {
        let a = compute_fingerprint(
            "ValueError",
            Some("File \"app.py\", line 10, in main\n  handler at 0xdeadbeef"),
            None,
        );
        let b = compute_fingerprint(
            "ValueError",
            Some("File \"app.py\", line 99, in main\n  handler at 0xcafebabe"),
            None,
        );
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_considers_only_top_frames() {
        let deep_a = "f1\nf2\nf3\nf4\nf5\ndifferent_tail_a";
        let deep_b = "f1\nf2\nf3\nf4\nf5\ndifferent_tail_b";
        assert_eq!(
            compute_fingerprint("E", Some(deep_a), None),
            compute_fingerprint("E", Some(deep_b), None),
        );
    }

    fn entry(log_type: LogType) -> LogEntry {
        LogEntry {
            timestamp: Utc::now(),
            level: LogLevel::Error,
            log_type,
            importance: Importance::High,
            message: Some("m".into()),
            error_type: Some("ValueError".into()),
            error_message: Some("bad".into()),
            stack_trace: Some("at foo".into()),
            environment: None,
            release: None,
            attributes: None,
            sdk_version: None,
            platform: Some("python".into()),
            platform_version: None,
        }
    }

    #[test]
    fn exceptions_get_fingerprints_other_types_do_not() {
        let enriched = enrich(entry(LogType::Exception), 1, Some(1));
        assert!(enriched.error_fingerprint.is_some());

        let enriched = enrich(entry(LogType::Logger), 1, None);
        assert!(enriched.error_fingerprint.is_none());
    }

    #[test]
    fn enrich_stamps_ingested_at() {
        let before = Utc::now();
        let enriched = enrich(entry(LogType::Logger), 42, None);
        assert!(enriched.ingested_at >= before);
        assert_eq!(enriched.project_id, 42);
    }
}
