//! Event classification: severity, service, and error signature.
//!
//! Classification is what turns a raw [`LogEvent`](crate::models::LogEvent)
//! into a [`GroupKey`](crate::models::GroupKey). All three dimensions are
//! deterministic functions of the event, so the same event always lands in
//! the same group.
//!
//! # Severity
//!
//! Severity is derived by matching the message body against an ordered
//! rule table; the first matching rule wins. When no rule matches, the
//! severity hint carried by the source (if any) is used, and `INFO` is
//! the final fallback.
//!
//! # Error signature
//!
//! The signature is a SHA-256 digest of the message after variable tokens
//! have been normalized away. The normalization pass replaces, in order:
//! ISO-8601 timestamps → `<ts>`, UUIDs → `<uuid>`, hex runs of 8+ chars
//! containing at least one letter → `<hex>`, and remaining digit runs →
//! `<n>`; the result is lowercased and whitespace-collapsed. This is what
//! makes "timeout connecting to host X at 12:01:07" and "... at 12:14:33"
//! collapse into one group.

use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;

use crate::models::{GroupKey, LogEvent, Severity};

/// Ordered rule table, highest priority first. Extending classification
/// means adding a row here, not touching control flow.
fn severity_rules() -> &'static [(Regex, Severity)] {
    static RULES: OnceLock<Vec<(Regex, Severity)>> = OnceLock::new();
    RULES.get_or_init(|| {
        [
            (r"(?i)error", Severity::Error),
            (r"(?i)exception", Severity::Error),
            (r"\b5\d{2}\b", Severity::Error),
            (r"(?i)warn", Severity::Warning),
            (r"(?i)timeout", Severity::Warning),
        ]
        .into_iter()
        .map(|(pattern, severity)| {
            (
                Regex::new(pattern).expect("severity rule regex is valid"),
                severity,
            )
        })
        .collect()
    })
}

/// Classify the severity of a message body.
///
/// The first matching rule in the table wins; ties cannot occur because
/// rules are tried strictly in priority order.
pub fn classify_severity(message: &str, hint: Option<Severity>) -> Severity {
    for (rule, severity) in severity_rules() {
        if rule.is_match(message) {
            return *severity;
        }
    }
    hint.unwrap_or(Severity::Info)
}

/// Derive the service name from a stream name.
///
/// Stream names with a structured prefix (`service/instance/...`) yield
/// the prefix; names without one yield `"unknown"`.
pub fn service_from_stream(stream: &str) -> String {
    match stream.split_once('/') {
        Some((prefix, _)) if !prefix.is_empty() => prefix.to_string(),
        _ => "unknown".to_string(),
    }
}

struct Normalizer {
    timestamp: Regex,
    uuid: Regex,
    hex: Regex,
    number: Regex,
    whitespace: Regex,
}

fn normalizer() -> &'static Normalizer {
    static NORMALIZER: OnceLock<Normalizer> = OnceLock::new();
    NORMALIZER.get_or_init(|| Normalizer {
        timestamp: Regex::new(
            r"\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:?\d{2})?",
        )
        .expect("timestamp regex is valid"),
        uuid: Regex::new(
            r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
        )
        .expect("uuid regex is valid"),
        hex: Regex::new(r"\b[0-9a-fA-F]{8,}\b").expect("hex regex is valid"),
        number: Regex::new(r"\d+").expect("number regex is valid"),
        whitespace: Regex::new(r"\s+").expect("whitespace regex is valid"),
    })
}

/// Normalize a message by replacing variable tokens with placeholders.
///
/// The replacement order matters: timestamps and UUIDs are matched before
/// bare hex and digit runs so their components are not consumed piecemeal.
pub fn normalize_message(message: &str) -> String {
    let n = normalizer();
    let s = n.timestamp.replace_all(message, "<ts>");
    let s = n.uuid.replace_all(&s, "<uuid>");
    // Digit-only runs are not hashes; leave them for the number rule.
    let s = n.hex.replace_all(&s, |caps: &regex::Captures<'_>| {
        let m = &caps[0];
        if m.bytes().any(|b| b.is_ascii_alphabetic()) {
            "<hex>".to_string()
        } else {
            m.to_string()
        }
    });
    let s = n.number.replace_all(&s, "<n>");
    let s = n.whitespace.replace_all(s.trim(), " ");
    s.to_lowercase()
}

/// Hex digest of a normalized message, truncated to 16 characters.
///
/// The digest identifies the message class; the truncation keeps storage
/// keys readable while leaving collisions negligible at cache scale.
pub fn signature(normalized: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest.chars().take(16).collect()
}

/// A fully classified event: the group key plus the normalized pattern.
#[derive(Debug, Clone)]
pub struct ClassifiedEvent {
    pub key: GroupKey,
    pub pattern: String,
}

/// Classify an event into its group key and normalized pattern.
pub fn classify(event: &LogEvent) -> ClassifiedEvent {
    let severity = classify_severity(&event.message, event.severity_hint);
    let service = service_from_stream(&event.stream);
    let pattern = normalize_message(&event.message);
    let signature = signature(&pattern);
    ClassifiedEvent {
        key: GroupKey {
            service,
            severity,
            signature,
        },
        pattern,
    }
}
