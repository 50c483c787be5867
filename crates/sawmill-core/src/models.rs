//! Core data models used throughout Sawmill.
//!
//! These types represent the log events, group keys, summaries, and
//! processing results that flow through the fetch → group → merge →
//! persist pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity class assigned to a log event or summary group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Warning => write!(f, "WARNING"),
            Severity::Info => write!(f, "INFO"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ERROR" => Ok(Severity::Error),
            "WARNING" => Ok(Severity::Warning),
            "INFO" => Ok(Severity::Info),
            other => Err(anyhow::anyhow!("Unknown severity: '{}'", other)),
        }
    }
}

/// Raw event produced by a log source before classification.
///
/// Ephemeral: events exist only between fetch and grouping and are never
/// persisted directly.
#[derive(Debug, Clone)]
pub struct LogEvent {
    /// Name of the stream the event was read from.
    pub stream: String,
    /// Event timestamp as reported by the source.
    pub timestamp: DateTime<Utc>,
    /// Full message body.
    pub message: String,
    /// Severity reported by the source itself, if it carries one.
    /// Used only when no keyword rule matches the message body.
    pub severity_hint: Option<Severity>,
}

/// Identity of a deduplicated class of log events.
///
/// Two events with the same service, the same normalized message, and the
/// same severity always yield the same key, regardless of timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupKey {
    pub service: String,
    pub severity: Severity,
    /// Hex digest of the normalized message (see [`crate::classify::signature`]).
    pub signature: String,
}

impl GroupKey {
    /// Stable string form used as the storage key within a project.
    pub fn storage_key(&self) -> String {
        format!("{}:{}:{}", self.service, self.severity, self.signature)
    }
}

/// A deduplicated, accumulated class of log events for one project.
///
/// Uniquely identified by `(project_id, group_key)`. Mutable only through
/// the merge engine ([`crate::merge::merge`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogSummary {
    /// Stable row identifier, assigned on first observation of the group.
    pub id: String,
    pub project_id: String,
    pub service: String,
    pub severity: Severity,
    /// Hex digest identifying the normalized message class.
    pub signature: String,
    /// The normalized message itself, kept for operator readability.
    pub pattern: String,
    pub count: u64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// Bounded list of raw example messages, newest appended, oldest dropped.
    pub sample_messages: Vec<String>,
}

impl LogSummary {
    pub fn group_key(&self) -> GroupKey {
        GroupKey {
            service: self.service.clone(),
            severity: self.severity,
            signature: self.signature.clone(),
        }
    }
}

/// The full set of cached summaries for one project.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectCacheState {
    pub project_id: String,
    pub summaries: Vec<LogSummary>,
}

impl ProjectCacheState {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            summaries: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty()
    }

    /// The most recent `last_seen` across all summaries.
    ///
    /// This value alone drives freshness decisions, and it never moves
    /// backward across successive merges for the same project.
    pub fn newest_last_seen(&self) -> Option<DateTime<Utc>> {
        self.summaries.iter().map(|s| s.last_seen).max()
    }

    /// Total accumulated event count for a given severity.
    pub fn count_for(&self, severity: Severity) -> u64 {
        self.summaries
            .iter()
            .filter(|s| s.severity == severity)
            .map(|s| s.count)
            .sum()
    }
}

/// Immutable description of one fetch operation's scope.
#[derive(Debug, Clone)]
pub struct FetchWindow {
    pub project_id: String,
    /// Remote log group to read from.
    pub log_group: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub max_streams: usize,
    pub max_events_per_stream: usize,
}

/// How a processing result was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultSource {
    /// Served from cache without any remote calls.
    CacheHit,
    /// Fetched only the window since the newest cached data point.
    Incremental,
    /// Fetched the full staleness window.
    Full,
}

impl std::fmt::Display for ResultSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResultSource::CacheHit => write!(f, "CACHE_HIT"),
            ResultSource::Incremental => write!(f, "INCREMENTAL"),
            ResultSource::Full => write!(f, "FULL"),
        }
    }
}

/// Wall-clock durations for each pipeline phase, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingStats {
    pub log_fetch_duration_ms: u64,
    pub log_processing_duration_ms: u64,
    pub embedding_generation_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Outcome of one `process(project_id)` pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingResult {
    pub project_id: String,
    pub processing_timestamp: DateTime<Utc>,
    /// Number of raw events fetched and classified in this run.
    /// Zero for cache hits.
    pub total_logs_processed: u64,
    pub error_count: u64,
    pub warning_count: u64,
    pub summaries_created: u64,
    pub summaries_updated: u64,
    pub embeddings_created: u64,
    /// Streams that failed during this fetch and were skipped.
    pub streams_failed: u64,
    pub source: ResultSource,
    pub stats: ProcessingStats,
    /// The project's cached summaries after this run.
    pub summaries: Vec<LogSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn summary(severity: Severity, count: u64, last_seen_hour: u32) -> LogSummary {
        let ts = Utc.with_ymd_and_hms(2026, 3, 1, last_seen_hour, 0, 0).unwrap();
        LogSummary {
            id: "s".to_string(),
            project_id: "p1".to_string(),
            service: "api".to_string(),
            severity,
            signature: "abc".to_string(),
            pattern: "x".to_string(),
            count,
            first_seen: ts,
            last_seen: ts,
            sample_messages: vec![],
        }
    }

    #[test]
    fn test_newest_last_seen_is_max() {
        let state = ProjectCacheState {
            project_id: "p1".to_string(),
            summaries: vec![
                summary(Severity::Error, 3, 4),
                summary(Severity::Warning, 1, 9),
                summary(Severity::Info, 2, 6),
            ],
        };
        assert_eq!(
            state.newest_last_seen(),
            Some(Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_newest_last_seen_empty() {
        let state = ProjectCacheState::new("p1");
        assert_eq!(state.newest_last_seen(), None);
    }

    #[test]
    fn test_count_for_sums_by_severity() {
        let state = ProjectCacheState {
            project_id: "p1".to_string(),
            summaries: vec![
                summary(Severity::Error, 3, 1),
                summary(Severity::Error, 4, 2),
                summary(Severity::Warning, 5, 3),
            ],
        };
        assert_eq!(state.count_for(Severity::Error), 7);
        assert_eq!(state.count_for(Severity::Warning), 5);
        assert_eq!(state.count_for(Severity::Info), 0);
    }

    #[test]
    fn test_severity_roundtrip() {
        for sev in [Severity::Error, Severity::Warning, Severity::Info] {
            let parsed: Severity = sev.to_string().parse().unwrap();
            assert_eq!(parsed, sev);
        }
        assert!("err".parse::<Severity>().is_err());
    }
}
