//! Grouping: fold classified events into per-group accumulators.

use std::collections::HashMap;

use crate::classify;
use crate::models::{GroupKey, LogEvent, Severity};

/// Running accumulator for one group key during a single fetch.
#[derive(Debug, Clone)]
pub struct SummaryAccumulator {
    /// Normalized message shared by all events in the group.
    pub pattern: String,
    pub count: u64,
    pub first_seen: chrono::DateTime<chrono::Utc>,
    pub last_seen: chrono::DateTime<chrono::Utc>,
    /// Bounded raw examples, newest last.
    pub samples: Vec<String>,
}

/// Result of grouping one batch of events.
#[derive(Debug, Default)]
pub struct Grouping {
    pub groups: HashMap<GroupKey, SummaryAccumulator>,
    /// Events classified as ERROR in this batch.
    pub error_events: u64,
    /// Events classified as WARNING in this batch.
    pub warning_events: u64,
}

/// Append a sample, dropping the oldest when the bound is reached.
pub fn push_sample(samples: &mut Vec<String>, message: &str, bound: usize) {
    if bound == 0 {
        return;
    }
    if samples.len() == bound {
        samples.remove(0);
    }
    samples.push(message.to_string());
}

/// Classify each event and fold it into its group's accumulator.
///
/// The output map is keyed and unordered; callers must not rely on any
/// iteration order.
pub fn summarize(events: &[LogEvent], sample_bound: usize) -> Grouping {
    let mut grouping = Grouping::default();

    for event in events {
        let classified = classify::classify(event);
        match classified.key.severity {
            Severity::Error => grouping.error_events += 1,
            Severity::Warning => grouping.warning_events += 1,
            Severity::Info => {}
        }

        match grouping.groups.entry(classified.key) {
            std::collections::hash_map::Entry::Occupied(mut entry) => {
                let acc = entry.get_mut();
                acc.count += 1;
                acc.first_seen = acc.first_seen.min(event.timestamp);
                acc.last_seen = acc.last_seen.max(event.timestamp);
                push_sample(&mut acc.samples, &event.message, sample_bound);
            }
            std::collections::hash_map::Entry::Vacant(entry) => {
                let mut samples = Vec::new();
                push_sample(&mut samples, &event.message, sample_bound);
                entry.insert(SummaryAccumulator {
                    pattern: classified.pattern,
                    count: 1,
                    first_seen: event.timestamp,
                    last_seen: event.timestamp,
                    samples,
                });
            }
        }
    }

    grouping
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn event(stream: &str, minute: u32, message: &str) -> LogEvent {
        LogEvent {
            stream: stream.to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 12, minute, 0).unwrap(),
            message: message.to_string(),
            severity_hint: None,
        }
    }

    #[test]
    fn test_identical_normalized_messages_fold_into_one_group() {
        let events = vec![
            event("api/prod/i-1", 1, "ERROR: connection refused to db"),
            event("api/prod/i-2", 5, "ERROR: connection refused to db"),
            event("api/prod/i-1", 9, "ERROR: connection refused to db"),
        ];
        let grouping = summarize(&events, 5);

        assert_eq!(grouping.groups.len(), 1);
        let acc = grouping.groups.values().next().unwrap();
        assert_eq!(acc.count, 3);
        assert_eq!(
            acc.first_seen,
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 1, 0).unwrap()
        );
        assert_eq!(
            acc.last_seen,
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 9, 0).unwrap()
        );
        assert_eq!(grouping.error_events, 3);
    }

    #[test]
    fn test_variable_tokens_do_not_split_groups() {
        let events = vec![
            event("api/prod/i-1", 1, "ERROR: timeout for order 48213"),
            event("api/prod/i-1", 2, "ERROR: timeout for order 99102"),
        ];
        let grouping = summarize(&events, 5);
        assert_eq!(grouping.groups.len(), 1);
    }

    #[test]
    fn test_different_services_split_groups() {
        let events = vec![
            event("api/prod/i-1", 1, "ERROR: connection refused to db"),
            event("worker/prod/i-1", 2, "ERROR: connection refused to db"),
        ];
        let grouping = summarize(&events, 5);
        assert_eq!(grouping.groups.len(), 2);
    }

    #[test]
    fn test_severity_counts() {
        let events = vec![
            event("api/p/1", 1, "ERROR: boom"),
            event("api/p/1", 2, "WARN: slow"),
            event("api/p/1", 3, "request timeout"),
            event("api/p/1", 4, "started worker"),
        ];
        let grouping = summarize(&events, 5);
        assert_eq!(grouping.error_events, 1);
        assert_eq!(grouping.warning_events, 2);
    }

    #[test]
    fn test_sample_bound_newest_wins() {
        let events: Vec<LogEvent> = (0..8)
            .map(|i| event("api/p/1", i, &format!("ERROR: boom attempt={}", i)))
            .collect();
        let grouping = summarize(&events, 3);

        let acc = grouping.groups.values().next().unwrap();
        assert_eq!(acc.samples.len(), 3);
        assert_eq!(acc.samples[0], "ERROR: boom attempt=5");
        assert_eq!(acc.samples[2], "ERROR: boom attempt=7");
        assert_eq!(acc.count, 8);
    }

    #[test]
    fn test_empty_input() {
        let grouping = summarize(&[], 5);
        assert!(grouping.groups.is_empty());
        assert_eq!(grouping.error_events, 0);
    }
}
