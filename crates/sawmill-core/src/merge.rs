//! Merge engine: combine freshly fetched accumulators with cached state.
//!
//! For disjoint time windows the merge is commutative and associative,
//! which is what allows repeated incremental application without ever
//! reprocessing history. Summaries are created here and only here;
//! retention and eviction belong to the store.

use std::collections::HashMap;

use uuid::Uuid;

use crate::group::{push_sample, SummaryAccumulator};
use crate::models::{GroupKey, LogSummary, ProjectCacheState};

/// Outcome of one merge: the updated state plus what changed.
#[derive(Debug)]
pub struct MergeOutcome {
    pub state: ProjectCacheState,
    /// Keys that did not exist before this merge, in no particular order.
    /// These are the candidates for enrichment.
    pub created: Vec<GroupKey>,
    /// Number of pre-existing summaries touched by this merge.
    pub updated: u64,
}

/// Merge fetched accumulators into the existing cache state.
///
/// Per incoming key: existing summaries get their counts added, their
/// `[first_seen, last_seen]` interval extended, and new samples appended
/// under the bound (newest replace oldest). Unknown keys become new
/// summaries. Keys present only in the existing state are carried over
/// unchanged.
pub fn merge(
    existing: ProjectCacheState,
    fetched: HashMap<GroupKey, SummaryAccumulator>,
    sample_bound: usize,
) -> MergeOutcome {
    let project_id = existing.project_id.clone();
    let mut by_key: HashMap<GroupKey, LogSummary> = existing
        .summaries
        .into_iter()
        .map(|s| (s.group_key(), s))
        .collect();

    let mut created = Vec::new();
    let mut updated = 0u64;

    for (key, acc) in fetched {
        match by_key.get_mut(&key) {
            Some(summary) => {
                summary.count += acc.count;
                summary.first_seen = summary.first_seen.min(acc.first_seen);
                summary.last_seen = summary.last_seen.max(acc.last_seen);
                for sample in &acc.samples {
                    push_sample(&mut summary.sample_messages, sample, sample_bound);
                }
                updated += 1;
            }
            None => {
                let summary = LogSummary {
                    id: Uuid::new_v4().to_string(),
                    project_id: project_id.clone(),
                    service: key.service.clone(),
                    severity: key.severity,
                    signature: key.signature.clone(),
                    pattern: acc.pattern,
                    count: acc.count,
                    first_seen: acc.first_seen,
                    last_seen: acc.last_seen,
                    sample_messages: acc.samples,
                };
                by_key.insert(key.clone(), summary);
                created.push(key);
            }
        }
    }

    let mut summaries: Vec<LogSummary> = by_key.into_values().collect();
    // Deterministic state ordering: newest activity first, key as tiebreak.
    summaries.sort_by(|a, b| {
        b.last_seen
            .cmp(&a.last_seen)
            .then_with(|| a.group_key().storage_key().cmp(&b.group_key().storage_key()))
    });

    MergeOutcome {
        state: ProjectCacheState {
            project_id,
            summaries,
        },
        created,
        updated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, minute, 0).unwrap()
    }

    fn key(service: &str, signature: &str) -> GroupKey {
        GroupKey {
            service: service.to_string(),
            severity: Severity::Error,
            signature: signature.to_string(),
        }
    }

    fn cached_summary(k: &GroupKey, count: u64, first: u32, last: u32) -> LogSummary {
        LogSummary {
            id: "existing-id".to_string(),
            project_id: "p1".to_string(),
            service: k.service.clone(),
            severity: k.severity,
            signature: k.signature.clone(),
            pattern: "connection refused to db".to_string(),
            count,
            first_seen: ts(first),
            last_seen: ts(last),
            sample_messages: vec!["sample-0".to_string()],
        }
    }

    fn acc(count: u64, first: u32, last: u32, samples: &[&str]) -> SummaryAccumulator {
        SummaryAccumulator {
            pattern: "connection refused to db".to_string(),
            count,
            first_seen: ts(first),
            last_seen: ts(last),
            samples: samples.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_merge_adds_counts_and_extends_interval() {
        let k = key("api", "sig-a");
        let existing = ProjectCacheState {
            project_id: "p1".to_string(),
            summaries: vec![cached_summary(&k, 5, 0, 10)],
        };
        let fetched = HashMap::from([(k.clone(), acc(3, 15, 30, &["s1", "s2", "s3"]))]);

        let outcome = merge(existing, fetched, 5);
        assert_eq!(outcome.created.len(), 0);
        assert_eq!(outcome.updated, 1);

        let merged = &outcome.state.summaries[0];
        assert_eq!(merged.count, 8);
        assert_eq!(merged.first_seen, ts(0));
        assert_eq!(merged.last_seen, ts(30));
        // The summary keeps its identity across merges.
        assert_eq!(merged.id, "existing-id");
    }

    #[test]
    fn test_merge_inserts_new_keys() {
        let existing = ProjectCacheState::new("p1");
        let k = key("api", "sig-a");
        let fetched = HashMap::from([(k.clone(), acc(4, 1, 2, &["s"]))]);

        let outcome = merge(existing, fetched, 5);
        assert_eq!(outcome.created, vec![k]);
        assert_eq!(outcome.updated, 0);
        assert_eq!(outcome.state.summaries.len(), 1);
        assert_eq!(outcome.state.summaries[0].count, 4);
        assert!(!outcome.state.summaries[0].id.is_empty());
    }

    #[test]
    fn test_untouched_keys_carried_over() {
        let k1 = key("api", "sig-a");
        let k2 = key("worker", "sig-b");
        let existing = ProjectCacheState {
            project_id: "p1".to_string(),
            summaries: vec![cached_summary(&k1, 5, 0, 10), cached_summary(&k2, 7, 0, 20)],
        };
        let fetched = HashMap::from([(k1, acc(1, 25, 25, &[]))]);

        let outcome = merge(existing, fetched, 5);
        assert_eq!(outcome.state.summaries.len(), 2);
        let untouched = outcome
            .state
            .summaries
            .iter()
            .find(|s| s.service == "worker")
            .unwrap();
        assert_eq!(untouched.count, 7);
        assert_eq!(untouched.last_seen, ts(20));
    }

    #[test]
    fn test_sample_overflow_replaces_oldest() {
        let k = key("api", "sig-a");
        let mut summary = cached_summary(&k, 1, 0, 1);
        summary.sample_messages = vec!["old-1".to_string(), "old-2".to_string()];
        let existing = ProjectCacheState {
            project_id: "p1".to_string(),
            summaries: vec![summary],
        };
        let fetched = HashMap::from([(k, acc(2, 2, 3, &["new-1", "new-2"]))]);

        let outcome = merge(existing, fetched, 3);
        let samples = &outcome.state.summaries[0].sample_messages;
        assert_eq!(samples, &["old-2", "new-1", "new-2"]);
    }

    #[test]
    fn test_newest_last_seen_never_moves_backward() {
        let k = key("api", "sig-a");
        let existing = ProjectCacheState {
            project_id: "p1".to_string(),
            summaries: vec![cached_summary(&k, 5, 0, 40)],
        };
        let before = existing.newest_last_seen().unwrap();

        // Incoming data is older than the cached interval.
        let fetched = HashMap::from([(k, acc(2, 5, 10, &[]))]);
        let outcome = merge(existing, fetched, 5);

        assert_eq!(outcome.state.newest_last_seen().unwrap(), before);
        assert_eq!(outcome.state.summaries[0].count, 7);
    }

    #[test]
    fn test_merge_commutes_for_disjoint_windows() {
        let k = key("api", "sig-a");
        let a = HashMap::from([(k.clone(), acc(2, 0, 5, &["a1"]))]);
        let b = HashMap::from([(k.clone(), acc(3, 10, 15, &["b1"]))]);

        let ab = merge(
            merge(ProjectCacheState::new("p1"), a.clone(), 5).state,
            b.clone(),
            5,
        );
        let ba = merge(merge(ProjectCacheState::new("p1"), b, 5).state, a, 5);

        let s_ab = &ab.state.summaries[0];
        let s_ba = &ba.state.summaries[0];
        assert_eq!(s_ab.count, s_ba.count);
        assert_eq!(s_ab.first_seen, s_ba.first_seen);
        assert_eq!(s_ab.last_seen, s_ba.last_seen);
    }
}
