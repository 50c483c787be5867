//! Cache freshness state machine and fetch planning.
//!
//! Freshness is decided entirely from the age of the newest cached data
//! point (`newest_last_seen`) relative to `now`:
//!
//! | Age | State | Action |
//! |-----|-------|--------|
//! | no summaries | `NoCache` | full fetch over `[now - max_staleness, now]` |
//! | `age < ttl` | `Fresh` | serve cache, zero remote calls |
//! | `ttl ≤ age < max_staleness` | `Stale` | incremental fetch over `[newest_last_seen, now]` |
//! | `age ≥ max_staleness` | `Expired` | full fetch over `[now - max_staleness, now]` |
//!
//! Both comparisons are inclusive-lower/exclusive-upper on the stale
//! side: an age exactly equal to `ttl` is `Stale`, not `Fresh`, and an
//! age exactly equal to `max_staleness` is `Expired`, not `Stale`.

use chrono::{DateTime, Duration, Utc};

use crate::models::ProjectCacheState;

/// Freshness classification of a project's cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheFreshness {
    NoCache,
    Fresh,
    Stale,
    Expired,
}

/// TTL and staleness bounds, usually built from configuration.
#[derive(Debug, Clone, Copy)]
pub struct FreshnessPolicy {
    /// Maximum age still considered authoritative without re-fetching.
    pub ttl: Duration,
    /// Maximum age beyond which the cache is rebuilt from scratch.
    pub max_staleness: Duration,
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::hours(2),
            max_staleness: Duration::hours(24),
        }
    }
}

/// What the orchestrator should do for this request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchDecision {
    /// Cache is fresh; serve it without any remote calls.
    ServeCache,
    /// Fetch only the window since the newest cached data point.
    Incremental { start: DateTime<Utc> },
    /// Fetch the full staleness window.
    Full { start: DateTime<Utc> },
}

impl FreshnessPolicy {
    /// Classify a cache state's freshness at the given instant.
    pub fn classify(&self, now: DateTime<Utc>, state: Option<&ProjectCacheState>) -> CacheFreshness {
        let newest = match state.and_then(ProjectCacheState::newest_last_seen) {
            Some(ts) => ts,
            None => return CacheFreshness::NoCache,
        };
        let age = now - newest;
        if age < self.ttl {
            CacheFreshness::Fresh
        } else if age < self.max_staleness {
            CacheFreshness::Stale
        } else {
            CacheFreshness::Expired
        }
    }

    /// Map a cache state to the fetch decision for this request.
    pub fn decide(&self, now: DateTime<Utc>, state: Option<&ProjectCacheState>) -> FetchDecision {
        match self.classify(now, state) {
            CacheFreshness::Fresh => FetchDecision::ServeCache,
            CacheFreshness::Stale => FetchDecision::Incremental {
                // The unwrap cannot fail: Stale implies summaries exist.
                start: state
                    .and_then(ProjectCacheState::newest_last_seen)
                    .unwrap_or(now - self.max_staleness),
            },
            CacheFreshness::NoCache | CacheFreshness::Expired => FetchDecision::Full {
                start: now - self.max_staleness,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LogSummary, Severity};
    use chrono::TimeZone;

    fn state_with_last_seen(last_seen: DateTime<Utc>) -> ProjectCacheState {
        ProjectCacheState {
            project_id: "p1".to_string(),
            summaries: vec![LogSummary {
                id: "s1".to_string(),
                project_id: "p1".to_string(),
                service: "api".to_string(),
                severity: Severity::Error,
                signature: "abc".to_string(),
                pattern: "x".to_string(),
                count: 1,
                first_seen: last_seen,
                last_seen,
                sample_messages: vec![],
            }],
        }
    }

    fn policy() -> FreshnessPolicy {
        FreshnessPolicy::default()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_no_cache() {
        assert_eq!(policy().classify(now(), None), CacheFreshness::NoCache);
        let empty = ProjectCacheState::new("p1");
        assert_eq!(policy().classify(now(), Some(&empty)), CacheFreshness::NoCache);
    }

    #[test]
    fn test_fresh_under_ttl() {
        let state = state_with_last_seen(now() - Duration::minutes(119));
        assert_eq!(policy().classify(now(), Some(&state)), CacheFreshness::Fresh);
    }

    #[test]
    fn test_age_exactly_ttl_is_stale() {
        let state = state_with_last_seen(now() - Duration::hours(2));
        assert_eq!(policy().classify(now(), Some(&state)), CacheFreshness::Stale);
    }

    #[test]
    fn test_stale_between_bounds() {
        let state = state_with_last_seen(now() - Duration::hours(12));
        assert_eq!(policy().classify(now(), Some(&state)), CacheFreshness::Stale);
    }

    #[test]
    fn test_age_exactly_max_staleness_is_expired() {
        let state = state_with_last_seen(now() - Duration::hours(24));
        assert_eq!(policy().classify(now(), Some(&state)), CacheFreshness::Expired);
    }

    #[test]
    fn test_decide_windows() {
        let p = policy();
        let newest = now() - Duration::hours(3);
        let state = state_with_last_seen(newest);
        assert_eq!(
            p.decide(now(), Some(&state)),
            FetchDecision::Incremental { start: newest }
        );

        assert_eq!(
            p.decide(now(), None),
            FetchDecision::Full {
                start: now() - Duration::hours(24)
            }
        );

        let expired = state_with_last_seen(now() - Duration::hours(30));
        assert_eq!(
            p.decide(now(), Some(&expired)),
            FetchDecision::Full {
                start: now() - Duration::hours(24)
            }
        );
    }

    #[test]
    fn test_decide_fresh_serves_cache() {
        let state = state_with_last_seen(now() - Duration::minutes(5));
        assert_eq!(policy().decide(now(), Some(&state)), FetchDecision::ServeCache);
    }
}
