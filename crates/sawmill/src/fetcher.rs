//! Paginated event retrieval across streams.
//!
//! The fetcher drives a [`LogSource`]: it discovers streams in recency
//! order, prunes the ones with no activity inside the window, then walks
//! each remaining stream's pages concurrently until the window start, the
//! per-stream cap, or the end of the stream is reached.
//!
//! Failure policy: a stream whose pagination fails is skipped and
//! recorded, and the fetch continues with the remaining streams. Only
//! when every attempted stream fails does the whole fetch fail with
//! [`PipelineError::SourceUnavailable`].

use std::sync::Arc;
use std::time::Duration;

use globset::{Glob, GlobSet, GlobSetBuilder};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use sawmill_core::error::PipelineError;
use sawmill_core::models::{FetchWindow, LogEvent};

use crate::config::FetchConfig;
use crate::source::LogSource;

/// Per-fetch tuning derived from configuration.
pub struct FetchTuning {
    /// Timeout applied independently to every remote call.
    pub timeout: Duration,
    /// Maximum number of streams fetched concurrently.
    pub stream_concurrency: usize,
    /// Stream names must match (when non-empty).
    pub include: Option<GlobSet>,
    /// Stream names matching any of these are dropped.
    pub exclude: Option<GlobSet>,
}

impl FetchTuning {
    pub fn from_config(config: &FetchConfig) -> anyhow::Result<Self> {
        Ok(Self {
            timeout: Duration::from_secs(config.timeout_secs),
            stream_concurrency: config.stream_concurrency,
            include: build_globset(&config.include_globs)?,
            exclude: build_globset(&config.exclude_globs)?,
        })
    }
}

impl Default for FetchTuning {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            stream_concurrency: 8,
            include: None,
            exclude: None,
        }
    }
}

/// A stream that failed during this fetch.
#[derive(Debug, Clone)]
pub struct StreamFailure {
    pub stream: String,
    pub error: String,
}

/// Everything one fetch produced.
///
/// Events are a flat concatenation across streams with no cross-stream
/// ordering and no deduplication: similar-looking events from different
/// streams are distinct occurrences.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub events: Vec<LogEvent>,
    /// Streams whose events were (at least partially) retrieved.
    pub streams_scanned: usize,
    /// Streams pruned before retrieval: last activity outside the window,
    /// or dropped by the stream-name filters.
    pub streams_skipped: usize,
    pub failures: Vec<StreamFailure>,
}

/// Drives a [`LogSource`] to produce a bounded, window-scoped event set.
pub struct LogFetcher {
    source: Arc<dyn LogSource>,
    tuning: FetchTuning,
}

impl LogFetcher {
    pub fn new(source: Arc<dyn LogSource>, tuning: FetchTuning) -> Self {
        Self { source, tuning }
    }

    /// Fetch all in-window events, subject to the window's caps.
    ///
    /// Each call re-queries the source; results are not cached here.
    pub async fn fetch(&self, window: &FetchWindow) -> Result<FetchOutcome, PipelineError> {
        let discovery = tokio::time::timeout(
            self.tuning.timeout,
            self.source.list_streams(&window.log_group, window.max_streams),
        )
        .await;

        let streams = match discovery {
            Ok(Ok(streams)) => streams,
            Ok(Err(e)) => {
                return Err(PipelineError::SourceUnavailable {
                    log_group: window.log_group.clone(),
                    reason: format!("stream discovery failed: {}", e),
                })
            }
            Err(_) => {
                return Err(PipelineError::SourceUnavailable {
                    log_group: window.log_group.clone(),
                    reason: format!("stream discovery timed out after {:?}", self.tuning.timeout),
                })
            }
        };

        let mut outcome = FetchOutcome::default();

        // Prune before any per-event cost: streams whose most recent
        // activity predates the window cannot contribute, and filtered
        // names are never fetched.
        let mut candidates = Vec::new();
        for stream in streams {
            if !self.name_allowed(&stream.name) {
                outcome.streams_skipped += 1;
                continue;
            }
            match stream.last_event_at {
                Some(ts) if ts >= window.start => candidates.push(stream),
                _ => outcome.streams_skipped += 1,
            }
        }
        candidates.truncate(window.max_streams);

        if candidates.is_empty() {
            debug!(
                log_group = %window.log_group,
                skipped = outcome.streams_skipped,
                "no streams with activity inside the fetch window"
            );
            return Ok(outcome);
        }

        let attempted = candidates.len();
        let semaphore = Arc::new(Semaphore::new(self.tuning.stream_concurrency));
        let mut tasks: JoinSet<(String, Result<Vec<LogEvent>, String>)> = JoinSet::new();

        for stream in candidates {
            let source = Arc::clone(&self.source);
            let semaphore = Arc::clone(&semaphore);
            let log_group = window.log_group.clone();
            let start = window.start;
            let end = window.end;
            let cap = window.max_events_per_stream;
            let timeout = self.tuning.timeout;

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");
                let result =
                    fetch_stream(&*source, &log_group, &stream.name, start, end, cap, timeout)
                        .await;
                (stream.name, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((stream, Ok(events))) => {
                    debug!(stream = %stream, events = events.len(), "stream fetched");
                    outcome.streams_scanned += 1;
                    outcome.events.extend(events);
                }
                Ok((stream, Err(error))) => {
                    warn!(stream = %stream, error = %error, "stream fetch failed, skipping");
                    outcome.failures.push(StreamFailure { stream, error });
                }
                Err(join_error) => {
                    warn!(error = %join_error, "stream fetch task aborted");
                    outcome.failures.push(StreamFailure {
                        stream: "<unknown>".to_string(),
                        error: join_error.to_string(),
                    });
                }
            }
        }

        if outcome.streams_scanned == 0 && outcome.failures.len() >= attempted {
            let first = outcome
                .failures
                .first()
                .map(|f| f.error.clone())
                .unwrap_or_else(|| "unknown".to_string());
            return Err(PipelineError::SourceUnavailable {
                log_group: window.log_group.clone(),
                reason: format!("all {} streams failed, first error: {}", attempted, first),
            });
        }

        Ok(outcome)
    }

    fn name_allowed(&self, name: &str) -> bool {
        if let Some(exclude) = &self.tuning.exclude {
            if exclude.is_match(name) {
                return false;
            }
        }
        if let Some(include) = &self.tuning.include {
            return include.is_match(name);
        }
        true
    }
}

/// Page through one stream until the window start, the cap, or the end
/// of the stream.
///
/// Relies on the [`LogSource`] contract that pages arrive newest-first:
/// the first event older than `start` terminates the stream.
async fn fetch_stream(
    source: &dyn LogSource,
    log_group: &str,
    stream: &str,
    start: chrono::DateTime<chrono::Utc>,
    end: chrono::DateTime<chrono::Utc>,
    cap: usize,
    timeout: Duration,
) -> Result<Vec<LogEvent>, String> {
    let mut events = Vec::new();
    let mut token: Option<String> = None;

    loop {
        let page = tokio::time::timeout(
            timeout,
            source.get_events(log_group, stream, start, end, token.as_deref()),
        )
        .await
        .map_err(|_| format!("page retrieval timed out after {:?}", timeout))?
        .map_err(|e| e.to_string())?;

        let mut reached_window_start = false;
        for event in page.events {
            if event.timestamp < start {
                reached_window_start = true;
                break;
            }
            if event.timestamp > end {
                continue;
            }
            events.push(event);
            if events.len() >= cap {
                return Ok(events);
            }
        }

        if reached_window_start {
            break;
        }
        match page.next_token {
            Some(next) => token = Some(next),
            None => break,
        }
    }

    Ok(events)
}

/// Build a [`GlobSet`] from pattern strings; `None` when empty.
fn build_globset(patterns: &[String]) -> anyhow::Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(Some(builder.build()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{EventPage, StreamInfo};
    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ts(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, minute, 0).unwrap()
    }

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
    }

    /// Scripted source: per-stream event lists (newest first), paginated,
    /// with optional per-stream failure injection by page index.
    struct ScriptedSource {
        streams: Vec<StreamInfo>,
        events: HashMap<String, Vec<LogEvent>>,
        page_size: usize,
        fail_on_page: HashMap<String, usize>,
        get_calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(page_size: usize) -> Self {
            Self {
                streams: Vec::new(),
                events: HashMap::new(),
                page_size,
                fail_on_page: HashMap::new(),
                get_calls: AtomicUsize::new(0),
            }
        }

        /// Add a stream with `count` in-window events, newest first.
        fn with_stream(mut self, name: &str, count: usize, newest: DateTime<Utc>) -> Self {
            let events: Vec<LogEvent> = (0..count)
                .map(|i| LogEvent {
                    stream: name.to_string(),
                    timestamp: newest - chrono::Duration::seconds(i as i64),
                    message: format!("ERROR: boom from {}", name),
                    severity_hint: None,
                })
                .collect();
            self.streams.push(StreamInfo {
                name: name.to_string(),
                last_event_at: Some(newest),
            });
            self.events.insert(name.to_string(), events);
            self
        }

        fn failing_at(mut self, name: &str, page: usize) -> Self {
            self.fail_on_page.insert(name.to_string(), page);
            self
        }
    }

    #[async_trait]
    impl LogSource for ScriptedSource {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn list_streams(&self, _log_group: &str, limit: usize) -> Result<Vec<StreamInfo>> {
            Ok(self.streams.iter().take(limit).cloned().collect())
        }

        async fn get_events(
            &self,
            _log_group: &str,
            stream: &str,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
            token: Option<&str>,
        ) -> Result<EventPage> {
            self.get_calls.fetch_add(1, Ordering::SeqCst);
            let page: usize = token.map(|t| t.parse().unwrap()).unwrap_or(0);
            if self.fail_on_page.get(stream) == Some(&page) {
                anyhow::bail!("injected failure on page {}", page);
            }

            let all = self.events.get(stream).cloned().unwrap_or_default();
            let from = page * self.page_size;
            let to = (from + self.page_size).min(all.len());
            let events = if from < all.len() {
                all[from..to].to_vec()
            } else {
                Vec::new()
            };
            let next_token = if to < all.len() {
                Some((page + 1).to_string())
            } else {
                None
            };
            Ok(EventPage { events, next_token })
        }
    }

    fn window(max_streams: usize, max_events_per_stream: usize) -> FetchWindow {
        FetchWindow {
            project_id: "p1".to_string(),
            log_group: "/aws/app/p1".to_string(),
            start: base(),
            end: ts(59),
            max_streams,
            max_events_per_stream,
        }
    }

    fn fetcher(source: ScriptedSource) -> LogFetcher {
        LogFetcher::new(Arc::new(source), FetchTuning::default())
    }

    #[tokio::test]
    async fn test_caps_bound_total_events() {
        let source = ScriptedSource::new(40)
            .with_stream("a/1", 150, ts(50))
            .with_stream("b/1", 150, ts(49))
            .with_stream("c/1", 150, ts(48));

        let outcome = fetcher(source).fetch(&window(2, 100)).await.unwrap();
        // 2 streams × 100 events, not 450.
        assert_eq!(outcome.events.len(), 200);
        assert_eq!(outcome.streams_scanned, 2);
        assert!(outcome.failures.is_empty());
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_other_streams() {
        let source = ScriptedSource::new(10)
            .with_stream("a/1", 15, ts(50))
            .with_stream("b/1", 15, ts(49))
            .with_stream("c/1", 15, ts(48))
            .failing_at("b/1", 1);

        let outcome = fetcher(source).fetch(&window(3, 1000)).await.unwrap();
        assert_eq!(outcome.events.len(), 30);
        assert_eq!(outcome.streams_scanned, 2);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].stream, "b/1");
    }

    #[tokio::test]
    async fn test_all_streams_failing_is_source_unavailable() {
        let source = ScriptedSource::new(10)
            .with_stream("a/1", 5, ts(50))
            .with_stream("b/1", 5, ts(49))
            .failing_at("a/1", 0)
            .failing_at("b/1", 0);

        let err = fetcher(source).fetch(&window(2, 1000)).await.unwrap_err();
        assert!(matches!(err, PipelineError::SourceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_stale_streams_pruned_without_event_calls() {
        let stale_ts = base() - chrono::Duration::hours(1);
        let source = ScriptedSource::new(10)
            .with_stream("fresh/1", 5, ts(50))
            .with_stream("stale/1", 5, stale_ts);

        let f = fetcher(source);
        let outcome = f.fetch(&window(10, 1000)).await.unwrap();
        assert_eq!(outcome.streams_scanned, 1);
        assert_eq!(outcome.streams_skipped, 1);
        assert_eq!(outcome.events.len(), 5);
    }

    #[tokio::test]
    async fn test_stream_stops_at_window_start() {
        // 20 events, the 6 oldest fall before the window start.
        let newest = ts(50);
        let mut source = ScriptedSource::new(5).with_stream("a/1", 20, newest);
        let events = source.events.get_mut("a/1").unwrap();
        for (i, event) in events.iter_mut().enumerate() {
            if i >= 14 {
                event.timestamp = base() - chrono::Duration::seconds((i - 13) as i64);
            }
        }

        let outcome = fetcher(source).fetch(&window(1, 1000)).await.unwrap();
        assert_eq!(outcome.events.len(), 14);
    }

    #[tokio::test]
    async fn test_exclude_glob_filters_streams() {
        let source = ScriptedSource::new(10)
            .with_stream("api/1", 5, ts(50))
            .with_stream("canary/1", 5, ts(49));

        let tuning = FetchTuning {
            exclude: build_globset(&["canary/*".to_string()]).unwrap(),
            ..FetchTuning::default()
        };
        let f = LogFetcher::new(Arc::new(source), tuning);

        let outcome = f.fetch(&window(10, 1000)).await.unwrap();
        assert_eq!(outcome.streams_scanned, 1);
        assert_eq!(outcome.streams_skipped, 1);
        assert_eq!(outcome.events.len(), 5);
    }

    #[tokio::test]
    async fn test_empty_discovery_is_not_an_error() {
        let source = ScriptedSource::new(10);
        let outcome = fetcher(source).fetch(&window(10, 1000)).await.unwrap();
        assert!(outcome.events.is_empty());
        assert_eq!(outcome.streams_scanned, 0);
    }
}
