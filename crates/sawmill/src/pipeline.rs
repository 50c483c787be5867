//! Pipeline orchestration: freshness → fetch → group → merge → persist →
//! enrich.
//!
//! [`Processor::process`] is the tenant-scoped use case the rest of the
//! system calls. Each run holds the project's single-flight lock for its
//! whole fetch/merge/persist sequence, so two concurrent requests for the
//! same project can never trigger two remote fetches: the second caller
//! waits, re-reads the now-fresh cache, and is served from it. Different
//! projects run fully in parallel.
//!
//! The pipeline body is spawned onto the runtime, so it runs to
//! completion and persists its result even if the original caller goes
//! away — the value of an expensive fetch is realized by future cache
//! hits regardless.
//!
//! Degradation rules (see [`sawmill_core::error`]):
//! - cache read failure → treated as no cache, full fetch
//! - total fetch failure with a cache present → cached state served as a
//!   degraded fallback
//! - cache write failure → computed result still returned
//! - enrichment failure → only lowers `embeddings_created`

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use sawmill_core::error::PipelineError;
use sawmill_core::freshness::{FetchDecision, FreshnessPolicy};
use sawmill_core::group::summarize;
use sawmill_core::merge::{merge, MergeOutcome};
use sawmill_core::models::{
    FetchWindow, ProcessingResult, ProcessingStats, ProjectCacheState, ResultSource, Severity,
};
use sawmill_core::store::SummaryStore;

use crate::config::Config;
use crate::embedding::Embedder;
use crate::fetcher::{FetchTuning, LogFetcher};
use crate::source::LogSource;

/// One async mutex per project id, created on first use.
#[derive(Default)]
struct ProjectLocks {
    inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ProjectLocks {
    fn for_project(&self, project_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.inner.lock().unwrap();
        locks
            .entry(project_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

/// The tenant-scoped log summarization use case.
#[derive(Clone)]
pub struct Processor {
    fetcher: Arc<LogFetcher>,
    store: Arc<dyn SummaryStore>,
    embedder: Option<Arc<dyn Embedder>>,
    policy: FreshnessPolicy,
    sample_bound: usize,
    max_streams: usize,
    max_events_per_stream: usize,
    embed_batch_size: usize,
    source_config: crate::config::SourceConfig,
    locks: Arc<ProjectLocks>,
}

impl Processor {
    pub fn new(
        source: Arc<dyn LogSource>,
        store: Arc<dyn SummaryStore>,
        embedder: Option<Arc<dyn Embedder>>,
        config: &Config,
    ) -> anyhow::Result<Self> {
        let tuning = FetchTuning::from_config(&config.fetch)?;
        Ok(Self {
            fetcher: Arc::new(LogFetcher::new(source, tuning)),
            store,
            embedder,
            policy: config.cache.policy(),
            sample_bound: config.cache.sample_messages,
            max_streams: config.fetch.max_streams,
            max_events_per_stream: config.fetch.max_events_per_stream,
            embed_batch_size: config.embedding.batch_size,
            source_config: config.source.clone(),
            locks: Arc::new(ProjectLocks::default()),
        })
    }

    /// Run the pipeline for one project and return its processing result.
    ///
    /// Only a total log-source outage with no cached fallback surfaces as
    /// an error; every other failure class degrades into statistics.
    pub async fn process(&self, project_id: &str) -> Result<ProcessingResult, PipelineError> {
        let this = self.clone();
        let project = project_id.to_string();
        let handle = tokio::spawn(async move { this.run(&project, Utc::now()).await });

        match handle.await {
            Ok(result) => result,
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(_) => Err(PipelineError::SourceUnavailable {
                log_group: self.source_config.log_group_for(project_id),
                reason: "pipeline task cancelled during runtime shutdown".to_string(),
            }),
        }
    }

    async fn run(&self, project_id: &str, now: DateTime<Utc>) -> Result<ProcessingResult, PipelineError> {
        let lock = self.locks.for_project(project_id);
        let _guard = lock.lock().await;
        let started = Instant::now();

        let cached = match self.store.load(project_id).await {
            Ok(state) => state,
            Err(e) => {
                warn!(project = project_id, error = %e, "cache read failed, degrading to full fetch");
                None
            }
        };

        let (window_start, source_kind) = match self.policy.decide(now, cached.as_ref()) {
            FetchDecision::ServeCache => {
                // decide() only serves the cache when summaries exist.
                let state = cached.unwrap_or_else(|| ProjectCacheState::new(project_id));
                debug!(project = project_id, "cache fresh, serving without remote calls");
                return Ok(cached_result(state, now, started));
            }
            FetchDecision::Incremental { start } => (start, ResultSource::Incremental),
            FetchDecision::Full { start } => (start, ResultSource::Full),
        };

        let window = FetchWindow {
            project_id: project_id.to_string(),
            log_group: self.source_config.log_group_for(project_id),
            start: window_start,
            end: now,
            max_streams: self.max_streams,
            max_events_per_stream: self.max_events_per_stream,
        };

        let fetch_started = Instant::now();
        let outcome = match self.fetcher.fetch(&window).await {
            Ok(outcome) => outcome,
            Err(err) => {
                if let Some(state) = cached {
                    warn!(
                        project = project_id,
                        error = %err,
                        "log source unavailable, serving cached state as degraded fallback"
                    );
                    return Ok(cached_result(state, now, started));
                }
                return Err(err);
            }
        };
        let fetch_ms = elapsed_ms(fetch_started);

        let processing_started = Instant::now();
        let total_events = outcome.events.len() as u64;
        let grouping = summarize(&outcome.events, self.sample_bound);
        let existing = cached.unwrap_or_else(|| ProjectCacheState::new(project_id));
        let merged = merge(existing, grouping.groups, self.sample_bound);
        let processing_ms = elapsed_ms(processing_started);

        if let Err(e) = self.store.save(&merged.state).await {
            // The computed result is still correct; the next call just
            // recomputes from scratch.
            warn!(project = project_id, error = %e, "cache write failed, result served uncached");
        }

        let embed_started = Instant::now();
        let embeddings_created = self.enrich_new_groups(project_id, &merged).await;
        let embed_ms = elapsed_ms(embed_started);

        info!(
            project = project_id,
            events = total_events,
            created = merged.created.len(),
            updated = merged.updated,
            failed_streams = outcome.failures.len(),
            source = ?source_kind,
            "pipeline run complete"
        );

        Ok(ProcessingResult {
            project_id: project_id.to_string(),
            processing_timestamp: now,
            total_logs_processed: total_events,
            error_count: grouping.error_events,
            warning_count: grouping.warning_events,
            summaries_created: merged.created.len() as u64,
            summaries_updated: merged.updated,
            embeddings_created,
            streams_failed: outcome.failures.len() as u64,
            source: source_kind,
            stats: ProcessingStats {
                log_fetch_duration_ms: fetch_ms,
                log_processing_duration_ms: processing_ms,
                embedding_generation_duration_ms: embed_ms,
                total_duration_ms: elapsed_ms(started),
            },
            summaries: merged.state.summaries,
        })
    }

    /// Embed the patterns of newly created groups and store the vectors.
    ///
    /// Strictly best-effort: any failure is logged and the remaining
    /// batches continue. Returns the number of vectors actually stored.
    async fn enrich_new_groups(&self, project_id: &str, merged: &MergeOutcome) -> u64 {
        let embedder = match &self.embedder {
            Some(e) => e,
            None => return 0,
        };
        if merged.created.is_empty() {
            return 0;
        }

        let by_key: HashMap<String, &str> = merged
            .state
            .summaries
            .iter()
            .map(|s| (s.group_key().storage_key(), s.pattern.as_str()))
            .collect();

        let mut created = 0u64;
        for batch in merged.created.chunks(self.embed_batch_size.max(1)) {
            let texts: Vec<String> = batch
                .iter()
                .filter_map(|key| by_key.get(&key.storage_key()))
                .map(|pattern| pattern.to_string())
                .collect();

            let vectors = match embedder.embed(&texts).await {
                Ok(vectors) => vectors,
                Err(e) => {
                    warn!(project = project_id, error = %e, "embedding batch failed, skipping");
                    continue;
                }
            };

            for (key, vector) in batch.iter().zip(vectors.iter()) {
                match self
                    .store
                    .upsert_embedding(project_id, key, vector, embedder.model_name())
                    .await
                {
                    Ok(()) => created += 1,
                    Err(e) => {
                        warn!(project = project_id, error = %e, "embedding write failed, skipping");
                    }
                }
            }
        }

        created
    }
}

/// Assemble a result straight from cached state, with zero fetch cost.
///
/// Severity counts reflect the accumulated totals in the cache, since no
/// new events were processed by this call.
fn cached_result(
    state: ProjectCacheState,
    now: DateTime<Utc>,
    started: Instant,
) -> ProcessingResult {
    ProcessingResult {
        project_id: state.project_id.clone(),
        processing_timestamp: now,
        total_logs_processed: 0,
        error_count: state.count_for(Severity::Error),
        warning_count: state.count_for(Severity::Warning),
        summaries_created: 0,
        summaries_updated: 0,
        embeddings_created: 0,
        streams_failed: 0,
        source: ResultSource::CacheHit,
        stats: ProcessingStats {
            log_fetch_duration_ms: 0,
            log_processing_duration_ms: 0,
            embedding_generation_duration_ms: 0,
            total_duration_ms: elapsed_ms(started),
        },
        summaries: state.summaries,
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}
