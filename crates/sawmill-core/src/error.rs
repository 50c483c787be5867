//! Pipeline error taxonomy.
//!
//! Only a total log-source outage with no cache to fall back on ever
//! reaches the caller. Every other failure class degrades: partial
//! stream failures and enrichment failures become statistics, cache
//! read failures force a full fetch, and cache write failures still
//! return the freshly computed result.

use thiserror::Error;

/// Errors that can surface from a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Every stream in the fetch window failed (auth, network, or
    /// discovery itself), so no data could be retrieved at all.
    #[error("log source unavailable for {log_group}: {reason}")]
    SourceUnavailable { log_group: String, reason: String },
}
