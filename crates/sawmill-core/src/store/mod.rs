//! Storage abstraction for cached project summaries.
//!
//! The [`SummaryStore`] trait defines the persistence operations the
//! pipeline needs, enabling pluggable backends (SQLite, in-memory).
//! The store is assumed to offer tenant-scoped read-then-write
//! consistency; no cross-tenant coordination is required of it.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{GroupKey, ProjectCacheState};

/// Abstract persistence backend for project cache state.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`load`](SummaryStore::load) | Read a project's full cached state |
/// | [`save`](SummaryStore::save) | Replace a project's cached state |
/// | [`upsert_embedding`](SummaryStore::upsert_embedding) | Store an enrichment vector for one group |
#[async_trait]
pub trait SummaryStore: Send + Sync {
    /// Retrieve the cached state for a project, if any exists.
    async fn load(&self, project_id: &str) -> Result<Option<ProjectCacheState>>;

    /// Persist a project's cache state, replacing what was there.
    async fn save(&self, state: &ProjectCacheState) -> Result<()>;

    /// Store or update the embedding vector for one summary group.
    async fn upsert_embedding(
        &self,
        project_id: &str,
        key: &GroupKey,
        vector: &[f32],
        model: &str,
    ) -> Result<()>;
}
