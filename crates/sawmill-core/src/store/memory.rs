//! In-memory [`SummaryStore`] implementation for tests.
//!
//! Uses `HashMap` behind `std::sync::RwLock` for thread safety. States
//! are cloned on read so callers never observe partial writes.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{GroupKey, ProjectCacheState};

use super::SummaryStore;

/// In-memory store keyed by project id.
#[derive(Default)]
pub struct InMemoryStore {
    states: RwLock<HashMap<String, ProjectCacheState>>,
    vectors: RwLock<HashMap<(String, String), Vec<f32>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored embedding vectors, across all projects.
    pub fn embedding_count(&self) -> usize {
        self.vectors.read().unwrap().len()
    }
}

#[async_trait]
impl SummaryStore for InMemoryStore {
    async fn load(&self, project_id: &str) -> Result<Option<ProjectCacheState>> {
        let states = self.states.read().unwrap();
        Ok(states.get(project_id).cloned())
    }

    async fn save(&self, state: &ProjectCacheState) -> Result<()> {
        let mut states = self.states.write().unwrap();
        states.insert(state.project_id.clone(), state.clone());
        Ok(())
    }

    async fn upsert_embedding(
        &self,
        project_id: &str,
        key: &GroupKey,
        vector: &[f32],
        _model: &str,
    ) -> Result<()> {
        let mut vectors = self.vectors.write().unwrap();
        vectors.insert(
            (project_id.to_string(), key.storage_key()),
            vector.to_vec(),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LogSummary, Severity};
    use chrono::Utc;

    fn state() -> ProjectCacheState {
        let now = Utc::now();
        ProjectCacheState {
            project_id: "p1".to_string(),
            summaries: vec![LogSummary {
                id: "s1".to_string(),
                project_id: "p1".to_string(),
                service: "api".to_string(),
                severity: Severity::Error,
                signature: "abc".to_string(),
                pattern: "x".to_string(),
                count: 2,
                first_seen: now,
                last_seen: now,
                sample_messages: vec!["m".to_string()],
            }],
        }
    }

    #[tokio::test]
    async fn test_save_and_load_roundtrip() {
        let store = InMemoryStore::new();
        assert!(store.load("p1").await.unwrap().is_none());

        let s = state();
        store.save(&s).await.unwrap();

        let loaded = store.load("p1").await.unwrap().unwrap();
        assert_eq!(loaded.summaries, s.summaries);
        assert!(store.load("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_replaces_state() {
        let store = InMemoryStore::new();
        let mut s = state();
        store.save(&s).await.unwrap();

        s.summaries[0].count = 9;
        store.save(&s).await.unwrap();

        let loaded = store.load("p1").await.unwrap().unwrap();
        assert_eq!(loaded.summaries[0].count, 9);
    }

    #[tokio::test]
    async fn test_upsert_embedding_counted_once_per_key() {
        let store = InMemoryStore::new();
        let key = state().summaries[0].group_key();
        store
            .upsert_embedding("p1", &key, &[0.1, 0.2], "test-model")
            .await
            .unwrap();
        store
            .upsert_embedding("p1", &key, &[0.3, 0.4], "test-model")
            .await
            .unwrap();
        assert_eq!(store.embedding_count(), 1);
    }
}
