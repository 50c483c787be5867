//! SQLite-backed [`SummaryStore`] implementation.
//!
//! One row per `(project_id, group_key)` in the `summaries` table, with
//! sample messages stored as a JSON array. Enrichment vectors live in
//! `summary_vectors` as little-endian f32 BLOBs.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use sawmill_core::embedding::vec_to_blob;
use sawmill_core::models::{GroupKey, LogSummary, ProjectCacheState, Severity};
use sawmill_core::store::SummaryStore;

/// SQLite implementation of the [`SummaryStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl SummaryStore for SqliteStore {
    async fn load(&self, project_id: &str) -> Result<Option<ProjectCacheState>> {
        let rows = sqlx::query(
            r#"
            SELECT id, service, severity, signature, pattern, count,
                   first_seen, last_seen, samples_json
            FROM summaries
            WHERE project_id = ?
            ORDER BY last_seen DESC, group_key ASC
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(None);
        }

        let mut summaries = Vec::with_capacity(rows.len());
        for row in &rows {
            let severity: String = row.get("severity");
            let samples_json: String = row.get("samples_json");
            let first_seen: i64 = row.get("first_seen");
            let last_seen: i64 = row.get("last_seen");
            let count: i64 = row.get("count");

            summaries.push(LogSummary {
                id: row.get("id"),
                project_id: project_id.to_string(),
                service: row.get("service"),
                severity: severity.parse::<Severity>()?,
                signature: row.get("signature"),
                pattern: row.get("pattern"),
                count: count as u64,
                first_seen: chrono::DateTime::from_timestamp(first_seen, 0)
                    .ok_or_else(|| anyhow::anyhow!("Invalid first_seen timestamp: {}", first_seen))?,
                last_seen: chrono::DateTime::from_timestamp(last_seen, 0)
                    .ok_or_else(|| anyhow::anyhow!("Invalid last_seen timestamp: {}", last_seen))?,
                sample_messages: serde_json::from_str(&samples_json)?,
            });
        }

        Ok(Some(ProjectCacheState {
            project_id: project_id.to_string(),
            summaries,
        }))
    }

    async fn save(&self, state: &ProjectCacheState) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        for summary in &state.summaries {
            let samples_json = serde_json::to_string(&summary.sample_messages)?;
            sqlx::query(
                r#"
                INSERT INTO summaries (project_id, group_key, id, service, severity,
                                       signature, pattern, count, first_seen, last_seen,
                                       samples_json, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(project_id, group_key) DO UPDATE SET
                    pattern = excluded.pattern,
                    count = excluded.count,
                    first_seen = excluded.first_seen,
                    last_seen = excluded.last_seen,
                    samples_json = excluded.samples_json,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&state.project_id)
            .bind(summary.group_key().storage_key())
            .bind(&summary.id)
            .bind(&summary.service)
            .bind(summary.severity.to_string())
            .bind(&summary.signature)
            .bind(&summary.pattern)
            .bind(summary.count as i64)
            .bind(summary.first_seen.timestamp())
            .bind(summary.last_seen.timestamp())
            .bind(&samples_json)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn upsert_embedding(
        &self,
        project_id: &str,
        key: &GroupKey,
        vector: &[f32],
        model: &str,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let blob = vec_to_blob(vector);

        sqlx::query(
            r#"
            INSERT INTO summary_vectors (project_id, group_key, embedding, model, dims, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(project_id, group_key) DO UPDATE SET
                embedding = excluded.embedding,
                model = excluded.model,
                dims = excluded.dims,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(project_id)
        .bind(key.storage_key())
        .bind(&blob)
        .bind(model)
        .bind(vector.len() as i64)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
