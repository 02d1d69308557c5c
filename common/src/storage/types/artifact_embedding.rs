use std::collections::HashSet;

use surrealdb::RecordId;

use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

// Record key is the owning artifact's id.
stored_object!(ArtifactEmbedding, "artifact_embedding", {
    repo_full_name: String,
    embedding: Vec<f32>
});

/// A nearest-neighbour hit: artifact id plus cosine similarity.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VectorMatch {
    #[serde(deserialize_with = "deserialize_flexible_id")]
    pub id: String,
    pub score: f32,
}

#[derive(Debug, Deserialize)]
struct IdRow {
    #[serde(deserialize_with = "deserialize_flexible_id")]
    id: String,
}

impl ArtifactEmbedding {
    pub fn new(artifact_id: String, repo_full_name: String, embedding: Vec<f32>) -> Self {
        Self {
            id: artifact_id,
            created_at: Utc::now(),
            repo_full_name,
            embedding,
        }
    }

    /// Returns up to `limit` entries ordered by descending similarity to `query`.
    ///
    /// Entries whose dimension differs from the query are ignored.
    pub async fn similarity_search(
        query: &[f32],
        limit: usize,
        db: &SurrealDbClient,
    ) -> Result<Vec<VectorMatch>, AppError> {
        if limit == 0 || query.is_empty() {
            return Ok(Vec::new());
        }

        let mut response = db
            .client
            .query(
                "SELECT id, vector::similarity::cosine(embedding, $embedding) AS score
                 FROM type::table($table_name)
                 WHERE array::len(embedding) = $dimension
                 ORDER BY score DESC, id ASC
                 LIMIT $limit",
            )
            .bind(("table_name", Self::table_name()))
            .bind(("embedding", query.to_vec()))
            .bind(("dimension", query.len()))
            .bind(("limit", limit))
            .await?;

        Ok(response.take(0)?)
    }

    /// Subset of `ids` that already have an embedding entry.
    pub async fn existing_ids(
        ids: &[String],
        db: &SurrealDbClient,
    ) -> Result<HashSet<String>, AppError> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }

        let things: Vec<RecordId> = ids
            .iter()
            .map(|id| RecordId::from_table_key(Self::table_name(), id.as_str()))
            .collect();

        let mut response = db
            .client
            .query("SELECT id FROM type::table($table_name) WHERE id INSIDE $ids")
            .bind(("table_name", Self::table_name()))
            .bind(("ids", things))
            .await?;

        let rows: Vec<IdRow> = response.take(0)?;
        Ok(rows.into_iter().map(|row| row.id).collect())
    }
}
