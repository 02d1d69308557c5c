use std::{sync::Arc, time::Duration};

use chrono::Utc;
use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        store::{is_duplicate, ArtifactStore, VectorStore},
        types::code_artifact::CodeArtifact,
    },
    utils::{config::AppConfig, deadline::bounded, embedding::EmbeddingEngine},
};
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub scanned: usize,
    pub repaired: usize,
    pub failed: usize,
    /// Missing a vector but younger than the grace period; left for a later pass.
    pub deferred: usize,
}

/// Writes vector entries for artifacts that lost theirs to a failed second write.
///
/// The original content is not kept, so the repaired vector is embedded from the
/// stored snippet and annotation. Artifacts created within `grace` are skipped, as
/// their own ingestion may still be writing the vector.
pub struct VectorReconciler {
    artifacts: Arc<dyn ArtifactStore>,
    vectors: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingEngine>,
    embedding_timeout: Duration,
    grace: Duration,
}

impl VectorReconciler {
    pub fn new(
        db: Arc<SurrealDbClient>,
        embedder: Arc<dyn EmbeddingEngine>,
        config: &AppConfig,
    ) -> Self {
        let artifacts: Arc<dyn ArtifactStore> = Arc::clone(&db) as Arc<dyn ArtifactStore>;
        let vectors: Arc<dyn VectorStore> = db;
        Self::with_stores(
            artifacts,
            vectors,
            embedder,
            Duration::from_secs(config.embedding_timeout_secs),
            Duration::from_secs(config.reconcile_grace_secs),
        )
    }

    pub fn with_stores(
        artifacts: Arc<dyn ArtifactStore>,
        vectors: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingEngine>,
        embedding_timeout: Duration,
        grace: Duration,
    ) -> Self {
        Self {
            artifacts,
            vectors,
            embedder,
            embedding_timeout,
            grace,
        }
    }

    /// Walks every artifact in pages of `batch_size`, repairing missing vectors.
    /// Individual failures are counted and never abort the run.
    #[instrument(skip_all, fields(batch_size = batch_size))]
    pub async fn reconcile_missing_vectors(
        &self,
        batch_size: usize,
    ) -> Result<ReconcileReport, AppError> {
        let batch_size = batch_size.max(1);
        let mut report = ReconcileReport::default();
        let mut start = 0usize;

        loop {
            let page = self.artifacts.list_page(start, batch_size).await?;
            let page_len = page.len();
            if page_len == 0 {
                break;
            }

            let ids: Vec<String> = page.iter().map(|artifact| artifact.id.clone()).collect();
            let present = self.vectors.existing_ids(&ids).await?;

            for artifact in page.iter().filter(|a| !present.contains(&a.id)) {
                if self.within_grace(artifact) {
                    report.deferred = report.deferred.saturating_add(1);
                    continue;
                }
                match self.repair(artifact).await {
                    Ok(true) => report.repaired = report.repaired.saturating_add(1),
                    Ok(false) => {}
                    Err(err) => {
                        warn!(artifact_id = %artifact.id, error = %err, "vector repair failed");
                        report.failed = report.failed.saturating_add(1);
                    }
                }
            }

            report.scanned = report.scanned.saturating_add(page_len);
            start = start.saturating_add(page_len);
            if page_len < batch_size {
                break;
            }
        }

        if report.repaired > 0 || report.failed > 0 {
            info!(
                scanned = report.scanned,
                repaired = report.repaired,
                failed = report.failed,
                deferred = report.deferred,
                "vector reconciliation finished"
            );
        } else {
            debug!(
                scanned = report.scanned,
                deferred = report.deferred,
                "no vectors repaired"
            );
        }

        Ok(report)
    }

    fn within_grace(&self, artifact: &CodeArtifact) -> bool {
        Utc::now()
            .signed_duration_since(artifact.created_at)
            .to_std()
            .map_or(true, |age| age < self.grace)
    }

    // Ok(false) when another writer stored the vector in the meantime.
    async fn repair(&self, artifact: &CodeArtifact) -> Result<bool, AppError> {
        let text = repair_text(artifact);
        let vector = bounded(
            "embedding",
            self.embedding_timeout,
            self.embedder.embed(&text),
        )
        .await?;

        if vector.is_empty() {
            return Err(AppError::Embedding(
                "embedding engine returned an empty vector".into(),
            ));
        }

        match self
            .vectors
            .insert(&artifact.id, &artifact.repo_full_name, vector)
            .await
        {
            Ok(()) => {
                debug!(artifact_id = %artifact.id, "vector entry repaired");
                Ok(true)
            }
            Err(err) if is_duplicate(&err) => Ok(false),
            Err(err) => Err(err),
        }
    }
}

fn repair_text(artifact: &CodeArtifact) -> String {
    format!(
        "{}\n\nSummary: {}\nUse case: {}\nTags: {}",
        artifact.content_snippet,
        artifact.ai_summary,
        artifact.ai_use_case,
        artifact.ai_tags.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as TimeDelta;
    use common::{
        storage::types::{artifact_embedding::ArtifactEmbedding, code_artifact::DedupKey},
        utils::embedding::EmbeddingProvider,
    };
    use uuid::Uuid;

    async fn setup_db() -> Arc<SurrealDbClient> {
        let database = Uuid::new_v4().to_string();
        let db = SurrealDbClient::memory("test_ns", &database)
            .await
            .expect("Failed to start in-memory surrealdb");
        db.apply_migrations()
            .await
            .expect("Failed to apply migrations");
        Arc::new(db)
    }

    fn artifact(path: &str) -> CodeArtifact {
        CodeArtifact::new(
            Uuid::new_v4().to_string(),
            DedupKey::new("acme/x", path, "hash"),
            CodeArtifact::source_url_for("https://github.com", "acme/x", path),
            "package main".into(),
            "entry point".into(),
            vec!["go".into()],
            "start the program".into(),
        )
    }

    fn reconciler(db: &Arc<SurrealDbClient>) -> VectorReconciler {
        let embedder: Arc<dyn EmbeddingEngine> =
            Arc::new(EmbeddingProvider::new_hashed(16).expect("hashed provider"));
        let config = AppConfig {
            reconcile_grace_secs: 0,
            ..AppConfig::default()
        };
        VectorReconciler::new(Arc::clone(db), embedder, &config)
    }

    fn reconciler_with_default_grace(db: &Arc<SurrealDbClient>) -> VectorReconciler {
        let embedder: Arc<dyn EmbeddingEngine> =
            Arc::new(EmbeddingProvider::new_hashed(16).expect("hashed provider"));
        VectorReconciler::new(Arc::clone(db), embedder, &AppConfig::default())
    }

    #[tokio::test]
    async fn test_repairs_only_missing_vectors() {
        let db = setup_db().await;
        let healthy = artifact("a.go");
        let orphaned = artifact("b.go");
        db.store_item(healthy.clone()).await.expect("store");
        db.store_item(orphaned.clone()).await.expect("store");
        db.store_item(ArtifactEmbedding::new(
            healthy.id.clone(),
            healthy.repo_full_name.clone(),
            vec![1.0; 16],
        ))
        .await
        .expect("store vector");

        let report = reconciler(&db)
            .reconcile_missing_vectors(1)
            .await
            .expect("reconcile");

        assert_eq!(
            report,
            ReconcileReport {
                scanned: 2,
                repaired: 1,
                failed: 0,
                deferred: 0
            }
        );

        let repaired = db
            .get_item::<ArtifactEmbedding>(&orphaned.id)
            .await
            .expect("fetch")
            .expect("vector written");
        assert_eq!(repaired.embedding.len(), 16);

        let untouched = db
            .get_item::<ArtifactEmbedding>(&healthy.id)
            .await
            .expect("fetch")
            .expect("vector kept");
        assert_eq!(untouched.embedding, vec![1.0; 16]);
    }

    #[tokio::test]
    async fn test_second_pass_is_a_no_op() {
        let db = setup_db().await;
        db.store_item(artifact("a.go")).await.expect("store");
        let reconciler = reconciler(&db);

        let first = reconciler.reconcile_missing_vectors(10).await.expect("first");
        let second = reconciler.reconcile_missing_vectors(10).await.expect("second");

        assert_eq!(first.repaired, 1);
        assert_eq!(second.repaired, 0);
        assert_eq!(second.scanned, 1);
    }

    #[tokio::test]
    async fn test_empty_store_reports_nothing() {
        let db = setup_db().await;
        let report = reconciler(&db)
            .reconcile_missing_vectors(10)
            .await
            .expect("reconcile");
        assert_eq!(report, ReconcileReport::default());
    }

    #[tokio::test]
    async fn test_fresh_artifact_is_deferred() {
        let db = setup_db().await;
        let fresh = artifact("a.go");
        db.store_item(fresh.clone()).await.expect("store");

        let report = reconciler_with_default_grace(&db)
            .reconcile_missing_vectors(10)
            .await
            .expect("reconcile");

        assert_eq!(
            report,
            ReconcileReport {
                scanned: 1,
                repaired: 0,
                failed: 0,
                deferred: 1
            }
        );
        assert!(db
            .get_item::<ArtifactEmbedding>(&fresh.id)
            .await
            .expect("fetch")
            .is_none());
    }

    #[tokio::test]
    async fn test_artifact_past_grace_is_repaired() {
        let db = setup_db().await;
        let mut stale = artifact("a.go");
        stale.created_at = Utc::now() - TimeDelta::minutes(10);
        db.store_item(stale.clone()).await.expect("store");

        let report = reconciler_with_default_grace(&db)
            .reconcile_missing_vectors(10)
            .await
            .expect("reconcile");

        assert_eq!(report.repaired, 1);
        assert_eq!(report.deferred, 0);
    }

    #[test]
    fn test_repair_text_uses_stored_fields() {
        let text = repair_text(&artifact("a.go"));
        assert!(text.starts_with("package main"));
        assert!(text.contains("Summary: entry point"));
        assert!(text.contains("Tags: go"));
    }
}
