use std::collections::HashSet;

use async_trait::async_trait;

use crate::error::AppError;

use super::{
    db::SurrealDbClient,
    types::{
        artifact_embedding::{ArtifactEmbedding, VectorMatch},
        code_artifact::{CodeArtifact, DedupKey},
    },
};

/// Durable record of annotated artifacts.
///
/// `insert` must reject a second artifact with the same [`DedupKey`].
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn find_by_key(&self, key: &DedupKey) -> Result<Option<CodeArtifact>, AppError>;

    async fn insert(&self, artifact: CodeArtifact) -> Result<(), AppError>;

    /// Artifacts for `ids`, in the order of `ids`. Unknown ids are skipped.
    async fn get_many(&self, ids: &[String]) -> Result<Vec<CodeArtifact>, AppError>;

    async fn exists_for_repo(&self, repo_full_name: &str) -> Result<bool, AppError>;

    async fn list_page(&self, start: usize, limit: usize) -> Result<Vec<CodeArtifact>, AppError>;
}

/// Nearest-neighbour index keyed by artifact id.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn insert(
        &self,
        artifact_id: &str,
        repo_full_name: &str,
        vector: Vec<f32>,
    ) -> Result<(), AppError>;

    /// Overwrites the entry for `artifact_id`, creating it when absent.
    async fn replace(
        &self,
        artifact_id: &str,
        repo_full_name: &str,
        vector: Vec<f32>,
    ) -> Result<(), AppError>;

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<VectorMatch>, AppError>;

    async fn existing_ids(&self, ids: &[String]) -> Result<HashSet<String>, AppError>;
}

#[async_trait]
impl ArtifactStore for SurrealDbClient {
    async fn find_by_key(&self, key: &DedupKey) -> Result<Option<CodeArtifact>, AppError> {
        CodeArtifact::find_by_key(key, self).await
    }

    async fn insert(&self, artifact: CodeArtifact) -> Result<(), AppError> {
        self.store_item(artifact).await?;
        Ok(())
    }

    async fn get_many(&self, ids: &[String]) -> Result<Vec<CodeArtifact>, AppError> {
        CodeArtifact::get_by_ids(ids, self).await
    }

    async fn exists_for_repo(&self, repo_full_name: &str) -> Result<bool, AppError> {
        CodeArtifact::exists_for_repo(repo_full_name, self).await
    }

    async fn list_page(&self, start: usize, limit: usize) -> Result<Vec<CodeArtifact>, AppError> {
        CodeArtifact::list_page(start, limit, self).await
    }
}

#[async_trait]
impl VectorStore for SurrealDbClient {
    async fn insert(
        &self,
        artifact_id: &str,
        repo_full_name: &str,
        vector: Vec<f32>,
    ) -> Result<(), AppError> {
        let entry = ArtifactEmbedding::new(
            artifact_id.to_string(),
            repo_full_name.to_string(),
            vector,
        );
        self.store_item(entry).await?;
        Ok(())
    }

    async fn replace(
        &self,
        artifact_id: &str,
        repo_full_name: &str,
        vector: Vec<f32>,
    ) -> Result<(), AppError> {
        let entry = ArtifactEmbedding::new(
            artifact_id.to_string(),
            repo_full_name.to_string(),
            vector,
        );
        self.upsert_item(entry).await?;
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<VectorMatch>, AppError> {
        ArtifactEmbedding::similarity_search(vector, top_k, self).await
    }

    async fn existing_ids(&self, ids: &[String]) -> Result<HashSet<String>, AppError> {
        ArtifactEmbedding::existing_ids(ids, self).await
    }
}

/// Transient SurrealDB write conflict; the same write may succeed on retry.
pub fn is_retryable_conflict(error: &AppError) -> bool {
    matches!(error, AppError::Database(err) if err
        .to_string()
        .contains("Failed to commit transaction due to a read or write conflict"))
}

/// The write was rejected because the record or its unique key already exists.
pub fn is_duplicate(error: &AppError) -> bool {
    matches!(error, AppError::Database(err) if {
        let message = err.to_string();
        message.contains("already contains") || message.contains("already exists")
    })
}

/// Store doubles for exercising failure paths.
#[cfg(any(test, feature = "test-utils"))]
pub mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Vector store whose writes always fail. Reads delegate to `inner`.
    pub struct FailingVectorStore<S> {
        pub inner: S,
        attempts: AtomicUsize,
    }

    impl<S> FailingVectorStore<S> {
        pub fn new(inner: S) -> Self {
            Self {
                inner,
                attempts: AtomicUsize::new(0),
            }
        }

        pub fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl<S: VectorStore> VectorStore for FailingVectorStore<S> {
        async fn insert(
            &self,
            _artifact_id: &str,
            _repo_full_name: &str,
            _vector: Vec<f32>,
        ) -> Result<(), AppError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(AppError::InternalError("vector index unavailable".into()))
        }

        async fn replace(
            &self,
            _artifact_id: &str,
            _repo_full_name: &str,
            _vector: Vec<f32>,
        ) -> Result<(), AppError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(AppError::InternalError("vector index unavailable".into()))
        }

        async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<VectorMatch>, AppError> {
            self.inner.query(vector, top_k).await
        }

        async fn existing_ids(&self, ids: &[String]) -> Result<HashSet<String>, AppError> {
            self.inner.existing_ids(ids).await
        }
    }

    /// Artifact store whose inserts always fail. Reads delegate to `inner`.
    pub struct FailingArtifactStore<S> {
        pub inner: S,
        attempts: AtomicUsize,
    }

    impl<S> FailingArtifactStore<S> {
        pub fn new(inner: S) -> Self {
            Self {
                inner,
                attempts: AtomicUsize::new(0),
            }
        }

        pub fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl<S: ArtifactStore> ArtifactStore for FailingArtifactStore<S> {
        async fn find_by_key(&self, key: &DedupKey) -> Result<Option<CodeArtifact>, AppError> {
            self.inner.find_by_key(key).await
        }

        async fn insert(&self, _artifact: CodeArtifact) -> Result<(), AppError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(AppError::InternalError("artifact store unavailable".into()))
        }

        async fn get_many(&self, ids: &[String]) -> Result<Vec<CodeArtifact>, AppError> {
            self.inner.get_many(ids).await
        }

        async fn exists_for_repo(&self, repo_full_name: &str) -> Result<bool, AppError> {
            self.inner.exists_for_repo(repo_full_name).await
        }

        async fn list_page(
            &self,
            start: usize,
            limit: usize,
        ) -> Result<Vec<CodeArtifact>, AppError> {
            self.inner.list_page(start, limit).await
        }
    }
}
