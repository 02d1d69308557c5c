use common::{
    error::AppError,
    storage::{
        store::{ArtifactStore, VectorStore},
        types::code_artifact::DedupKey,
    },
};
use tracing::error;

use super::{annotation::Annotation, config::IngestionConfig, services::PipelineServices};
use crate::types::IngestRequest;

pub struct PipelineContext<'a> {
    pub request: &'a IngestRequest,
    pub artifact_id: String,
    pub key: DedupKey,
    pub content_snippet: String,
    pub artifacts: &'a dyn ArtifactStore,
    pub vectors: &'a dyn VectorStore,
    pub pipeline_config: &'a IngestionConfig,
    pub services: &'a dyn PipelineServices,
    pub annotation: Option<Annotation>,
    pub embedding: Option<Vec<f32>>,
}

impl<'a> PipelineContext<'a> {
    pub fn new(
        request: &'a IngestRequest,
        key: DedupKey,
        artifacts: &'a dyn ArtifactStore,
        vectors: &'a dyn VectorStore,
        pipeline_config: &'a IngestionConfig,
        services: &'a dyn PipelineServices,
    ) -> Self {
        Self {
            request,
            artifact_id: String::new(),
            key,
            content_snippet: String::new(),
            artifacts,
            vectors,
            pipeline_config,
            services,
            annotation: None,
            embedding: None,
        }
    }

    pub fn annotation(&self) -> Result<&Annotation, AppError> {
        self.annotation
            .as_ref()
            .ok_or_else(|| AppError::InternalError("annotation expected to be available".into()))
    }

    pub fn take_embedding(&mut self) -> Result<Vec<f32>, AppError> {
        self.embedding.take().ok_or_else(|| {
            AppError::InternalError("embedding expected to be available for persistence".into())
        })
    }

    pub fn abort(&mut self, err: AppError) -> AppError {
        error!(
            artifact_id = %self.artifact_id,
            repo_full_name = %self.key.repo_full_name,
            file_path = %self.key.file_path,
            error = %err,
            "ingestion pipeline aborted"
        );
        err
    }
}
