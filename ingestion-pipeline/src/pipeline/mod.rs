mod annotation;
mod config;
mod context;
mod services;
mod stages;
mod state;

pub use annotation::{
    Annotation, AnnotationError, PARSE_ERROR_TAG, SUMMARY_FAILED, UNKNOWN_USE_CASE,
};
pub use config::{IngestionConfig, IngestionTuning};
#[allow(clippy::module_name_repetitions)]
pub use services::{DefaultPipelineServices, PipelineServices};

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        store::{ArtifactStore, VectorStore},
        types::code_artifact::DedupKey,
    },
    utils::{
        config::AppConfig, content_hash::hash_content, embedding::EmbeddingEngine,
        llm::TextGenerator,
    },
};
use tracing::{debug, info};

use self::{
    context::PipelineContext,
    stages::{annotate, deduplicate, embed, store_artifact, store_vector, Advance},
    state::ready,
};
use crate::types::{IngestOutcome, IngestRequest};

#[allow(clippy::module_name_repetitions)]
pub struct IngestionPipeline {
    artifacts: Arc<dyn ArtifactStore>,
    vectors: Arc<dyn VectorStore>,
    pipeline_config: IngestionConfig,
    services: Arc<dyn PipelineServices>,
}

impl IngestionPipeline {
    pub fn new(
        db: Arc<SurrealDbClient>,
        generator: Arc<dyn TextGenerator>,
        embedder: Arc<dyn EmbeddingEngine>,
        config: &AppConfig,
    ) -> Self {
        let pipeline_config = IngestionConfig::from_app_config(config);
        let services =
            DefaultPipelineServices::new(generator, embedder, pipeline_config.clone());
        let artifacts: Arc<dyn ArtifactStore> = Arc::clone(&db) as Arc<dyn ArtifactStore>;
        let vectors: Arc<dyn VectorStore> = db;

        Self::with_services(artifacts, vectors, pipeline_config, Arc::new(services))
    }

    pub fn with_services(
        artifacts: Arc<dyn ArtifactStore>,
        vectors: Arc<dyn VectorStore>,
        pipeline_config: IngestionConfig,
        services: Arc<dyn PipelineServices>,
    ) -> Self {
        Self {
            artifacts,
            vectors,
            pipeline_config,
            services,
        }
    }

    /// Ingests one file: dedup check, annotation, embedding, then the artifact row
    /// followed by its vector entry.
    ///
    /// Identical content for the same repo and path resolves to the existing artifact
    /// without side effects.
    #[tracing::instrument(
        skip_all,
        fields(
            repo_full_name = %request.repo_full_name,
            file_path = %request.file_path,
            content_bytes = request.content.len()
        )
    )]
    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestOutcome, AppError> {
        validate(&request)?;

        let content_hash = hash_content(request.content.as_bytes());
        let key = DedupKey::new(
            request.repo_full_name.as_str(),
            request.file_path.as_str(),
            content_hash,
        );

        let outcome = self.drive_pipeline(&request, key).await.map_err(|err| {
            debug!(
                repo_full_name = %request.repo_full_name,
                file_path = %request.file_path,
                error = %err,
                "ingestion pipeline failed"
            );
            err
        })?;

        info!(
            artifact_id = %outcome.id,
            status = outcome.status.message(),
            "ingestion finished"
        );

        Ok(outcome)
    }

    fn duration_millis(duration: Duration) -> u64 {
        u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
    }

    async fn drive_pipeline(
        &self,
        request: &IngestRequest,
        key: DedupKey,
    ) -> Result<IngestOutcome, AppError> {
        let mut ctx = PipelineContext::new(
            request,
            key,
            self.artifacts.as_ref(),
            self.vectors.as_ref(),
            &self.pipeline_config,
            self.services.as_ref(),
        );

        let machine = ready();
        let pipeline_started = Instant::now();

        let machine = match deduplicate(machine, &mut ctx)
            .await
            .map_err(|err| ctx.abort(err))?
        {
            Advance::Continue(machine) => machine,
            Advance::AlreadyProcessed(id) => return Ok(IngestOutcome::already_processed(id)),
        };

        let stage_start = Instant::now();
        let machine = annotate(machine, &mut ctx)
            .await
            .map_err(|err| ctx.abort(err))?;
        let annotate_duration = stage_start.elapsed();

        let stage_start = Instant::now();
        let machine = embed(machine, &mut ctx)
            .await
            .map_err(|err| ctx.abort(err))?;
        let embed_duration = stage_start.elapsed();

        let stage_start = Instant::now();
        let machine = match store_artifact(machine, &mut ctx)
            .await
            .map_err(|err| ctx.abort(err))?
        {
            Advance::Continue(machine) => machine,
            Advance::AlreadyProcessed(id) => return Ok(IngestOutcome::already_processed(id)),
        };
        let _machine = store_vector(machine, &mut ctx)
            .await
            .map_err(|err| ctx.abort(err))?;
        let persist_duration = stage_start.elapsed();

        info!(
            artifact_id = %ctx.artifact_id,
            total_ms = Self::duration_millis(pipeline_started.elapsed()),
            annotate_ms = Self::duration_millis(annotate_duration),
            embed_ms = Self::duration_millis(embed_duration),
            persist_ms = Self::duration_millis(persist_duration),
            "ingestion pipeline finished"
        );

        Ok(IngestOutcome::processed(ctx.artifact_id))
    }
}

fn validate(request: &IngestRequest) -> Result<(), AppError> {
    if request.repo_full_name.trim().is_empty() {
        return Err(AppError::Validation("repo_full_name must not be blank".into()));
    }
    if request.file_path.trim().is_empty() {
        return Err(AppError::Validation("file_path must not be blank".into()));
    }
    Ok(())
}
