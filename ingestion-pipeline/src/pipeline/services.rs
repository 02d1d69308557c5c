use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use common::{
    error::AppError,
    utils::{
        deadline::bounded,
        embedding::EmbeddingEngine,
        llm::{GenerationRequest, ResponseSchema, TextGenerator},
    },
};
use tokio_retry::{
    strategy::{jitter, ExponentialBackoff},
    Retry,
};
use tracing::warn;

use super::{annotation::Annotation, config::IngestionConfig};
use crate::utils::{
    llm_instructions::{annotation_user_message, get_annotation_schema, ANNOTATION_SYSTEM_MESSAGE},
    truncate_chars,
};

/// External capabilities used by the ingestion stages.
#[async_trait]
pub trait PipelineServices: Send + Sync {
    /// Best effort: engine errors, timeouts and unparseable output all yield
    /// [`Annotation::Degraded`].
    async fn annotate(&self, file_path: &str, content: &str) -> Annotation;

    /// Fails with [`AppError::Embedding`] on engine error, timeout or an empty vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, AppError>;
}

pub struct DefaultPipelineServices {
    generator: Arc<dyn TextGenerator>,
    embedder: Arc<dyn EmbeddingEngine>,
    config: IngestionConfig,
}

impl DefaultPipelineServices {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        embedder: Arc<dyn EmbeddingEngine>,
        config: IngestionConfig,
    ) -> Self {
        Self {
            generator,
            embedder,
            config,
        }
    }

    fn annotation_request(&self, file_path: &str, content: &str) -> GenerationRequest {
        let prompt_body = truncate_chars(content, self.config.prompt_chars);

        GenerationRequest::new(
            self.config.processing_model.clone(),
            ANNOTATION_SYSTEM_MESSAGE,
            annotation_user_message(file_path, prompt_body),
        )
        .with_schema(ResponseSchema {
            name: "artifact_annotation".into(),
            description: "Summary, tags and use case of a source file".into(),
            schema: get_annotation_schema(),
        })
    }

    async fn generate_with_retry(&self, request: GenerationRequest) -> Result<String, AppError> {
        let tuning = &self.config.tuning;
        // Delays grow as 2^n * base / 2, capped.
        let strategy = ExponentialBackoff::from_millis(2)
            .factor(tuning.llm_retry_base_ms / 2)
            .max_delay(Duration::from_millis(tuning.llm_retry_max_ms))
            .map(jitter)
            .take(self.config.llm_max_retries);

        Retry::spawn(strategy, || {
            let request = request.clone();
            bounded(
                "summary generation",
                self.config.llm_timeout,
                self.generator.generate(request),
            )
        })
        .await
    }
}

#[async_trait]
impl PipelineServices for DefaultPipelineServices {
    async fn annotate(&self, file_path: &str, content: &str) -> Annotation {
        let request = self.annotation_request(file_path, content);

        match self.generate_with_retry(request).await {
            Ok(raw) => {
                let annotation = Annotation::parse(&raw);
                if let Annotation::Degraded { reason } = &annotation {
                    warn!(%file_path, %reason, "summary engine returned unusable output");
                }
                annotation
            }
            Err(err) => {
                warn!(%file_path, error = %err, "summary engine failed; degrading annotation");
                Annotation::degraded(err.to_string())
            }
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, AppError> {
        let vector = bounded(
            "embedding",
            self.config.embedding_timeout,
            self.embedder.embed(text),
        )
        .await
        .map_err(|err| match err {
            AppError::Embedding(message) => AppError::Embedding(message),
            other => AppError::Embedding(other.to_string()),
        })?;

        if vector.is_empty() {
            return Err(AppError::Embedding(
                "embedding engine returned an empty vector".into(),
            ));
        }

        Ok(vector)
    }
}
