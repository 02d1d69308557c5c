mod config;

pub use config::RetrievalConfig;

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        store::{ArtifactStore, VectorStore},
        types::artifact_embedding::VectorMatch,
    },
    utils::{
        config::AppConfig,
        deadline::bounded,
        embedding::EmbeddingEngine,
        llm::{GenerationRequest, TextGenerator},
    },
};
use tracing::{debug, info, instrument};

use crate::{
    answer_retrieval::{assemble_context, create_user_message, ANSWER_SYSTEM_MESSAGE},
    ArtifactSource, RagAnswer, RetrievedArtifact,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Embed,
    Search,
    Resolve,
    Generate,
}

#[derive(Debug, Default, Clone)]
pub struct RetrievalStageTimings {
    timings: Vec<(StageKind, Duration)>,
}

impl RetrievalStageTimings {
    pub fn record(&mut self, kind: StageKind, duration: Duration) {
        self.timings.push((kind, duration));
    }

    pub fn stage_ms(&self, kind: StageKind) -> u128 {
        self.timings
            .iter()
            .find(|(k, _)| *k == kind)
            .map_or(0, |(_, d)| d.as_millis())
    }
}

#[allow(clippy::module_name_repetitions)]
pub struct RetrievalPipeline {
    artifacts: Arc<dyn ArtifactStore>,
    vectors: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingEngine>,
    generator: Arc<dyn TextGenerator>,
    config: RetrievalConfig,
}

impl RetrievalPipeline {
    pub fn new(
        db: Arc<SurrealDbClient>,
        generator: Arc<dyn TextGenerator>,
        embedder: Arc<dyn EmbeddingEngine>,
        config: &AppConfig,
    ) -> Self {
        let artifacts: Arc<dyn ArtifactStore> = Arc::clone(&db) as Arc<dyn ArtifactStore>;
        let vectors: Arc<dyn VectorStore> = db;
        Self::with_stores(
            artifacts,
            vectors,
            embedder,
            generator,
            RetrievalConfig::from_app_config(config),
        )
    }

    pub fn with_stores(
        artifacts: Arc<dyn ArtifactStore>,
        vectors: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingEngine>,
        generator: Arc<dyn TextGenerator>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            artifacts,
            vectors,
            embedder,
            generator,
            config,
        }
    }

    /// Answers `query` from the most similar stored artifacts.
    ///
    /// An empty store, or matches that no longer resolve to artifacts, produce the
    /// fixed no-context answer instead of an error.
    #[instrument(skip_all, fields(query_chars = query.chars().count()))]
    pub async fn answer(&self, query: &str) -> Result<RagAnswer, AppError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::Validation("query must not be blank".into()));
        }

        let mut timings = RetrievalStageTimings::default();

        let stage_start = Instant::now();
        let vector = bounded(
            "query embedding",
            self.config.embedding_timeout,
            self.embedder.embed(query),
        )
        .await?;
        timings.record(StageKind::Embed, stage_start.elapsed());

        let stage_start = Instant::now();
        let matches = bounded(
            "vector query",
            self.config.store_timeout,
            self.vectors.query(&vector, self.config.top_k),
        )
        .await?;
        timings.record(StageKind::Search, stage_start.elapsed());

        if matches.is_empty() {
            debug!("no vector matches for query");
            return Ok(RagAnswer::no_context());
        }

        let stage_start = Instant::now();
        let retrieved = self.resolve(matches).await?;
        timings.record(StageKind::Resolve, stage_start.elapsed());

        if retrieved.is_empty() {
            debug!("every vector match dangles; answering without context");
            return Ok(RagAnswer::no_context());
        }

        let (context, included) = assemble_context(&retrieved, self.config.context_char_limit);
        if included < retrieved.len() {
            debug!(
                included,
                resolved = retrieved.len(),
                limit = self.config.context_char_limit,
                "context limit reached; omitting lower-ranked artifacts"
            );
        }

        let stage_start = Instant::now();
        let request = GenerationRequest::new(
            self.config.query_model.as_str(),
            ANSWER_SYSTEM_MESSAGE,
            create_user_message(&context, query),
        );
        let answer = bounded(
            "answer generation",
            self.config.llm_timeout,
            self.generator.generate(request),
        )
        .await?;
        timings.record(StageKind::Generate, stage_start.elapsed());

        let sources: Vec<ArtifactSource> = retrieved
            .iter()
            .take(included)
            .map(ArtifactSource::from)
            .collect();

        info!(
            sources = sources.len(),
            embed_ms = timings.stage_ms(StageKind::Embed),
            search_ms = timings.stage_ms(StageKind::Search),
            resolve_ms = timings.stage_ms(StageKind::Resolve),
            generate_ms = timings.stage_ms(StageKind::Generate),
            "retrieval pipeline finished"
        );

        Ok(RagAnswer {
            answer: answer.trim().to_string(),
            sources,
        })
    }

    // Keeps similarity order; ids without an artifact row are dropped.
    async fn resolve(
        &self,
        matches: Vec<VectorMatch>,
    ) -> Result<Vec<RetrievedArtifact>, AppError> {
        let ids: Vec<String> = matches.iter().map(|m| m.id.clone()).collect();
        let mut artifacts = bounded(
            "artifact fetch",
            self.config.store_timeout,
            self.artifacts.get_many(&ids),
        )
        .await?;

        let mut retrieved = Vec::with_capacity(matches.len());
        for matched in matches {
            if let Some(pos) = artifacts.iter().position(|a| a.id == matched.id) {
                retrieved.push(RetrievedArtifact {
                    artifact: artifacts.swap_remove(pos),
                    score: matched.score,
                });
            }
        }

        Ok(retrieved)
    }
}
