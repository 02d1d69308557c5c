use std::sync::Arc;

use common::{
    storage::db::SurrealDbClient,
    utils::{config::AppConfig, embedding::EmbeddingEngine, llm::TextGenerator},
};
use ingestion_pipeline::IngestionPipeline;
use retrieval_pipeline::RetrievalPipeline;

#[derive(Clone)]
pub struct ApiState {
    pub db: Arc<SurrealDbClient>,
    pub config: AppConfig,
    pub ingestion: Arc<IngestionPipeline>,
    pub retrieval: Arc<RetrievalPipeline>,
}

impl ApiState {
    pub fn new(
        config: &AppConfig,
        db: Arc<SurrealDbClient>,
        generator: Arc<dyn TextGenerator>,
        embedder: Arc<dyn EmbeddingEngine>,
    ) -> Self {
        let ingestion = IngestionPipeline::new(
            Arc::clone(&db),
            Arc::clone(&generator),
            Arc::clone(&embedder),
            config,
        );
        let retrieval = RetrievalPipeline::new(Arc::clone(&db), generator, embedder, config);

        Self::with_pipelines(config, db, Arc::new(ingestion), Arc::new(retrieval))
    }

    pub fn with_pipelines(
        config: &AppConfig,
        db: Arc<SurrealDbClient>,
        ingestion: Arc<IngestionPipeline>,
        retrieval: Arc<RetrievalPipeline>,
    ) -> Self {
        Self {
            db,
            config: config.clone(),
            ingestion,
            retrieval,
        }
    }
}
