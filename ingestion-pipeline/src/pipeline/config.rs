use std::time::Duration;

use common::utils::config::AppConfig;

#[derive(Debug, Clone)]
pub struct IngestionTuning {
    pub store_attempts: usize,
    pub store_initial_backoff_ms: u64,
    pub store_max_backoff_ms: u64,
    pub llm_retry_base_ms: u64,
    pub llm_retry_max_ms: u64,
}

impl Default for IngestionTuning {
    fn default() -> Self {
        Self {
            store_attempts: 3,
            store_initial_backoff_ms: 50,
            store_max_backoff_ms: 800,
            llm_retry_base_ms: 100,
            llm_retry_max_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestionConfig {
    pub tuning: IngestionTuning,
    pub processing_model: String,
    pub snippet_chars: usize,
    pub prompt_chars: usize,
    pub source_url_base: String,
    pub llm_timeout: Duration,
    pub embedding_timeout: Duration,
    /// Bound on each single store call, applied per attempt.
    pub store_timeout: Duration,
    pub llm_max_retries: usize,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self::from_app_config(&AppConfig::default())
    }
}

impl IngestionConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            tuning: IngestionTuning::default(),
            processing_model: config.processing_model.clone(),
            snippet_chars: config.snippet_chars,
            prompt_chars: config.prompt_chars,
            source_url_base: config.source_url_base.clone(),
            llm_timeout: Duration::from_secs(config.llm_timeout_secs),
            embedding_timeout: Duration::from_secs(config.embedding_timeout_secs),
            store_timeout: Duration::from_secs(config.store_timeout_secs),
            llm_max_retries: config.llm_max_retries,
        }
    }
}
