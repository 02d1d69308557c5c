use std::time::Duration;

use common::utils::config::AppConfig;
use serde::{Deserialize, Serialize};

/// Tunable parameters for a single question-answering pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub context_char_limit: usize,
    pub query_model: String,
    pub llm_timeout: Duration,
    pub embedding_timeout: Duration,
    pub store_timeout: Duration,
}

impl RetrievalConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            top_k: config.retrieval_top_k,
            context_char_limit: config.context_char_limit,
            query_model: config.query_model.clone(),
            llm_timeout: Duration::from_secs(config.llm_timeout_secs),
            embedding_timeout: Duration::from_secs(config.embedding_timeout_secs),
            store_timeout: Duration::from_secs(config.store_timeout_secs),
        }
    }

    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    #[must_use]
    pub fn with_store_timeout(mut self, limit: Duration) -> Self {
        self.store_timeout = limit;
        self
    }

    #[must_use]
    pub fn with_context_char_limit(mut self, limit: usize) -> Self {
        self.context_char_limit = limit;
        self
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self::from_app_config(&AppConfig::default())
    }
}
