use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::utils::embedding::EmbeddingBackend;

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    #[serde(default)]
    pub openai_api_key: String,
    #[serde(default = "default_base_url")]
    pub openai_base_url: String,
    pub surrealdb_address: String,
    pub surrealdb_username: String,
    pub surrealdb_password: String,
    pub surrealdb_namespace: String,
    pub surrealdb_database: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default)]
    pub embedding_backend: EmbeddingBackend,
    #[serde(default)]
    pub embedding_model: Option<String>,
    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: u32,
    #[serde(default = "default_model")]
    pub processing_model: String,
    #[serde(default = "default_model")]
    pub query_model: String,
    #[serde(default = "default_llm_timeout_secs")]
    pub llm_timeout_secs: u64,
    #[serde(default = "default_embedding_timeout_secs")]
    pub embedding_timeout_secs: u64,
    #[serde(default = "default_store_timeout_secs")]
    pub store_timeout_secs: u64,
    #[serde(default = "default_llm_max_retries")]
    pub llm_max_retries: usize,
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,
    #[serde(default = "default_prompt_chars")]
    pub prompt_chars: usize,
    #[serde(default = "default_retrieval_top_k")]
    pub retrieval_top_k: usize,
    #[serde(default = "default_context_char_limit")]
    pub context_char_limit: usize,
    #[serde(default = "default_source_url_base")]
    pub source_url_base: String,
    #[serde(default = "default_reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,
    #[serde(default = "default_reconcile_grace_secs")]
    pub reconcile_grace_secs: u64,
    #[serde(default = "default_reconcile_batch_size")]
    pub reconcile_batch_size: usize,
    #[serde(default = "default_ingest_max_body_bytes")]
    pub ingest_max_body_bytes: usize,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_http_port() -> u16 {
    3000
}

fn default_embedding_dimensions() -> u32 {
    1536
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_llm_timeout_secs() -> u64 {
    60
}

fn default_embedding_timeout_secs() -> u64 {
    30
}

fn default_store_timeout_secs() -> u64 {
    10
}

fn default_llm_max_retries() -> usize {
    2
}

fn default_snippet_chars() -> usize {
    500
}

fn default_prompt_chars() -> usize {
    12_000
}

fn default_retrieval_top_k() -> usize {
    5
}

fn default_context_char_limit() -> usize {
    12_000
}

fn default_source_url_base() -> String {
    "https://github.com".to_string()
}

fn default_reconcile_interval_secs() -> u64 {
    300
}

// Must outlast the embedding timeout plus the store retry budget of one ingestion.
fn default_reconcile_grace_secs() -> u64 {
    120
}

fn default_reconcile_batch_size() -> usize {
    100
}

fn default_ingest_max_body_bytes() -> usize {
    5 * 1024 * 1024
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            openai_base_url: default_base_url(),
            surrealdb_address: "mem://".to_string(),
            surrealdb_username: "root".to_string(),
            surrealdb_password: "root".to_string(),
            surrealdb_namespace: "codelore".to_string(),
            surrealdb_database: "codelore".to_string(),
            http_port: default_http_port(),
            embedding_backend: EmbeddingBackend::default(),
            embedding_model: None,
            embedding_dimensions: default_embedding_dimensions(),
            processing_model: default_model(),
            query_model: default_model(),
            llm_timeout_secs: default_llm_timeout_secs(),
            embedding_timeout_secs: default_embedding_timeout_secs(),
            store_timeout_secs: default_store_timeout_secs(),
            llm_max_retries: default_llm_max_retries(),
            snippet_chars: default_snippet_chars(),
            prompt_chars: default_prompt_chars(),
            retrieval_top_k: default_retrieval_top_k(),
            context_char_limit: default_context_char_limit(),
            source_url_base: default_source_url_base(),
            reconcile_interval_secs: default_reconcile_interval_secs(),
            reconcile_grace_secs: default_reconcile_grace_secs(),
            reconcile_batch_size: default_reconcile_batch_size(),
            ingest_max_body_bytes: default_ingest_max_body_bytes(),
        }
    }
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    #[test]
    fn test_minimal_config_fills_defaults() {
        let raw = r#"
            surrealdb_address = "mem://"
            surrealdb_username = "root"
            surrealdb_password = "root"
            surrealdb_namespace = "ns"
            surrealdb_database = "db"
        "#;

        let config: AppConfig = Config::builder()
            .add_source(File::from_str(raw, FileFormat::Toml))
            .build()
            .expect("config should build")
            .try_deserialize()
            .expect("config should deserialize");

        assert_eq!(config.retrieval_top_k, 5);
        assert_eq!(config.snippet_chars, 500);
        assert_eq!(config.prompt_chars, 12_000);
        assert_eq!(config.embedding_backend, EmbeddingBackend::FastEmbed);
        assert_eq!(config.source_url_base, "https://github.com");
        assert_eq!(config.openai_base_url, "https://api.openai.com/v1");
        assert_eq!(config.store_timeout_secs, 10);
        assert_eq!(config.reconcile_grace_secs, 120);
    }

    #[test]
    fn test_embedding_backend_is_read_from_config() {
        let raw = r#"
            surrealdb_address = "mem://"
            surrealdb_username = "root"
            surrealdb_password = "root"
            surrealdb_namespace = "ns"
            surrealdb_database = "db"
            embedding_backend = "hashed"
            embedding_dimensions = 64
        "#;

        let config: AppConfig = Config::builder()
            .add_source(File::from_str(raw, FileFormat::Toml))
            .build()
            .expect("config should build")
            .try_deserialize()
            .expect("config should deserialize");

        assert_eq!(config.embedding_backend, EmbeddingBackend::Hashed);
        assert_eq!(config.embedding_dimensions, 64);
    }
}
