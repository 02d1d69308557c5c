use std::sync::Arc;

use async_openai::{config::OpenAIConfig, Client};
use common::{
    storage::db::SurrealDbClient,
    utils::{config::AppConfig, embedding::EmbeddingProvider},
};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();
}

/// Connects and applies the schema, so callers always see the unique dedup index.
pub async fn connect_db(
    config: &AppConfig,
) -> Result<Arc<SurrealDbClient>, Box<dyn std::error::Error>> {
    let db = SurrealDbClient::new(
        &config.surrealdb_address,
        &config.surrealdb_username,
        &config.surrealdb_password,
        &config.surrealdb_namespace,
        &config.surrealdb_database,
    )
    .await?;

    db.apply_migrations().await?;

    Ok(Arc::new(db))
}

pub fn openai_client(config: &AppConfig) -> Arc<Client<OpenAIConfig>> {
    Arc::new(Client::with_config(
        OpenAIConfig::new()
            .with_api_key(&config.openai_api_key)
            .with_api_base(&config.openai_base_url),
    ))
}

pub async fn embedding_provider(
    config: &AppConfig,
    client: Arc<Client<OpenAIConfig>>,
) -> Result<Arc<EmbeddingProvider>, Box<dyn std::error::Error>> {
    let provider = EmbeddingProvider::from_config(config, Some(client)).await?;
    info!(
        embedding_backend = provider.backend_label(),
        embedding_dimension = provider.dimension(),
        "Embedding provider initialized"
    );
    Ok(Arc::new(provider))
}
