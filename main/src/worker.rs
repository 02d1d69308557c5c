use std::{sync::Arc, time::Duration};

use common::utils::config::get_config;
use ingestion_pipeline::{run_reconcile_loop, VectorReconciler};

mod startup;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    startup::init_tracing();

    let config = get_config()?;
    let db = startup::connect_db(&config).await?;
    let embedder = startup::embedding_provider(&config, startup::openai_client(&config)).await?;

    let reconciler = Arc::new(VectorReconciler::new(db, embedder, &config));

    run_reconcile_loop(
        reconciler,
        Duration::from_secs(config.reconcile_interval_secs),
        config.reconcile_batch_size,
    )
    .await
}
