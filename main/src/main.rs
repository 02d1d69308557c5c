use std::{sync::Arc, time::Duration};

use api_router::{api_routes_v1, api_state::ApiState};
use axum::{extract::FromRef, Router};
use common::utils::{config::get_config, embedding::EmbeddingProvider, llm::OpenAiTextGenerator};
use ingestion_pipeline::{run_reconcile_loop, VectorReconciler};
use tokio::task::LocalSet;
use tracing::{error, info};

mod startup;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    startup::init_tracing();

    let config = get_config()?;
    let db = startup::connect_db(&config).await?;

    let openai_client = startup::openai_client(&config);
    let embedding_provider =
        startup::embedding_provider(&config, Arc::clone(&openai_client)).await?;
    let generator = Arc::new(OpenAiTextGenerator::new(openai_client));

    let api_state = ApiState::new(
        &config,
        Arc::clone(&db),
        generator,
        Arc::<EmbeddingProvider>::clone(&embedding_provider),
    );
    let app = app_router(api_state);

    info!("Starting server listening on 0.0.0.0:{}", config.http_port);
    let serve_address = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(serve_address).await?;

    // Start the server in a separate OS thread with its own runtime
    let server_handle = std::thread::spawn(move || {
        let rt = match tokio::runtime::Runtime::new() {
            Ok(rt) => rt,
            Err(e) => {
                error!("Failed to build server runtime: {}", e);
                return;
            }
        };
        rt.block_on(async {
            if let Err(e) = axum::serve(listener, app).await {
                error!("Server error: {}", e);
            }
        });
    });

    // The reconcile worker runs on the main thread
    let local = LocalSet::new();
    let reconciler = Arc::new(VectorReconciler::new(db, embedding_provider, &config));
    let interval = Duration::from_secs(config.reconcile_interval_secs);
    let batch_size = config.reconcile_batch_size;

    local.spawn_local(async move {
        info!("Starting reconcile worker");
        if let Err(e) = run_reconcile_loop(reconciler, interval, batch_size).await {
            error!("Reconcile worker error: {}", e);
        }
    });

    local.await;

    if let Err(e) = server_handle.join() {
        error!("Server thread panicked: {:?}", e);
    }

    Ok(())
}

fn app_router(api_state: ApiState) -> Router {
    Router::new()
        .nest("/api/v1", api_routes_v1(&api_state))
        .with_state(AppState { api_state })
}

#[derive(Clone, FromRef)]
struct AppState {
    api_state: ApiState,
}
