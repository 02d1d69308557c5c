#![allow(clippy::missing_docs_in_private_items, clippy::result_large_err)]

pub mod pipeline;
pub mod reconcile;
pub mod types;
pub mod utils;

pub use pipeline::{IngestionConfig, IngestionPipeline, IngestionTuning};
pub use reconcile::{ReconcileReport, VectorReconciler};
pub use types::{IngestOutcome, IngestRequest, IngestStatus};

use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Runs vector reconciliation forever, one pass every `interval`.
pub async fn run_reconcile_loop(
    reconciler: Arc<VectorReconciler>,
    interval: Duration,
    batch_size: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let worker_id = format!("reconcile-worker-{}", Uuid::new_v4());
    info!(%worker_id, interval_secs = interval.as_secs(), batch_size, "reconcile worker started");

    loop {
        match reconciler.reconcile_missing_vectors(batch_size).await {
            Ok(report) if report.failed > 0 => {
                warn!(
                    %worker_id,
                    repaired = report.repaired,
                    failed = report.failed,
                    "reconcile pass left artifacts without vectors"
                );
            }
            Ok(_) => {}
            Err(err) => {
                error!(%worker_id, error = %err, "reconcile pass failed");
            }
        }

        sleep(interval).await;
    }
}
