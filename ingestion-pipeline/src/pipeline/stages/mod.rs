use std::future::Future;

use common::{
    error::AppError,
    storage::{
        store::{is_duplicate, is_retryable_conflict},
        types::code_artifact::CodeArtifact,
    },
    utils::deadline::bounded,
};
use state_machines::core::GuardError;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::{
    config::IngestionTuning,
    context::PipelineContext,
    state::{Annotated, ArtifactStored, Deduplicated, Embedded, IngestionMachine, Ready, VectorStored},
};
use crate::utils::truncate_chars;

/// Outcome of a stage that may end the run early because the artifact already exists.
pub enum Advance<M> {
    Continue(M),
    AlreadyProcessed(String),
}

#[instrument(
    level = "trace",
    skip_all,
    fields(repo_full_name = %ctx.key.repo_full_name, file_path = %ctx.key.file_path)
)]
pub async fn deduplicate(
    machine: IngestionMachine<(), Ready>,
    ctx: &mut PipelineContext<'_>,
) -> Result<Advance<IngestionMachine<(), Deduplicated>>, AppError> {
    let found = bounded(
        "artifact lookup",
        ctx.pipeline_config.store_timeout,
        ctx.artifacts.find_by_key(&ctx.key),
    )
    .await?;
    if let Some(existing) = found {
        info!(
            artifact_id = %existing.id,
            repo_full_name = %ctx.key.repo_full_name,
            file_path = %ctx.key.file_path,
            "artifact already processed"
        );
        return Ok(Advance::AlreadyProcessed(existing.id));
    }

    ctx.artifact_id = Uuid::new_v4().to_string();
    ctx.content_snippet =
        truncate_chars(&ctx.request.content, ctx.pipeline_config.snippet_chars).to_string();

    debug!(
        artifact_id = %ctx.artifact_id,
        content_chars = ctx.request.content.chars().count(),
        content_hash = %ctx.key.content_hash,
        "ingestion input ready"
    );

    machine
        .deduplicate()
        .map(Advance::Continue)
        .map_err(|(_, guard)| map_guard_error("deduplicate", &guard))
}

#[instrument(level = "trace", skip_all, fields(artifact_id = %ctx.artifact_id))]
pub async fn annotate(
    machine: IngestionMachine<(), Deduplicated>,
    ctx: &mut PipelineContext<'_>,
) -> Result<IngestionMachine<(), Annotated>, AppError> {
    let annotation = ctx
        .services
        .annotate(&ctx.request.file_path, &ctx.request.content)
        .await;

    debug!(
        artifact_id = %ctx.artifact_id,
        degraded = annotation.is_degraded(),
        tag_count = annotation.tags().len(),
        "ingestion annotation completed"
    );

    ctx.annotation = Some(annotation);

    machine
        .annotate()
        .map_err(|(_, guard)| map_guard_error("annotate", &guard))
}

#[instrument(level = "trace", skip_all, fields(artifact_id = %ctx.artifact_id))]
pub async fn embed(
    machine: IngestionMachine<(), Annotated>,
    ctx: &mut PipelineContext<'_>,
) -> Result<IngestionMachine<(), Embedded>, AppError> {
    let embedding = ctx.services.embed(&ctx.request.content).await?;

    debug!(
        artifact_id = %ctx.artifact_id,
        dimensions = embedding.len(),
        "ingestion embedding completed"
    );

    ctx.embedding = Some(embedding);

    machine
        .embed()
        .map_err(|(_, guard)| map_guard_error("embed", &guard))
}

#[instrument(level = "trace", skip_all, fields(artifact_id = %ctx.artifact_id))]
pub async fn store_artifact(
    machine: IngestionMachine<(), Embedded>,
    ctx: &mut PipelineContext<'_>,
) -> Result<Advance<IngestionMachine<(), ArtifactStored>>, AppError> {
    let annotation = ctx.annotation()?;
    let artifact = CodeArtifact::new(
        ctx.artifact_id.clone(),
        ctx.key.clone(),
        CodeArtifact::source_url_for(
            &ctx.pipeline_config.source_url_base,
            &ctx.key.repo_full_name,
            &ctx.key.file_path,
        ),
        ctx.content_snippet.clone(),
        annotation.summary().to_string(),
        annotation.tags(),
        annotation.use_case().to_string(),
    );

    let artifacts = ctx.artifacts;
    let store_timeout = ctx.pipeline_config.store_timeout;
    let written = with_conflict_retry(&ctx.pipeline_config.tuning, "artifact", move || {
        bounded("artifact write", store_timeout, artifacts.insert(artifact.clone()))
    })
    .await;

    if let Err(err) = written {
        // A concurrent ingestion of the same key may have won the unique index.
        let lookup = bounded(
            "artifact lookup",
            store_timeout,
            ctx.artifacts.find_by_key(&ctx.key),
        )
        .await;
        return match lookup {
            Ok(Some(winner)) => {
                info!(
                    artifact_id = %winner.id,
                    discarded_id = %ctx.artifact_id,
                    "concurrent ingestion stored this artifact first"
                );
                Ok(Advance::AlreadyProcessed(winner.id))
            }
            Ok(None) => Err(AppError::StorageWriteFailed(err.to_string())),
            Err(lookup_err) => {
                warn!(error = %lookup_err, "dedup lookup after failed write also failed");
                Err(AppError::StorageWriteFailed(err.to_string()))
            }
        };
    }

    debug!(artifact_id = %ctx.artifact_id, "artifact row stored");

    machine
        .store_artifact()
        .map(Advance::Continue)
        .map_err(|(_, guard)| map_guard_error("store_artifact", &guard))
}

#[instrument(level = "trace", skip_all, fields(artifact_id = %ctx.artifact_id))]
pub async fn store_vector(
    machine: IngestionMachine<(), ArtifactStored>,
    ctx: &mut PipelineContext<'_>,
) -> Result<IngestionMachine<(), VectorStored>, AppError> {
    let embedding = ctx.take_embedding()?;
    let vectors = ctx.vectors;
    let store_timeout = ctx.pipeline_config.store_timeout;
    let artifact_id = ctx.artifact_id.as_str();
    let repo_full_name = ctx.key.repo_full_name.as_str();

    let inserted = {
        let embedding = embedding.clone();
        with_conflict_retry(&ctx.pipeline_config.tuning, "vector", move || {
            bounded(
                "vector write",
                store_timeout,
                vectors.insert(artifact_id, repo_full_name, embedding.clone()),
            )
        })
        .await
    };

    match inserted {
        Ok(()) => debug!(artifact_id = %ctx.artifact_id, "vector entry stored"),
        Err(err) if is_duplicate(&err) => {
            // The reconciler wrote an entry from the snippet first; the full-content
            // vector takes its place.
            let replaced = bounded(
                "vector write",
                store_timeout,
                vectors.replace(artifact_id, repo_full_name, embedding),
            )
            .await;
            match replaced {
                Ok(()) => debug!(artifact_id = %ctx.artifact_id, "vector entry replaced"),
                Err(err) => warn!(
                    artifact_id = %ctx.artifact_id,
                    error = %err,
                    "kept existing vector entry; full-content vector not written"
                ),
            }
        }
        Err(err) => {
            return Err(AppError::VectorWriteFailed {
                artifact_id: ctx.artifact_id.clone(),
                reason: err.to_string(),
            })
        }
    }

    machine
        .store_vector()
        .map_err(|(_, guard)| map_guard_error("store_vector", &guard))
}

fn map_guard_error(event: &str, guard: &GuardError) -> AppError {
    AppError::InternalError(format!(
        "invalid ingestion pipeline transition during {event}: {guard:?}"
    ))
}

async fn with_conflict_retry<F, Fut>(
    tuning: &IngestionTuning,
    target: &str,
    mut write: F,
) -> Result<(), AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), AppError>>,
{
    let mut backoff_ms = tuning.store_initial_backoff_ms;
    let attempts = tuning.store_attempts.max(1);
    let last_attempt = attempts.saturating_sub(1);

    for attempt in 0..attempts {
        match write().await {
            Ok(()) => return Ok(()),
            Err(err) => {
                if is_retryable_conflict(&err) && attempt < last_attempt {
                    let next_attempt = attempt.saturating_add(1);
                    warn!(
                        attempt = next_attempt,
                        %target,
                        "Transient SurrealDB conflict while storing; retrying"
                    );
                    sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms = backoff_ms
                        .saturating_mul(2)
                        .min(tuning.store_max_backoff_ms);
                    continue;
                }

                return Err(err);
            }
        }
    }

    Err(AppError::InternalError(format!(
        "Failed to store {target} after retries"
    )))
}
