use async_openai::error::OpenAIError;
use thiserror::Error;
use tokio::task::JoinError;

// Core internal errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] surrealdb::Error),
    #[error("OpenAI error: {0}")]
    OpenAI(#[from] OpenAIError),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("LLM parsing error: {0}")]
    LLMParsing(String),
    #[error("Embedding error: {0}")]
    Embedding(String),
    #[error("Artifact write failed: {0}")]
    StorageWriteFailed(String),
    /// The artifact row exists but its vector entry could not be written, so the
    /// artifact is not reachable through similarity search until repaired.
    #[error("Vector write failed for artifact {artifact_id}: {reason}")]
    VectorWriteFailed { artifact_id: String, reason: String },
    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: &'static str, secs: u64 },
    #[error("Task join error: {0}")]
    Join(#[from] JoinError),
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
    #[error("Internal service error: {0}")]
    InternalError(String),
}
