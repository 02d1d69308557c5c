#![allow(clippy::missing_docs_in_private_items, clippy::result_large_err)]

pub mod answer_retrieval;
pub mod pipeline;

use common::storage::types::code_artifact::CodeArtifact;
use serde::Serialize;

pub use answer_retrieval::NO_CONTEXT_ANSWER;
pub use pipeline::{RetrievalConfig, RetrievalPipeline, RetrievalStageTimings, StageKind};

// An artifact resolved from a vector match, carrying the match score.
#[derive(Debug, Clone)]
pub struct RetrievedArtifact {
    pub artifact: CodeArtifact,
    pub score: f32,
}

/// Source reference returned alongside an answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactSource {
    pub id: String,
    pub repo_full_name: String,
    pub file_path: String,
    pub source_url: String,
    pub summary: String,
    pub use_case: String,
    pub tags: Vec<String>,
    pub snippet: String,
    pub score: f32,
}

impl From<&RetrievedArtifact> for ArtifactSource {
    fn from(retrieved: &RetrievedArtifact) -> Self {
        let artifact = &retrieved.artifact;
        Self {
            id: artifact.id.clone(),
            repo_full_name: artifact.repo_full_name.clone(),
            file_path: artifact.file_path.clone(),
            source_url: artifact.source_url.clone(),
            summary: artifact.ai_summary.clone(),
            use_case: artifact.ai_use_case.clone(),
            tags: artifact.ai_tags.clone(),
            snippet: artifact.content_snippet.clone(),
            score: retrieved.score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RagAnswer {
    pub answer: String,
    pub sources: Vec<ArtifactSource>,
}

impl RagAnswer {
    pub fn no_context() -> Self {
        Self {
            answer: NO_CONTEXT_ANSWER.to_string(),
            sources: Vec::new(),
        }
    }
}
