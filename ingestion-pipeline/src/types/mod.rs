use serde::{Deserialize, Serialize};

/// One file submitted for ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestRequest {
    pub repo_full_name: String,
    pub file_path: String,
    pub content: String,
}

impl IngestRequest {
    pub fn new(
        repo_full_name: impl Into<String>,
        file_path: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            repo_full_name: repo_full_name.into(),
            file_path: file_path.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IngestStatus {
    Processed,
    AlreadyProcessed,
}

impl IngestStatus {
    pub fn message(self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::AlreadyProcessed => "already processed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestOutcome {
    pub id: String,
    pub status: IngestStatus,
}

impl IngestOutcome {
    pub fn processed(id: String) -> Self {
        Self {
            id,
            status: IngestStatus::Processed,
        }
    }

    pub fn already_processed(id: String) -> Self {
        Self {
            id,
            status: IngestStatus::AlreadyProcessed,
        }
    }
}
