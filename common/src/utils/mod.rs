pub mod config;
pub mod content_hash;
pub mod deadline;
pub mod embedding;
pub mod llm;
