pub mod check;
pub mod ingest;
pub mod probes;
pub mod rag_query;
