//! dockbay-retrieval
//!
//! Query-time retrieval over a `VectorIndex` and the ingestion path that
//! fills it.

pub mod ingest;
pub mod pipeline;
pub mod tool;

pub use ingest::{content_hash, IngestReport, Ingestor, PAYLOAD_DOC_ID};
pub use pipeline::{RetrievalPipeline, RetrievalPipelineBuilder, RetrievalResult, RetrievalSettings};
pub use tool::RetrievalTool;
