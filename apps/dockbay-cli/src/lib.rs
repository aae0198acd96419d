//! Library half of the `dockbay` binary: configuration wiring, file loading
//! and the chunk / ingest / search commands.

pub mod app;
pub mod files;

pub use app::{App, DataSettings, IngestSummary, StoreBackend, DEFAULT_COLLECTION};
pub use files::{collect_files, load_documents, DocumentBody, SourceDocument};
