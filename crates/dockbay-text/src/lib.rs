//! dockbay-text
//!
//! Record flattening and segmentation into bounded-size chunks. See
//! `TextChunker` for the entry points.

pub mod chunker;
pub mod config;
mod flatten;
mod split;

pub use chunker::TextChunker;
pub use config::{ChunkerConfig, ChunkerSettings};
