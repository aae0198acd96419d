//! dockbay-vector
//!
//! `VectorIndex` implementations: an in-process store for tests and small
//! corpora, and a Qdrant adapter speaking the REST API.

pub mod memory;
pub mod qdrant;
pub mod schema;
pub mod similarity;

pub use memory::MemoryVectorStore;
pub use qdrant::{QdrantSettings, QdrantVectorStore};
pub use schema::{CollectionOverride, SchemaSettings, StaticSchema};
pub use similarity::cosine_similarity;
