#![deny(unused_variables)]
#![deny(unused_imports)]

//! dockbay-core
//!
//! Shared domain types, the error taxonomy and the capability traits that the
//! chunker, vector stores, retrieval pipeline and chat router are wired through.

pub mod config;
pub mod context;
pub mod error;
pub mod filter;
pub mod traits;
pub mod types;

pub use context::{ContextStore, MemoryContext};
pub use error::{Error, FailureKind, Result};
pub use filter::FilterSpec;
pub use traits::{
    AgentLogger, AgentTool, ChatModel, CollectionSchema, EmbeddingModel, FilterSource,
    TracingLogger, VectorIndex,
};
pub use types::{
    ChatResponse, Chunk, ChunkId, CollectionInfo, Distance, EmbeddingChunk, Message, Metadata,
    MetaEvent, Options, PointId, Role, SearchHit, ToolCall, ToolDef,
};
