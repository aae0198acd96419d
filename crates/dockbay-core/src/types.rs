//! Domain types shared by the chunker, vector stores, retrieval and routing.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

pub type ChunkId = String;
pub type PointId = String;

/// Scalar-valued metadata attached to chunks and stored as point payload.
pub type Metadata = BTreeMap<String, Value>;

/// Free-form options exposed by chat models.
pub type Options = serde_json::Map<String, Value>;

/// Payload keys owned by the index contract.
pub const PAYLOAD_TEXT: &str = "text";
pub const PAYLOAD_HASH: &str = "hash";
pub const PAYLOAD_CHUNK_INDEX: &str = "chunk_index";

/// A bounded-size unit of text produced by the chunker.
///
/// - `id`: `<base>:<index>`, stable for identical input
/// - `text`: inline metadata line (if any) followed by the chunk body
/// - `metadata`: caller metadata plus `chunk_index` / `chunk_count`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub text: String,
    pub metadata: Metadata,
}

/// The unit stored in a vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingChunk {
    pub collection_key: String,
    pub vector: Vec<f32>,
    pub text: String,
    pub hash: String,
    pub chunk_index: usize,
    pub metadata: Metadata,
}

impl EmbeddingChunk {
    /// Payload as persisted by every index: metadata first, reserved keys on top.
    pub fn payload(&self) -> Metadata {
        let mut payload = self.metadata.clone();
        payload.insert(PAYLOAD_TEXT.to_string(), Value::String(self.text.clone()));
        payload.insert(PAYLOAD_HASH.to_string(), Value::String(self.hash.clone()));
        payload.insert(PAYLOAD_CHUNK_INDEX.to_string(), Value::from(self.chunk_index));
        payload
    }
}

/// A scored hit returned by `VectorIndex::search`. Higher score is better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: PointId,
    pub score: f32,
    pub payload: Metadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Distance {
    #[default]
    Cosine,
    Dot,
    Euclid,
}

impl Distance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Distance::Cosine => "Cosine",
            Distance::Dot => "Dot",
            Distance::Euclid => "Euclid",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" => Some(Distance::Cosine),
            "dot" => Some(Distance::Dot),
            "euclid" | "euclidean" => Some(Distance::Euclid),
            _ => None,
        }
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub collection_key: String,
    pub name: String,
    pub vector_size: usize,
    pub distance: Distance,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into(), tool_call_id: None, tool_calls: Vec::new() }
    }

    pub fn system(content: impl Into<String>) -> Self { Self::new(Role::System, content) }
    pub fn user(content: impl Into<String>) -> Self { Self::new(Role::User, content) }
    pub fn assistant(content: impl Into<String>) -> Self { Self::new(Role::Assistant, content) }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self { role: Role::Tool, content: content.into(), tool_call_id: Some(tool_call_id.into()), tool_calls: Vec::new() }
    }

    pub fn with_tool_calls(mut self, calls: Vec<ToolCall>) -> Self {
        self.tool_calls = calls;
        self
    }
}

/// Tool definition advertised to a chat model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDef {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Value,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

impl ChatResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self { content: content.into(), tool_calls: Vec::new(), finish_reason: Some("stop".to_string()) }
    }
}

/// Out-of-band stream event (usage, finish reason, tool call deltas).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaEvent {
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}
