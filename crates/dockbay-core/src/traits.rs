use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::filter::FilterSpec;
use crate::types::{
    ChatResponse, CollectionInfo, Distance, EmbeddingChunk, Message, MetaEvent, Options, PointId,
    SearchHit, ToolDef,
};

#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn send(&self, messages: &[Message], tools: &[ToolDef]) -> Result<ChatResponse>;

    /// Streams tokens through `on_token` in arrival order.
    async fn stream(
        &self,
        messages: &[Message],
        tools: &[ToolDef],
        on_token: &mut (dyn for<'t> FnMut(&'t str) + Send),
        on_meta: &mut (dyn FnMut(MetaEvent) + Send),
    ) -> Result<()>;

    fn options(&self) -> Options {
        Options::new()
    }

    fn set_options(&self, _options: Options) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    fn dim(&self) -> usize;
    /// One vector per input. An empty vector marks a per-text failure.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn upsert(&self, chunk: EmbeddingChunk) -> Result<PointId>;

    async fn exists_by_hash(&self, collection_key: &str, hash: &str) -> Result<bool> {
        let filter = FilterSpec::new().must(crate::types::PAYLOAD_HASH, hash);
        self.exists_by_filter(collection_key, &filter).await
    }

    async fn exists_by_filter(&self, collection_key: &str, filter: &FilterSpec) -> Result<bool>;

    async fn delete_by_filter(&self, collection_key: &str, filter: &FilterSpec) -> Result<usize>;

    async fn search(
        &self,
        collection_key: &str,
        vector: &[f32],
        limit: usize,
        min_score: Option<f32>,
        filter: Option<&FilterSpec>,
    ) -> Result<Vec<SearchHit>>;

    async fn create_collection(&self, collection_key: &str) -> Result<()>;
    async fn delete_collection(&self, collection_key: &str) -> Result<()>;
    async fn get_info(&self, collection_key: &str) -> Result<CollectionInfo>;
}

/// Authority for physical collection names, dimensionality and metric.
pub trait CollectionSchema: Send + Sync {
    fn physical_name(&self, collection_key: &str) -> String;
    fn vector_size(&self, collection_key: &str) -> usize;
    fn distance(&self, collection_key: &str) -> Distance {
        let _ = collection_key;
        Distance::Cosine
    }
}

pub trait FilterSource: Send + Sync {
    fn filter_spec(&self) -> Option<FilterSpec>;
}

/// A fixed filter is its own source.
impl FilterSource for FilterSpec {
    fn filter_spec(&self) -> Option<FilterSpec> {
        if self.is_empty() { None } else { Some(self.clone()) }
    }
}

/// Fire-and-forget observability sink. Implementations must not panic.
pub trait AgentLogger: Send + Sync {
    fn log(&self, scope: &str, message: &str);
}

/// Forwards collaborator log lines to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl AgentLogger for TracingLogger {
    fn log(&self, scope: &str, message: &str) {
        tracing::info!(target: "dockbay::agent", scope, "{message}");
    }
}

#[async_trait]
pub trait AgentTool: Send + Sync {
    fn definition(&self) -> ToolDef;
    async fn call(&self, arguments: Value) -> Result<Value>;
}
