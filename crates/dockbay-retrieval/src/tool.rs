use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use dockbay_core::{AgentTool, Error, FilterSpec, Result, ToolDef};

use crate::pipeline::RetrievalPipeline;

pub const TOOL_NAME: &str = "retrieval_search";

/// Exposes a `RetrievalPipeline` to chat models as a callable tool.
pub struct RetrievalTool {
    pipeline: Arc<RetrievalPipeline>,
    description: String,
}

impl RetrievalTool {
    pub fn new(pipeline: Arc<RetrievalPipeline>) -> Self {
        let description = format!(
            "Search the '{}' knowledge base and return the most relevant passages.",
            pipeline.collection_key()
        );
        Self { pipeline, description }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

#[async_trait]
impl AgentTool for RetrievalTool {
    fn definition(&self) -> ToolDef {
        ToolDef {
            name: TOOL_NAME.to_string(),
            description: self.description.clone(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Natural language search query"},
                    "filter": {"type": "object", "description": "Optional payload filter (must/any/must_not or a flat map)"}
                },
                "required": ["query"]
            }),
        }
    }

    async fn call(&self, arguments: Value) -> Result<Value> {
        let query = arguments
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Validation("missing string argument 'query'".to_string()))?;
        let extra = match arguments.get("filter") {
            None | Some(Value::Null) => None,
            Some(raw) => Some(FilterSpec::from_value(raw)?),
        };
        let result = self.pipeline.search_with(query, extra).await?;
        Ok(serde_json::to_value(result)?)
    }
}
