use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use dockbay_core::{EmbeddingModel, Error, FilterSource, FilterSpec, Result, SearchHit, VectorIndex};

pub const DEFAULT_LIMIT: i64 = 3;
pub const DEFAULT_MIN_SCORE: f32 = 0.75;

/// `[retrieval]` config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub collection_key: String,
    pub limit: i64,
    pub min_score: f32,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { collection_key: String::new(), limit: DEFAULT_LIMIT, min_score: DEFAULT_MIN_SCORE }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub query: String,
    pub collection_key: String,
    pub filter: FilterSpec,
    pub results: Vec<SearchHit>,
}

/// Embed a query, merge the configured filter sources and search one
/// collection. Never retries.
pub struct RetrievalPipeline {
    embedder: Arc<dyn EmbeddingModel>,
    index: Arc<dyn VectorIndex>,
    collection_key: String,
    limit: usize,
    min_score: f32,
    filter_sources: Vec<Arc<dyn FilterSource>>,
}

impl RetrievalPipeline {
    pub fn builder() -> RetrievalPipelineBuilder {
        RetrievalPipelineBuilder::default()
    }

    pub fn collection_key(&self) -> &str {
        &self.collection_key
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn min_score(&self) -> f32 {
        self.min_score
    }

    pub async fn search(&self, query: &str) -> Result<RetrievalResult> {
        self.search_with(query, None).await
    }

    /// Like `search`, with one extra filter merged after the configured sources.
    pub async fn search_with(&self, query: &str, extra: Option<FilterSpec>) -> Result<RetrievalResult> {
        if query.trim().is_empty() {
            return Err(Error::Validation("query must not be blank".to_string()));
        }
        let vector = self
            .embedder
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::Operation("embedding model returned no vector for the query".to_string()))?;

        let filter = FilterSpec::merge(self.filter_sources.iter().filter_map(|s| s.filter_spec()).chain(extra));
        debug!(collection = %self.collection_key, filter = ?filter, "retrieval filter");

        let active = (!filter.is_empty()).then_some(&filter);
        let results = self
            .index
            .search(&self.collection_key, &vector, self.limit, Some(self.min_score), active)
            .await?;
        info!(collection = %self.collection_key, hits = results.len(), "retrieval search");

        Ok(RetrievalResult {
            query: query.to_string(),
            collection_key: self.collection_key.clone(),
            filter,
            results,
        })
    }
}

#[derive(Default)]
pub struct RetrievalPipelineBuilder {
    embedder: Option<Arc<dyn EmbeddingModel>>,
    index: Option<Arc<dyn VectorIndex>>,
    collection_key: Option<String>,
    limit: Option<i64>,
    min_score: Option<f32>,
    filter_sources: Vec<Arc<dyn FilterSource>>,
}

impl RetrievalPipelineBuilder {
    pub fn embedder(mut self, embedder: Arc<dyn EmbeddingModel>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn collection_key(mut self, key: impl Into<String>) -> Self {
        self.collection_key = Some(key.into());
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn min_score(mut self, min_score: f32) -> Self {
        self.min_score = Some(min_score);
        self
    }

    pub fn filter_source(mut self, source: Arc<dyn FilterSource>) -> Self {
        self.filter_sources.push(source);
        self
    }

    pub fn settings(self, settings: &RetrievalSettings) -> Self {
        self.collection_key(settings.collection_key.clone())
            .limit(settings.limit)
            .min_score(settings.min_score)
    }

    pub fn build(self) -> Result<RetrievalPipeline> {
        let embedder = self
            .embedder
            .ok_or_else(|| Error::CapabilityUnavailable("retrieval needs an embedding model".to_string()))?;
        let index = self
            .index
            .ok_or_else(|| Error::CapabilityUnavailable("retrieval needs a vector index".to_string()))?;
        let collection_key = self.collection_key.unwrap_or_default().trim().to_string();
        if collection_key.is_empty() {
            return Err(Error::Validation("collection key must not be empty".to_string()));
        }
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT);
        if limit <= 0 {
            return Err(Error::Validation(format!("limit must be positive, got {limit}")));
        }
        let min_score = self.min_score.unwrap_or(DEFAULT_MIN_SCORE);
        if !(-1.0..=1.0).contains(&min_score) {
            return Err(Error::Validation(format!("min_score must be within [-1, 1], got {min_score}")));
        }
        Ok(RetrievalPipeline {
            embedder,
            index,
            collection_key,
            limit: limit as usize,
            min_score,
            filter_sources: self.filter_sources,
        })
    }
}
