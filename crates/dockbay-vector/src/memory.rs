use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;
use uuid::Uuid;

use dockbay_core::{
    CollectionInfo, CollectionSchema, EmbeddingChunk, Error, FilterSpec, Metadata, PointId, Result,
    SearchHit, VectorIndex,
};

use crate::similarity::cosine_similarity;

struct StoredPoint {
    id: PointId,
    vector: Vec<f32>,
    payload: Metadata,
}

struct Collection {
    name: String,
    vector_size: usize,
    points: Vec<StoredPoint>,
}

/// In-process `VectorIndex`. Points are kept in insertion order, which is
/// also the tie-break order for equal scores.
pub struct MemoryVectorStore {
    schema: Arc<dyn CollectionSchema>,
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryVectorStore {
    pub fn new(schema: Arc<dyn CollectionSchema>) -> Self {
        Self { schema, collections: RwLock::new(HashMap::new()) }
    }

    pub fn len(&self, collection_key: &str) -> usize {
        self.collections.read().get(collection_key).map_or(0, |c| c.points.len())
    }

    pub fn is_empty(&self, collection_key: &str) -> bool {
        self.len(collection_key) == 0
    }

    fn new_collection(&self, collection_key: &str) -> Collection {
        Collection {
            name: self.schema.physical_name(collection_key),
            vector_size: self.schema.vector_size(collection_key),
            points: Vec::new(),
        }
    }
}

#[async_trait]
impl VectorIndex for MemoryVectorStore {
    async fn upsert(&self, chunk: EmbeddingChunk) -> Result<PointId> {
        let mut collections = self.collections.write();
        let collection = collections
            .entry(chunk.collection_key.clone())
            .or_insert_with(|| self.new_collection(&chunk.collection_key));
        if chunk.vector.len() != collection.vector_size {
            return Err(Error::Validation(format!(
                "vector length {} does not match collection '{}' size {}",
                chunk.vector.len(),
                chunk.collection_key,
                collection.vector_size
            )));
        }
        let id = Uuid::new_v4().to_string();
        let payload = chunk.payload();
        collection.points.push(StoredPoint { id: id.clone(), vector: chunk.vector, payload });
        Ok(id)
    }

    async fn exists_by_filter(&self, collection_key: &str, filter: &FilterSpec) -> Result<bool> {
        let collections = self.collections.read();
        Ok(collections
            .get(collection_key)
            .is_some_and(|c| c.points.iter().any(|p| filter.matches(&p.payload))))
    }

    async fn delete_by_filter(&self, collection_key: &str, filter: &FilterSpec) -> Result<usize> {
        let mut collections = self.collections.write();
        let Some(collection) = collections.get_mut(collection_key) else {
            return Ok(0);
        };
        let before = collection.points.len();
        collection.points.retain(|p| !filter.matches(&p.payload));
        let removed = before - collection.points.len();
        debug!(collection = collection_key, removed, "deleted points by filter");
        Ok(removed)
    }

    async fn search(
        &self,
        collection_key: &str,
        vector: &[f32],
        limit: usize,
        min_score: Option<f32>,
        filter: Option<&FilterSpec>,
    ) -> Result<Vec<SearchHit>> {
        let collections = self.collections.read();
        let Some(collection) = collections.get(collection_key) else {
            return Ok(Vec::new());
        };
        let mut hits: Vec<SearchHit> = collection
            .points
            .iter()
            .filter(|p| filter.map_or(true, |f| f.matches(&p.payload)))
            .map(|p| SearchHit { id: p.id.clone(), score: cosine_similarity(vector, &p.vector), payload: p.payload.clone() })
            .filter(|h| min_score.map_or(true, |min| h.score >= min))
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn create_collection(&self, collection_key: &str) -> Result<()> {
        let mut collections = self.collections.write();
        if !collections.contains_key(collection_key) {
            let collection = self.new_collection(collection_key);
            collections.insert(collection_key.to_string(), collection);
        }
        Ok(())
    }

    async fn delete_collection(&self, collection_key: &str) -> Result<()> {
        self.collections.write().remove(collection_key);
        Ok(())
    }

    async fn get_info(&self, collection_key: &str) -> Result<CollectionInfo> {
        let collections = self.collections.read();
        let collection = collections
            .get(collection_key)
            .ok_or_else(|| Error::NotFound(format!("collection '{collection_key}'")))?;
        Ok(CollectionInfo {
            collection_key: collection_key.to_string(),
            name: collection.name.clone(),
            vector_size: collection.vector_size,
            distance: self.schema.distance(collection_key),
            count: collection.points.len(),
        })
    }
}
