use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use dockbay_core::{EmbeddingModel, Error, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub entries: usize,
}

/// In-memory embedding cache keyed by the blake3 hash of the input text.
/// Failed (empty) embeddings are never cached.
pub struct CachedEmbedder {
    inner: Arc<dyn EmbeddingModel>,
    entries: Mutex<HashMap<String, Vec<f32>>>,
    hits: Mutex<(usize, usize)>,
}

impl CachedEmbedder {
    pub fn new(inner: Arc<dyn EmbeddingModel>) -> Self {
        Self { inner, entries: Mutex::new(HashMap::new()), hits: Mutex::new((0, 0)) }
    }

    pub fn stats(&self) -> CacheStats {
        let (hits, misses) = *self.hits.lock();
        CacheStats { hits, misses, entries: self.entries.lock().len() }
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

fn content_hash(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

#[async_trait]
impl EmbeddingModel for CachedEmbedder {
    fn dim(&self) -> usize {
        self.inner.dim()
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let hashes: Vec<String> = texts.iter().map(|t| content_hash(t)).collect();
        let mut out: Vec<Option<Vec<f32>>> = {
            let entries = self.entries.lock();
            hashes.iter().map(|h| entries.get(h).cloned()).collect()
        };

        let missing: Vec<usize> = out.iter().enumerate().filter(|(_, v)| v.is_none()).map(|(i, _)| i).collect();
        {
            let mut counters = self.hits.lock();
            counters.0 += texts.len() - missing.len();
            counters.1 += missing.len();
        }
        debug!(total = texts.len(), misses = missing.len(), "embedding cache lookup");

        if !missing.is_empty() {
            let batch: Vec<String> = missing.iter().map(|&i| texts[i].clone()).collect();
            let vectors = self.inner.embed(&batch).await?;
            if vectors.len() != batch.len() {
                return Err(Error::Operation(format!(
                    "embedding model returned {} vectors for {} inputs",
                    vectors.len(),
                    batch.len()
                )));
            }
            let mut entries = self.entries.lock();
            for (&i, vector) in missing.iter().zip(vectors) {
                if !vector.is_empty() {
                    entries.insert(hashes[i].clone(), vector.clone());
                }
                out[i] = Some(vector);
            }
        }

        Ok(out.into_iter().map(Option::unwrap_or_default).collect())
    }
}
