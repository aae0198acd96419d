//! dockbay-embed
//!
//! Offline embedding models behind `dockbay_core::EmbeddingModel`: a
//! deterministic token-hash embedder and a content-hash keyed cache that can
//! wrap any model.

pub mod cache;
pub mod hash;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use dockbay_core::{EmbeddingModel, Error, Result};

pub use cache::{CacheStats, CachedEmbedder};
pub use hash::HashEmbedder;

pub const DEFAULT_DIM: usize = 256;

/// `[embedding]` config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: String,
    pub dim: usize,
    pub cache: bool,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { provider: "hash".to_string(), dim: DEFAULT_DIM, cache: true }
    }
}

/// Build the configured embedding model. Only the offline `hash` provider is
/// built in; remote providers are injected by the host.
pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn EmbeddingModel>> {
    if settings.dim == 0 {
        return Err(Error::InvalidConfig("embedding.dim must be positive".to_string()));
    }
    let model: Arc<dyn EmbeddingModel> = match settings.provider.trim().to_ascii_lowercase().as_str() {
        "hash" | "fake" => Arc::new(HashEmbedder::new(settings.dim)),
        other => {
            return Err(Error::CapabilityUnavailable(format!("embedding provider '{other}' is not built in")))
        }
    };
    info!(provider = %settings.provider, dim = settings.dim, cache = settings.cache, "embedding model ready");
    if settings.cache {
        Ok(Arc::new(CachedEmbedder::new(model)))
    } else {
        Ok(model)
    }
}
