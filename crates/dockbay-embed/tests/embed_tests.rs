use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dockbay_core::{EmbeddingModel, Error, Result};
use dockbay_embed::{get_default_embedder, CachedEmbedder, EmbeddingSettings, HashEmbedder};

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[tokio::test]
async fn hash_embedder_shapes_and_determinism() {
    let embedder = get_default_embedder(&EmbeddingSettings { cache: false, ..EmbeddingSettings::default() })
        .expect("embedder");
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed(&texts).await.expect("embed");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), 256, "embedding dim is 256");
    assert_eq!(embedder.dim(), 256);

    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");
    for (a, b) in v1.iter().zip(v2.iter()) {
        assert!((a - b).abs() <= 1e-6);
    }
}

#[tokio::test]
async fn shared_tokens_score_closer() {
    let embedder = HashEmbedder::new(512);
    let a = embedder.embed_one("season the cast iron pan");
    let b = embedder.embed_one("cast iron pan care");
    let c = embedder.embed_one("weather forecast tomorrow");
    assert!(cosine(&a, &b) > cosine(&a, &c));
    assert!(embedder.embed_one("   ").is_empty(), "blank text marks a failure");
}

#[test]
fn unknown_provider_is_unavailable() {
    let settings = EmbeddingSettings { provider: "openai".to_string(), ..EmbeddingSettings::default() };
    assert!(matches!(get_default_embedder(&settings), Err(Error::CapabilityUnavailable(_))));
    let settings = EmbeddingSettings { dim: 0, ..EmbeddingSettings::default() };
    assert!(matches!(get_default_embedder(&settings), Err(Error::InvalidConfig(_))));
}

struct Counting {
    calls: AtomicUsize,
    texts: AtomicUsize,
}

#[async_trait]
impl EmbeddingModel for Counting {
    fn dim(&self) -> usize {
        2
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts.iter().map(|t| if t == "bad" { Vec::new() } else { vec![t.len() as f32, 1.0] }).collect())
    }
}

#[tokio::test]
async fn cache_embeds_only_misses_and_skips_failures() {
    let inner = Arc::new(Counting { calls: AtomicUsize::new(0), texts: AtomicUsize::new(0) });
    let cached = CachedEmbedder::new(inner.clone());

    let first = cached.embed(&["aa".to_string(), "bad".to_string()]).await.expect("embed");
    assert_eq!(first, vec![vec![2.0, 1.0], Vec::new()]);

    let second = cached.embed(&["aa".to_string(), "bad".to_string(), "ccc".to_string()]).await.expect("embed");
    assert_eq!(second, vec![vec![2.0, 1.0], Vec::new(), vec![3.0, 1.0]]);

    assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    assert_eq!(inner.texts.load(Ordering::SeqCst), 4, "only misses reach the model");
    let stats = cached.stats();
    assert_eq!((stats.hits, stats.misses, stats.entries), (1, 4, 2));

    cached.clear();
    assert_eq!(cached.stats().entries, 0);
}
