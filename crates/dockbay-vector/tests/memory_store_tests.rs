use std::sync::Arc;

use dockbay_core::{EmbeddingChunk, Error, FilterSpec, Metadata, VectorIndex};
use dockbay_vector::{MemoryVectorStore, StaticSchema};
use serde_json::json;

fn store() -> MemoryVectorStore {
    MemoryVectorStore::new(Arc::new(StaticSchema::new(3).with_prefix("kb_")))
}

fn chunk(key: &str, vector: [f32; 3], hash: &str, status: &str) -> EmbeddingChunk {
    let mut metadata = Metadata::new();
    metadata.insert("status".to_string(), json!(status));
    metadata.insert("tags".to_string(), json!(["iron", status]));
    EmbeddingChunk {
        collection_key: key.to_string(),
        vector: vector.to_vec(),
        text: format!("text for {hash}"),
        hash: hash.to_string(),
        chunk_index: 0,
        metadata,
    }
}

#[tokio::test]
async fn upsert_auto_creates_and_assigns_unique_ids() {
    let store = store();
    let a = store.upsert(chunk("docs", [1.0, 0.0, 0.0], "h1", "a")).await.expect("upsert");
    let b = store.upsert(chunk("docs", [1.0, 0.0, 0.0], "h1", "a")).await.expect("upsert");
    assert_ne!(a, b, "no dedup by hash");
    let info = store.get_info("docs").await.expect("info");
    assert_eq!((info.name.as_str(), info.vector_size, info.count), ("kb_docs", 3, 2));
}

#[tokio::test]
async fn dimension_mismatch_is_a_validation_error() {
    let store = store();
    let mut bad = chunk("docs", [1.0, 0.0, 0.0], "h1", "a");
    bad.vector.push(1.0);
    assert!(matches!(store.upsert(bad).await, Err(Error::Validation(_))));
}

#[tokio::test]
async fn search_filters_thresholds_and_orders() {
    let store = store();
    store.upsert(chunk("docs", [0.0, 1.0, 0.0], "ortho", "a")).await.unwrap();
    store.upsert(chunk("docs", [1.0, 0.1, 0.0], "close", "a")).await.unwrap();
    store.upsert(chunk("docs", [1.0, 0.0, 0.0], "exact", "b")).await.unwrap();
    store.upsert(chunk("docs", [1.0, 0.0, 0.0], "exact-2", "a")).await.unwrap();

    let hits = store.search("docs", &[1.0, 0.0, 0.0], 10, Some(0.5), None).await.unwrap();
    let hashes: Vec<_> = hits.iter().map(|h| h.payload["hash"].as_str().unwrap_or_default()).collect();
    assert_eq!(hashes, vec!["exact", "exact-2", "close"], "ties keep insertion order");
    assert!((hits[0].score - 1.0).abs() < 1e-6);
    assert!(hits.iter().all(|h| (-1.0..=1.0).contains(&h.score)));

    let filter = FilterSpec::new().must("status", "a");
    let hits = store.search("docs", &[1.0, 0.0, 0.0], 1, None, Some(&filter)).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].payload["hash"], json!("exact-2"));

    let all = store.search("docs", &[1.0, 0.0, 0.0], 10, Some(-1.0), None).await.unwrap();
    let ortho = all.iter().find(|h| h.payload["hash"] == json!("ortho")).expect("ortho hit");
    assert_eq!(ortho.score, 0.0);
}

#[tokio::test]
async fn filter_exists_and_delete_agree() {
    let store = store();
    store.upsert(chunk("docs", [1.0, 0.0, 0.0], "h1", "a")).await.unwrap();
    store.upsert(chunk("docs", [0.0, 1.0, 0.0], "h2", "a")).await.unwrap();
    store.upsert(chunk("docs", [0.0, 0.0, 1.0], "h3", "b")).await.unwrap();

    let status_a = FilterSpec::new().must("status", "a");
    assert!(store.exists_by_filter("docs", &status_a).await.unwrap());
    assert!(store.exists_by_hash("docs", "h3").await.unwrap());
    assert!(!store.exists_by_hash("docs", "h9").await.unwrap());

    let by_tag = FilterSpec::new().must("tags", "b");
    assert!(store.exists_by_filter("docs", &by_tag).await.unwrap(), "list payload membership");

    assert_eq!(store.delete_by_filter("docs", &status_a).await.unwrap(), 2);
    assert!(!store.exists_by_filter("docs", &status_a).await.unwrap());
    let left = store.search("docs", &[1.0, 1.0, 1.0], 10, None, None).await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].payload["hash"], json!("h3"));
}

#[tokio::test]
async fn unknown_collection_reads_as_empty() {
    let store = store();
    let filter = FilterSpec::new().must("status", "a");
    assert!(store.search("nope", &[1.0, 0.0, 0.0], 3, None, None).await.unwrap().is_empty());
    assert!(!store.exists_by_filter("nope", &filter).await.unwrap());
    assert_eq!(store.delete_by_filter("nope", &filter).await.unwrap(), 0);
    assert!(matches!(store.get_info("nope").await, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn collection_lifecycle() {
    let store = store();
    store.create_collection("docs").await.unwrap();
    store.create_collection("docs").await.unwrap();
    assert_eq!(store.get_info("docs").await.unwrap().count, 0);
    store.upsert(chunk("docs", [1.0, 0.0, 0.0], "h1", "a")).await.unwrap();
    assert_eq!(store.len("docs"), 1);
    store.delete_collection("docs").await.unwrap();
    assert!(store.is_empty("docs"));
    assert!(store.get_info("docs").await.is_err());
}
