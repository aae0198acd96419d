use std::sync::Arc;

use dockbay_core::{Distance, EmbeddingChunk, Error, FilterSpec, Metadata, VectorIndex};
use dockbay_vector::qdrant::build_filter;
use dockbay_vector::{QdrantSettings, QdrantVectorStore, StaticSchema};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn store_for(server: &MockServer, api_key: Option<&str>) -> QdrantVectorStore {
    let settings = QdrantSettings { url: format!("{}/", server.uri()), api_key: api_key.map(str::to_string), timeout_secs: 5 };
    let schema = StaticSchema::new(3).with_collection("docs", "kb_docs", 3);
    QdrantVectorStore::new(&settings, Arc::new(schema)).expect("store")
}

fn chunk() -> EmbeddingChunk {
    let mut metadata = Metadata::new();
    metadata.insert("status".to_string(), json!("a"));
    EmbeddingChunk {
        collection_key: "docs".to_string(),
        vector: vec![1.0, 0.0, 0.0],
        text: "hello".to_string(),
        hash: "h1".to_string(),
        chunk_index: 0,
        metadata,
    }
}

#[test]
fn filter_maps_groups_and_lists() {
    let spec = FilterSpec::new()
        .must("status", "a")
        .any("lang", json!(["en", "de"]))
        .must_not("hidden", true);
    let filter = build_filter(&spec).expect("filter");
    assert_eq!(
        filter,
        json!({
            "must": [{"key": "status", "match": {"value": "a"}}],
            "should": [{"key": "lang", "match": {"any": ["en", "de"]}}],
            "must_not": [{"key": "hidden", "match": {"value": true}}],
        })
    );
    assert!(build_filter(&FilterSpec::new()).is_none());
}

#[tokio::test]
async fn upsert_creates_missing_collection_then_writes_point() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections/kb_docs"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"status": {"error": "Not found"}})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/collections/kb_docs"))
        .and(body_partial_json(json!({"vectors": {"size": 3, "distance": "Cosine"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": true, "status": "ok"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/collections/kb_docs/points"))
        .and(query_param("wait", "true"))
        .and(header("api-key", "secret"))
        .and(body_partial_json(json!({"points": [{"payload": {"hash": "h1", "status": "a", "chunk_index": 0}}]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {"status": "completed"}, "status": "ok"})))
        .expect(2)
        .mount(&server)
        .await;

    let store = store_for(&server, Some("secret"));
    let first = store.upsert(chunk()).await.expect("upsert");
    let second = store.upsert(chunk()).await.expect("upsert");
    assert_ne!(first, second);
}

#[tokio::test]
async fn search_sends_threshold_and_decodes_hits() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/collections/kb_docs/points/search"))
        .and(body_partial_json(json!({
            "limit": 2,
            "with_payload": true,
            "score_threshold": 0.5,
            "filter": {"must": [{"key": "status", "match": {"value": "a"}}]},
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": [
                {"id": "7b0c", "score": 0.93, "payload": {"hash": "h1", "text": "hello"}},
                {"id": 12, "score": 0.61, "payload": {"hash": "h2"}},
            ],
            "status": "ok",
        })))
        .mount(&server)
        .await;

    let store = store_for(&server, None);
    let filter = FilterSpec::new().must("status", "a");
    let hits = store.search("docs", &[1.0, 0.0, 0.0], 2, Some(0.5), Some(&filter)).await.expect("search");
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].id, "7b0c");
    assert!((hits[0].score - 0.93).abs() < 1e-6);
    assert_eq!(hits[0].payload.get("hash"), Some(&json!("h1")));
    assert_eq!(hits[1].id, "12");
}

#[tokio::test]
async fn missing_collection_reads_as_empty() {
    let server = MockServer::start().await;
    Mock::given(wiremock::matchers::any())
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let store = store_for(&server, None);
    let filter = FilterSpec::new().must("status", "a");
    assert!(store.search("docs", &[1.0, 0.0, 0.0], 3, None, None).await.unwrap().is_empty());
    assert!(!store.exists_by_filter("docs", &filter).await.unwrap());
    assert_eq!(store.delete_by_filter("docs", &filter).await.unwrap(), 0);
    assert!(matches!(store.get_info("docs").await, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn exists_and_delete_use_scroll_and_count() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/collections/kb_docs/points/scroll"))
        .and(body_partial_json(json!({"limit": 1})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {"points": [{"id": "p1"}], "next_page_offset": null}})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/collections/kb_docs/points/count"))
        .and(body_partial_json(json!({"exact": true})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {"count": 4}})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/collections/kb_docs/points/delete"))
        .and(query_param("wait", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {"status": "completed"}})))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server, None);
    let filter = FilterSpec::new().must("hash", "h1");
    assert!(store.exists_by_filter("docs", &filter).await.unwrap());
    assert_eq!(store.delete_by_filter("docs", &filter).await.unwrap(), 4);
}

#[tokio::test]
async fn get_info_reads_collection_config() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections/kb_docs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {
                "status": "green",
                "points_count": 42,
                "config": {"params": {"vectors": {"size": 3, "distance": "Dot"}}},
            }
        })))
        .mount(&server)
        .await;

    let info = store_for(&server, None).get_info("docs").await.expect("info");
    assert_eq!(info.name, "kb_docs");
    assert_eq!(info.count, 42);
    assert_eq!(info.vector_size, 3);
    assert_eq!(info.distance, Distance::Dot);
}

#[tokio::test]
async fn server_errors_and_bad_bodies_are_classified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/collections/kb_docs/points/search"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/collections/kb_docs/points/scroll"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/collections/kb_docs/points/count"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad filter"))
        .mount(&server)
        .await;

    let store = store_for(&server, None);
    let filter = FilterSpec::new().must("status", "a");
    let err = store.search("docs", &[1.0, 0.0, 0.0], 3, None, None).await.unwrap_err();
    assert!(matches!(err, Error::StoreUnavailable(_)), "{err}");
    let err = store.exists_by_filter("docs", &filter).await.unwrap_err();
    assert!(matches!(err, Error::StoreProtocol(_)), "{err}");
    let err = store.delete_by_filter("docs", &filter).await.unwrap_err();
    assert!(matches!(err, Error::StoreProtocol(_)), "{err}");
}

#[tokio::test]
async fn unreachable_server_is_unavailable() {
    let settings = QdrantSettings { url: "http://127.0.0.1:9".to_string(), api_key: None, timeout_secs: 2 };
    let store = QdrantVectorStore::new(&settings, Arc::new(StaticSchema::new(3))).expect("store");
    let err = store.search("docs", &[1.0, 0.0, 0.0], 3, None, None).await.unwrap_err();
    assert!(matches!(err, Error::StoreUnavailable(_)), "{err}");
}

#[test]
fn dimension_is_checked_before_any_request() {
    let rt = tokio::runtime::Runtime::new().expect("runtime");
    let settings = QdrantSettings { url: "http://127.0.0.1:9".to_string(), ..QdrantSettings::default() };
    let store = QdrantVectorStore::new(&settings, Arc::new(StaticSchema::new(4))).expect("store");
    let err = rt.block_on(store.upsert(chunk())).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}
