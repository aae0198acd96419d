use std::collections::HashSet;
use std::fs;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use tempfile::TempDir;

use dockbay_core::config::{expand_path, resolve_with_base, Config};
use dockbay_core::{ContextStore, EmbeddingChunk, Error, FailureKind, MemoryContext, Metadata};

#[derive(Debug, Deserialize, PartialEq)]
struct Section {
    limit: i64,
    #[serde(default)]
    name: String,
}

#[test]
fn config_extracts_typed_sections_from_toml() {
    let config = Config::from_toml_str(
        r#"
        [retrieval]
        limit = 7
        name = "kb"
        "#,
    )
    .expect("config");
    let section: Section = config.get("retrieval").expect("section");
    assert_eq!(section, Section { limit: 7, name: "kb".to_string() });
    assert!(config.get::<Section>("missing").is_err());
}

#[test]
fn config_missing_section_falls_back_to_default() {
    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Optional {
        #[serde(default)]
        flag: bool,
    }
    let config = Config::from_toml_str("[other]\nx = 1\n").expect("config");
    let value: Optional = config.get_or_default("absent").expect("default");
    assert_eq!(value, Optional::default());
}

#[test]
fn config_rejects_blank_collection_key() {
    let err = Config::from_toml_str("[retrieval]\ncollection_key = \"  \"\n");
    assert!(err.is_err(), "blank collection key is a configuration error");
}

#[test]
fn config_from_file_reads_toml() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("dockbay.toml");
    fs::write(&path, "[retrieval]\nlimit = 3\n").unwrap();
    let config = Config::from_file(&path).expect("config");
    let section: Section = config.get("retrieval").expect("section");
    assert_eq!(section.limit, 3);
    assert!(Config::from_file(&tmp.path().join("nope.toml")).is_err());
}

#[test]
fn paths_expand_env_and_resolve_relative() {
    std::env::set_var("DOCKBAY_TEST_DIR", "/var/data");
    assert_eq!(expand_path("${DOCKBAY_TEST_DIR}/txt"), std::path::PathBuf::from("/var/data/txt"));
    let base = std::path::Path::new("/srv");
    assert_eq!(resolve_with_base(base, "docs"), std::path::PathBuf::from("/srv/docs"));
    assert_eq!(resolve_with_base(base, "/abs"), std::path::PathBuf::from("/abs"));
}

#[test]
fn memory_context_fetch_add_is_atomic_across_threads() {
    let ctx = Arc::new(MemoryContext::new());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let ctx = Arc::clone(&ctx);
            std::thread::spawn(move || (0..50).map(|_| ctx.fetch_add("rr", 1)).collect::<Vec<_>>())
        })
        .collect();
    let mut seen = HashSet::new();
    for h in handles {
        for v in h.join().unwrap() {
            assert!(seen.insert(v), "position {v} observed twice");
        }
    }
    assert_eq!(seen.len(), 400);
    assert_eq!(ctx.get_var("rr"), Some(json!(400)));
}

#[test]
fn failure_kind_classifies_messages() {
    assert_eq!(FailureKind::from_message("HTTP 429 Too Many Requests"), FailureKind::RateLimit);
    assert_eq!(FailureKind::from_message("request timed out after 30s"), FailureKind::Timeout);
    assert_eq!(FailureKind::from_message("upstream returned 503"), FailureKind::ServerError);
    assert_eq!(FailureKind::from_message("invalid api key"), FailureKind::Generic);
    assert_eq!(Error::target("rate limit exceeded").failure_kind(), FailureKind::RateLimit);
    assert_eq!(
        Error::target_with_kind(FailureKind::Timeout, "whatever").failure_kind(),
        FailureKind::Timeout
    );
}

#[test]
fn embedding_chunk_payload_reserves_contract_keys() {
    let mut metadata = Metadata::new();
    metadata.insert("hash".to_string(), json!("spoofed"));
    metadata.insert("type".to_string(), json!("note"));
    let chunk = EmbeddingChunk {
        collection_key: "kb".to_string(),
        vector: vec![1.0, 0.0],
        text: "hello".to_string(),
        hash: "abc".to_string(),
        chunk_index: 2,
        metadata,
    };
    let payload = chunk.payload();
    assert_eq!(payload.get("hash"), Some(&json!("abc")));
    assert_eq!(payload.get("chunk_index"), Some(&json!(2)));
    assert_eq!(payload.get("text"), Some(&json!("hello")));
    assert_eq!(payload.get("type"), Some(&json!("note")));
}
