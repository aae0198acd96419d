use std::fs;
use std::path::Path;

use serde_json::json;
use tempfile::TempDir;

use dockbay_cli::{collect_files, load_documents, App, DocumentBody, StoreBackend, DEFAULT_COLLECTION};
use dockbay_core::config::Config;
use dockbay_core::FilterSpec;

const MEMORY_CONFIG: &str = r#"
[data]
store = "memory"

[chunker]
max_length = 400
min_length = 100
overlap = 20

[retrieval]
collection_key = "notes"
"#;

fn memory_app() -> App {
    App::from_config(&Config::from_toml_str(MEMORY_CONFIG).unwrap()).unwrap()
}

fn write(dir: &Path, name: &str, content: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn corpus() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.txt", "lighthouse keeper wick\n\nlighthouse keeper wick lamp");
    write(dir.path(), "b.md", "# Bread\n\nsourdough starter needs feeding every morning");
    let long: Vec<String> = (0..30).map(|i| format!("Paragraph {i} about tides, harbours and boats.")).collect();
    write(dir.path(), "nested/c.txt", &long.join("\n\n"));
    write(
        dir.path(),
        "records.json",
        &json!([
            {"id": "r1", "name": "Kettle", "tags": ["kitchen"], "description": "copper kettle for the stove"},
            {"id": "r2", "fields": {"name": "Lantern", "notes": "oil lantern with spare wick"}}
        ])
        .to_string(),
    );
    write(dir.path(), "broken.json", "{ not json");
    write(dir.path(), "image.bin", "ignored");
    dir
}

#[test]
fn defaults_fill_missing_sections() {
    let app = App::from_config(&Config::from_toml_str("").unwrap()).unwrap();
    assert_eq!(app.retrieval().collection_key, DEFAULT_COLLECTION);
    assert_eq!(app.retrieval().limit, 3);
    assert_eq!(app.data().store, StoreBackend::Qdrant);
    assert_eq!(app.data().extensions, vec!["txt", "md", "json"]);
}

#[test]
fn embedding_and_schema_sizes_must_agree() {
    let config = Config::from_toml_str("[embedding]\ndim = 64\n\n[schema]\nvector_size = 128\n").unwrap();
    let err = App::from_config(&config).err().expect("size mismatch");
    assert!(err.to_string().contains("128"), "{err}");
}

#[test]
fn collect_files_filters_and_sorts() {
    let dir = corpus();
    let files = collect_files(dir.path(), &["txt".to_string(), ".MD".to_string()]).unwrap();
    let names: Vec<String> = files.iter().map(|p| dockbay_cli::files::relative_name(p, dir.path())).collect();
    assert_eq!(names, vec!["a.txt", "b.md", "nested/c.txt"]);
    assert!(collect_files(&dir.path().join("missing"), &["txt".to_string()]).is_err());
}

#[test]
fn json_files_load_as_records() {
    let dir = corpus();
    let docs = load_documents(&dir.path().join("records.json"), dir.path()).unwrap();
    assert_eq!(docs.len(), 2);
    for doc in &docs {
        assert_eq!(doc.metadata.get("source"), Some(&json!("records.json")));
    }
    match &docs[0].body {
        DocumentBody::Record { fields, .. } => assert!(!fields.contains_key("id")),
        other => panic!("expected record, got {other:?}"),
    }
    match &docs[1].body {
        DocumentBody::Record { fields, .. } => assert_eq!(fields.get("name"), Some(&json!("Lantern"))),
        other => panic!("expected record, got {other:?}"),
    }
    assert!(load_documents(&dir.path().join("broken.json"), dir.path()).is_err());
}

#[test]
fn chunk_file_uses_record_ids_and_path_ids() {
    let dir = corpus();
    let app = memory_app();

    let records = app.chunk_file(&dir.path().join("records.json")).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].id, "r1:0");
    assert!(records[0].text.starts_with("<!-- name: Kettle | tags: kitchen -->"), "{}", records[0].text);

    let long = app.chunk_file(&dir.path().join("nested/c.txt")).unwrap();
    assert!(long.len() > 1);
    assert!(long.iter().all(|c| c.id.starts_with("c.txt:")));
    assert!(long.iter().all(|c| c.text.chars().count() <= 400));
}

#[tokio::test]
async fn ingest_then_search_in_memory() {
    let dir = corpus();
    let app = memory_app();

    let summary = app.ingest_dir(dir.path(), false, false).await.unwrap();
    assert_eq!(summary.files, 5);
    assert_eq!(summary.skipped_files, 1, "broken.json is skipped");
    assert!(summary.report.chunks >= 5);
    assert_eq!(summary.report.upserted, summary.report.chunks);
    assert_eq!(summary.report.failed_embeddings, 0);

    let info = app.index().get_info("notes").await.unwrap();
    assert_eq!(info.count, summary.report.upserted);

    let result = app.search("lighthouse keeper wick", Some(1), Some(0.0), None).await.unwrap();
    assert_eq!(result.collection_key, "notes");
    assert_eq!(result.results.len(), 1);
    assert_eq!(result.results[0].payload.get("source"), Some(&json!("a.txt")));

    let filter = FilterSpec::new().must("source", "b.md");
    let result = app.search("lighthouse keeper wick", Some(10), Some(0.0), Some(filter)).await.unwrap();
    assert!(!result.results.is_empty());
    assert!(result.results.iter().all(|h| h.payload.get("source") == Some(&json!("b.md"))));
}

#[tokio::test]
async fn second_ingest_skips_known_chunks() {
    let dir = corpus();
    let app = memory_app();

    let first = app.ingest_dir(dir.path(), false, false).await.unwrap();
    let second = app.ingest_dir(dir.path(), false, false).await.unwrap();
    assert_eq!(second.report.upserted, 0);
    assert_eq!(second.report.skipped, first.report.chunks);

    let replaced = app.ingest_dir(dir.path(), true, false).await.unwrap();
    assert_eq!(replaced.report.upserted, first.report.chunks);
    let info = app.index().get_info("notes").await.unwrap();
    assert_eq!(info.count, first.report.chunks);
}

#[tokio::test]
async fn search_rejects_bad_overrides() {
    let app = memory_app();
    assert!(app.search("anything", Some(0), None, None).await.is_err());
    assert!(app.search("anything", None, Some(2.0), None).await.is_err());
    assert!(app.search("   ", None, None, None).await.is_err());
}
