//! Source file discovery and loading.
//!
//! `.json` files hold one record object or an array of them; every other
//! accepted extension is read as plain text.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde_json::{Map, Value};
use walkdir::WalkDir;

use dockbay_core::Metadata;

#[derive(Debug, Clone, PartialEq)]
pub enum DocumentBody {
    Text(String),
    Record { root: Value, fields: Map<String, Value> },
}

/// One chunkable unit read from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDocument {
    pub metadata: Metadata,
    pub body: DocumentBody,
}

/// Files under `dir` whose extension is in `extensions`, sorted by path.
pub fn collect_files(dir: &Path, extensions: &[String]) -> anyhow::Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        anyhow::bail!("{} is not a directory", dir.display());
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.with_context(|| format!("walking {}", dir.display()))?;
        if entry.file_type().is_file() && has_extension(entry.path(), extensions) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|want| want.trim_start_matches('.').eq_ignore_ascii_case(ext)))
}

/// Path of `path` relative to `base`, with `/` separators.
pub fn relative_name(path: &Path, base: &Path) -> String {
    let rel = path.strip_prefix(base).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

pub fn load_documents(path: &Path, base: &Path) -> anyhow::Result<Vec<SourceDocument>> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let source = relative_name(path, base);
    let is_json = path.extension().and_then(|e| e.to_str()).is_some_and(|e| e.eq_ignore_ascii_case("json"));

    if !is_json {
        let mut metadata = Metadata::new();
        metadata.insert("id".to_string(), Value::from(source.clone()));
        metadata.insert("source".to_string(), Value::from(source));
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            metadata.insert("name".to_string(), Value::from(stem));
        }
        return Ok(vec![SourceDocument { metadata, body: DocumentBody::Text(raw) }]);
    }

    let value: Value = serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    let records = match value {
        Value::Array(items) => items,
        other => vec![other],
    };
    records
        .into_iter()
        .enumerate()
        .map(|(i, root)| {
            let fields = record_fields(&root)
                .with_context(|| format!("{}: record {i} is not a JSON object", path.display()))?;
            let mut metadata = Metadata::new();
            metadata.insert("source".to_string(), Value::from(source.clone()));
            Ok(SourceDocument { metadata, body: DocumentBody::Record { root, fields } })
        })
        .collect()
}

/// A record's content fields: its `fields` object when present, otherwise
/// every key except `id`.
fn record_fields(root: &Value) -> Option<Map<String, Value>> {
    let object = root.as_object()?;
    if let Some(Value::Object(fields)) = object.get("fields") {
        return Some(fields.clone());
    }
    Some(object.iter().filter(|(k, _)| k.as_str() != "id").map(|(k, v)| (k.clone(), v.clone())).collect())
}
