use serde_json::{Map, Value};
use tracing::debug;

use dockbay_core::{Chunk, Metadata};

use crate::config::ChunkerConfig;
use crate::flatten::{base_id, char_len, flatten_record, inline_meta_line, normalize_newlines};
use crate::split::{apply_overlap, merge_small, pack_document};

/// Paragraph and line aware chunker.
///
/// Produces chunks of at most `max_length` chars (prefix line and overlap
/// tail included). Never fails; empty input gives no chunks.
#[derive(Debug, Clone, Default)]
pub struct TextChunker {
    config: ChunkerConfig,
}

impl TextChunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Chunk a structured record. `fields` holds the record's content fields,
    /// `root` the record itself (used for `name` and `id` lookups).
    pub fn chunk(&self, root: &Value, fields: &Map<String, Value>, metadata: &Metadata) -> Vec<Chunk> {
        let Some(document) = flatten_record(root, fields, self.config.min_length) else {
            return Vec::new();
        };
        let prefix = inline_meta_line(&self.config.inline_meta_fields, metadata, root, fields);
        let base = base_id(metadata, root, &document);
        self.segment(&document, prefix.as_deref(), &base, metadata)
    }

    /// Chunk plain text. Inline metadata is resolved from `metadata` only.
    pub fn chunk_text(&self, text: &str, metadata: &Metadata) -> Vec<Chunk> {
        let document = normalize_newlines(text);
        let document = document.trim();
        if document.is_empty() {
            return Vec::new();
        }
        let prefix = inline_meta_line(&self.config.inline_meta_fields, metadata, &Value::Null, &Map::new());
        let base = base_id(metadata, &Value::Null, document);
        self.segment(document, prefix.as_deref(), &base, metadata)
    }

    fn segment(&self, document: &str, prefix: Option<&str>, base: &str, metadata: &Metadata) -> Vec<Chunk> {
        let document = document.trim();
        if document.is_empty() {
            return Vec::new();
        }
        let max = self.config.max_length;
        let floor = (max / 4).max(1);
        let prefix_len = prefix.map_or(0, |p| char_len(p) + 1);
        let single_budget = max.saturating_sub(prefix_len).max(floor);

        let bodies = if char_len(document) <= single_budget {
            vec![document.to_string()]
        } else {
            let overlap = self.config.overlap;
            let reserve = if overlap > 0 { overlap + 1 } else { 0 };
            let budget = max.saturating_sub(prefix_len + reserve).max(floor);
            if max < prefix_len + reserve + floor {
                debug!(base, max, prefix_len, floor, "prefix leaves less than the floor; chunks may exceed max_length");
            }
            let packed = merge_small(pack_document(document, budget), self.config.min_length, budget);
            if overlap > 0 && packed.len() > 1 {
                apply_overlap(&packed, overlap)
            } else {
                packed
            }
        };

        let count = bodies.len();
        debug!(base, chunks = count, chars = char_len(document), "segmented document");
        bodies
            .into_iter()
            .enumerate()
            .map(|(index, body)| {
                let text = match prefix {
                    Some(p) => format!("{p}\n{body}"),
                    None => body,
                };
                let mut chunk_meta = metadata.clone();
                chunk_meta.insert("chunk_index".to_string(), Value::from(index));
                chunk_meta.insert("chunk_count".to_string(), Value::from(count));
                Chunk { id: format!("{base}:{index}"), text, metadata: chunk_meta }
            })
            .collect()
    }
}
