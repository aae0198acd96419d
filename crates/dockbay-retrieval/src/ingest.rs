use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use dockbay_core::types::{PAYLOAD_CHUNK_INDEX, PAYLOAD_HASH};
use dockbay_core::{Chunk, EmbeddingChunk, EmbeddingModel, Error, FilterSpec, Metadata, PointId, Result, VectorIndex};
use dockbay_text::TextChunker;

/// Outcome of one ingestion call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub chunks: usize,
    pub upserted: usize,
    pub skipped: usize,
    pub failed_embeddings: usize,
    /// Stored hash of every chunk, in chunk order. Chunks of one document
    /// share their source document's hash.
    pub hashes: Vec<String>,
    pub point_ids: Vec<PointId>,
}

impl IngestReport {
    pub fn absorb(&mut self, other: IngestReport) {
        self.chunks += other.chunks;
        self.upserted += other.upserted;
        self.skipped += other.skipped;
        self.failed_embeddings += other.failed_embeddings;
        self.hashes.extend(other.hashes);
        self.point_ids.extend(other.point_ids);
    }
}

/// blake3 of the whitespace-normalized text.
pub fn content_hash(text: &str) -> String {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    blake3::hash(normalized.as_bytes()).to_hex().to_string()
}

/// Payload key naming the document a point came from: the caller `id`, the
/// record `id`, or the document's content-derived chunk base.
pub const PAYLOAD_DOC_ID: &str = "doc_id";

/// Chunk id without its `:<index>` suffix.
fn document_id(chunk: &Chunk) -> &str {
    chunk.id.rsplit_once(':').map_or(chunk.id.as_str(), |(base, _)| base)
}

/// chunk → hash the source → skip known `(hash, chunk_index)` → embed → upsert.
pub struct Ingestor {
    chunker: TextChunker,
    embedder: Arc<dyn EmbeddingModel>,
    index: Arc<dyn VectorIndex>,
    collection_key: String,
    replace: bool,
}

impl Ingestor {
    pub fn new(
        chunker: TextChunker,
        embedder: Arc<dyn EmbeddingModel>,
        index: Arc<dyn VectorIndex>,
        collection_key: impl Into<String>,
    ) -> Result<Self> {
        let collection_key = collection_key.into().trim().to_string();
        if collection_key.is_empty() {
            return Err(Error::Validation("collection key must not be empty".to_string()));
        }
        Ok(Self { chunker, embedder, index, collection_key, replace: false })
    }

    /// Delete every prior point of the document (same `doc_id` or same
    /// source hash) before writing, instead of skipping known chunks.
    pub fn replace(mut self, replace: bool) -> Self {
        self.replace = replace;
        self
    }

    pub fn collection_key(&self) -> &str {
        &self.collection_key
    }

    pub async fn ingest_text(&self, text: &str, metadata: &Metadata) -> Result<IngestReport> {
        let chunks = self.chunker.chunk_text(text, metadata);
        self.ingest_document(content_hash(text), chunks).await
    }

    pub async fn ingest_record(&self, root: &Value, fields: &Map<String, Value>, metadata: &Metadata) -> Result<IngestReport> {
        let chunks = self.chunker.chunk(root, fields, metadata);
        let source = format!("{root}\n{}", Value::Object(fields.clone()));
        self.ingest_document(content_hash(&source), chunks).await
    }

    /// Chunks produced elsewhere; the source hash is taken over their texts.
    pub async fn ingest_chunks(&self, chunks: Vec<Chunk>) -> Result<IngestReport> {
        let joined = chunks.iter().map(|c| c.text.as_str()).collect::<Vec<_>>().join("\n");
        self.ingest_document(content_hash(&joined), chunks).await
    }

    async fn ingest_document(&self, source_hash: String, chunks: Vec<Chunk>) -> Result<IngestReport> {
        let mut report = IngestReport { chunks: chunks.len(), ..IngestReport::default() };
        if chunks.is_empty() {
            return Ok(report);
        }
        report.hashes = vec![source_hash.clone(); chunks.len()];

        if self.replace {
            // prior versions share the doc_id, unchanged content shares the hash
            let mut doc_ids: Vec<&str> = chunks.iter().map(document_id).collect();
            doc_ids.sort_unstable();
            doc_ids.dedup();
            let prior = FilterSpec::new()
                .any(PAYLOAD_HASH, source_hash.as_str())
                .any(PAYLOAD_DOC_ID, doc_ids);
            let removed = self.index.delete_by_filter(&self.collection_key, &prior).await?;
            if removed > 0 {
                debug!(collection = %self.collection_key, hash = %source_hash, removed, "replaced prior points");
            }
        }

        let mut pending: Vec<(usize, Chunk)> = Vec::new();
        for (index, chunk) in chunks.into_iter().enumerate() {
            if !self.replace {
                let known = FilterSpec::new()
                    .must(PAYLOAD_HASH, source_hash.as_str())
                    .must(PAYLOAD_CHUNK_INDEX, index);
                if self.index.exists_by_filter(&self.collection_key, &known).await? {
                    report.skipped += 1;
                    continue;
                }
            }
            pending.push((index, chunk));
        }
        if pending.is_empty() {
            info!(collection = %self.collection_key, skipped = report.skipped, "nothing new to ingest");
            return Ok(report);
        }

        let texts: Vec<String> = pending.iter().map(|(_, c)| c.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != texts.len() {
            return Err(Error::Operation(format!(
                "embedding model returned {} vectors for {} chunks",
                vectors.len(),
                texts.len()
            )));
        }

        for ((index, chunk), vector) in pending.into_iter().zip(vectors) {
            if vector.is_empty() {
                warn!(collection = %self.collection_key, chunk = %chunk.id, "embedding failed; chunk skipped");
                report.failed_embeddings += 1;
                continue;
            }
            let doc_id = Value::from(document_id(&chunk));
            let mut metadata = chunk.metadata;
            metadata.insert(PAYLOAD_DOC_ID.to_string(), doc_id);
            metadata.insert("chunk_id".to_string(), Value::String(chunk.id));
            let id = self
                .index
                .upsert(EmbeddingChunk {
                    collection_key: self.collection_key.clone(),
                    vector,
                    text: chunk.text,
                    hash: source_hash.clone(),
                    chunk_index: index,
                    metadata,
                })
                .await?;
            report.point_ids.push(id);
            report.upserted += 1;
        }

        info!(
            collection = %self.collection_key,
            chunks = report.chunks,
            upserted = report.upserted,
            skipped = report.skipped,
            failed = report.failed_embeddings,
            "ingested"
        );
        Ok(report)
    }
}
