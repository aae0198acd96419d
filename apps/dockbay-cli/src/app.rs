use std::path::Path;
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use dockbay_core::config::{resolve_with_base, Config};
use dockbay_core::{Chunk, CollectionSchema, EmbeddingModel, FilterSpec, VectorIndex};
use dockbay_embed::{get_default_embedder, EmbeddingSettings};
use dockbay_retrieval::{IngestReport, Ingestor, RetrievalPipeline, RetrievalResult, RetrievalSettings};
use dockbay_text::{ChunkerConfig, ChunkerSettings, TextChunker};
use dockbay_vector::{MemoryVectorStore, QdrantSettings, QdrantVectorStore, SchemaSettings, StaticSchema};

use crate::files::{collect_files, load_documents, DocumentBody};

pub const DEFAULT_COLLECTION: &str = "documents";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// In-process store; contents live only as long as the command.
    Memory,
    #[default]
    Qdrant,
}

/// `[data]` config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub input_dir: String,
    pub extensions: Vec<String>,
    pub store: StoreBackend,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            input_dir: "./data".to_string(),
            extensions: ["txt", "md", "json"].iter().map(|s| s.to_string()).collect(),
            store: StoreBackend::Qdrant,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestSummary {
    pub files: usize,
    pub skipped_files: usize,
    pub report: IngestReport,
}

/// Everything the subcommands need, wired once from configuration.
pub struct App {
    chunker: TextChunker,
    embedder: Arc<dyn EmbeddingModel>,
    index: Arc<dyn VectorIndex>,
    retrieval: RetrievalSettings,
    data: DataSettings,
}

impl App {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let chunker: ChunkerSettings = config.get_or_default("chunker")?;
        let embedding: EmbeddingSettings = config.get_or_default("embedding")?;
        let schema: SchemaSettings = config.get_or_default("schema")?;
        let data: DataSettings = config.get_or_default("data")?;
        let mut retrieval: RetrievalSettings = config.get_or_default("retrieval")?;
        if retrieval.collection_key.trim().is_empty() {
            retrieval.collection_key = DEFAULT_COLLECTION.to_string();
        }

        let embedder = get_default_embedder(&embedding)?;
        let schema = Arc::new(StaticSchema::from_settings(&schema)?);
        let size = schema.vector_size(&retrieval.collection_key);
        if size != embedder.dim() {
            anyhow::bail!(
                "collection '{}' expects {size}-dim vectors but the embedding model produces {}",
                retrieval.collection_key,
                embedder.dim()
            );
        }

        let index: Arc<dyn VectorIndex> = match data.store {
            StoreBackend::Memory => Arc::new(MemoryVectorStore::new(schema)),
            StoreBackend::Qdrant => {
                let qdrant: QdrantSettings = config.get_or_default("qdrant")?;
                info!(url = %qdrant.url, "using qdrant store");
                Arc::new(QdrantVectorStore::new(&qdrant, schema)?)
            }
        };

        Ok(Self { chunker: TextChunker::new(ChunkerConfig::from(chunker)), embedder, index, retrieval, data })
    }

    pub fn data(&self) -> &DataSettings {
        &self.data
    }

    pub fn retrieval(&self) -> &RetrievalSettings {
        &self.retrieval
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// `input_dir` from `[data]`, resolved against `base` when relative.
    pub fn default_input_dir(&self, base: &Path) -> std::path::PathBuf {
        resolve_with_base(base, &self.data.input_dir)
    }

    /// Chunks of one file, without touching the store.
    pub fn chunk_file(&self, path: &Path) -> anyhow::Result<Vec<Chunk>> {
        let base = path.parent().unwrap_or(Path::new(""));
        let mut chunks = Vec::new();
        for doc in load_documents(path, base)? {
            let produced = match &doc.body {
                DocumentBody::Text(text) => self.chunker.chunk_text(text, &doc.metadata),
                DocumentBody::Record { root, fields } => self.chunker.chunk(root, fields, &doc.metadata),
            };
            chunks.extend(produced);
        }
        Ok(chunks)
    }

    /// Ingest every matching file under `dir`. Unreadable or malformed files
    /// are skipped with a warning; store and model errors abort.
    pub async fn ingest_dir(&self, dir: &Path, replace: bool, show_progress: bool) -> anyhow::Result<IngestSummary> {
        let files = collect_files(dir, &self.data.extensions)?;
        let ingestor = Ingestor::new(
            self.chunker.clone(),
            self.embedder.clone(),
            self.index.clone(),
            self.retrieval.collection_key.clone(),
        )?
        .replace(replace);

        let pb = if show_progress { ProgressBar::new(files.len() as u64) } else { ProgressBar::hidden() };
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} files ({eta})")
        {
            pb.set_style(style.progress_chars("#>-"));
        }

        let mut summary = IngestSummary { files: files.len(), ..IngestSummary::default() };
        for path in &files {
            let docs = match load_documents(path, dir) {
                Ok(docs) => docs,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping file");
                    summary.skipped_files += 1;
                    pb.inc(1);
                    continue;
                }
            };
            for doc in docs {
                let report = match &doc.body {
                    DocumentBody::Text(text) => ingestor.ingest_text(text, &doc.metadata).await?,
                    DocumentBody::Record { root, fields } => ingestor.ingest_record(root, fields, &doc.metadata).await?,
                };
                summary.report.absorb(report);
            }
            pb.inc(1);
        }
        pb.finish_and_clear();

        info!(
            files = summary.files,
            skipped_files = summary.skipped_files,
            chunks = summary.report.chunks,
            upserted = summary.report.upserted,
            "ingest finished"
        );
        Ok(summary)
    }

    pub async fn search(
        &self,
        query: &str,
        limit: Option<i64>,
        min_score: Option<f32>,
        filter: Option<FilterSpec>,
    ) -> anyhow::Result<RetrievalResult> {
        let mut builder = RetrievalPipeline::builder()
            .embedder(self.embedder.clone())
            .index(self.index.clone())
            .settings(&self.retrieval);
        if let Some(limit) = limit {
            builder = builder.limit(limit);
        }
        if let Some(min_score) = min_score {
            builder = builder.min_score(min_score);
        }
        let pipeline = builder.build()?;
        Ok(pipeline.search_with(query, filter).await?)
    }
}
