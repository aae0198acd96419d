use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use dockbay_cli::App;
use dockbay_core::config::Config;
use dockbay_core::FilterSpec;

#[derive(Parser)]
#[command(name = "dockbay")]
#[command(about = "Chunk, ingest and search documents in a vector collection", long_about = None)]
struct Cli {
    /// Config file; defaults to config.toml plus config.<RUST_ENV>.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the chunks produced for one file
    Chunk {
        path: PathBuf,
    },

    /// Chunk, embed and upsert every matching file under a directory
    Ingest {
        /// Defaults to data.input_dir
        dir: Option<PathBuf>,

        /// Replace points with the same content hash instead of skipping them
        #[arg(long)]
        replace: bool,

        /// Hide the progress bar
        #[arg(long)]
        quiet: bool,
    },

    /// Search the configured collection
    Search {
        query: String,

        #[arg(long)]
        limit: Option<i64>,

        #[arg(long)]
        min_score: Option<f32>,

        /// Filter as JSON, either {"must":..,"any":..,"must_not":..} or a flat map
        #[arg(long)]
        filter: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };
    let app = App::from_config(&config)?;

    match cli.command {
        Commands::Chunk { path } => {
            let chunks = app.chunk_file(&path)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&chunks)?);
            } else {
                for chunk in &chunks {
                    println!("── {} ({} chars)", chunk.id, chunk.text.chars().count());
                    println!("{}\n", chunk.text);
                }
                println!("{} chunks", chunks.len());
            }
        }
        Commands::Ingest { dir, replace, quiet } => {
            let base = std::env::current_dir().context("resolving working directory")?;
            let dir = dir.unwrap_or_else(|| app.default_input_dir(&base));
            let summary = app.ingest_dir(&dir, replace, !quiet && !cli.json).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("Ingested {} into '{}'", dir.display(), app.retrieval().collection_key);
                println!("  files:             {} ({} skipped)", summary.files, summary.skipped_files);
                println!("  chunks:            {}", summary.report.chunks);
                println!("  upserted:          {}", summary.report.upserted);
                println!("  already present:   {}", summary.report.skipped);
                println!("  failed embeddings: {}", summary.report.failed_embeddings);
            }
        }
        Commands::Search { query, limit, min_score, filter } => {
            let filter = filter
                .map(|raw| -> anyhow::Result<FilterSpec> {
                    let value: serde_json::Value = serde_json::from_str(&raw).context("--filter is not valid JSON")?;
                    Ok(FilterSpec::from_value(&value)?)
                })
                .transpose()?;
            let result = app.search(&query, limit, min_score, filter).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else if result.results.is_empty() {
                println!("No results for \"{}\"", result.query);
            } else {
                for (rank, hit) in result.results.iter().enumerate() {
                    let source = hit.payload.get("source").and_then(|v| v.as_str()).unwrap_or("-");
                    let text = hit.payload.get("text").and_then(|v| v.as_str()).unwrap_or("");
                    let preview: String = text.chars().take(160).collect();
                    println!("{}. [{:.3}] {source}", rank + 1, hit.score);
                    println!("   {}", preview.replace('\n', " "));
                }
            }
        }
    }
    Ok(())
}
