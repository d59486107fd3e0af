//! passagedb CLI - ingest documents and run lexical, vector or hybrid search.
//!
//! # Usage
//!
//! ```bash
//! passagedb init --table articles --index articles_content_idx
//! passagedb ingest --table articles --file notes.md --name "Field notes"
//! passagedb ingest --table articles --dir ./docs
//! passagedb search --table articles --query "how to quantify AGI" --mode hybrid --top-k 5
//! ```

mod output;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use passagedb_core::chunking::{list_documents, ParagraphChunker};
use passagedb_core::config::{Config, Settings};
use passagedb_core::ident::{IndexName, TableName};
use passagedb_core::types::SearchMode;
use passagedb_embed::get_default_embedder;
use passagedb_hybrid::{HybridSearchEngine, IngestionPipeline, SearchRequest};
use passagedb_text::Analyzer;
use passagedb_vector::LanceStore;

const DEFAULT_TABLE: &str = "articles";
const DEFAULT_INDEX: &str = "articles_content_idx";

#[derive(Parser)]
#[command(name = "passagedb", version, about = "Passage store with lexical, vector and RRF hybrid retrieval")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a passage table and its lexical index
    Init {
        #[arg(long, default_value = DEFAULT_TABLE)]
        table: String,
        #[arg(long, default_value = DEFAULT_INDEX)]
        index: String,
        /// `standard` (English stop words) or `ngram` (CJK)
        #[arg(long, default_value = "standard")]
        analyzer: Analyzer,
    },
    /// Chunk, embed and store a document, or every .txt/.md file under a directory
    Ingest {
        #[arg(long, default_value = DEFAULT_TABLE)]
        table: String,
        #[arg(long, conflicts_with = "dir", required_unless_present = "dir")]
        file: Option<PathBuf>,
        #[arg(long)]
        dir: Option<PathBuf>,
        /// Document name; defaults to the file name
        #[arg(long, requires = "file")]
        name: Option<String>,
    },
    /// Retrieve the passages most relevant to a query
    Search {
        #[arg(long, default_value = DEFAULT_TABLE)]
        table: String,
        #[arg(long, short)]
        query: String,
        #[arg(long, default_value = DEFAULT_INDEX)]
        index_name: String,
        /// keyword, vector or hybrid
        #[arg(long, default_value = "hybrid")]
        mode: SearchMode,
        /// Defaults to retrieval.default_top_k
        #[arg(long, short = 'k')]
        top_k: Option<usize>,
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.logging.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Config::load()
        .and_then(|c| c.settings())
        .context("loading configuration")?;
    init_logging(&settings);

    let store = Arc::new(LanceStore::open(&settings.store).await?);
    match cli.command {
        Command::Init { table, index, analyzer } => {
            let table = TableName::new(table)?;
            let index = IndexName::new(index)?;
            let created_table = store.create_table(&table).await?;
            let created_index = store.create_lexical_index(&table, &index, analyzer).await?;
            println!(
                "table '{table}' {}, lexical index '{index}' ({analyzer}) {}",
                if created_table { "created" } else { "already exists" },
                if created_index { "created" } else { "already exists" },
            );
        }
        Command::Ingest { table, file, dir, name } => {
            let table = TableName::new(table)?;
            let embedder = get_default_embedder(&settings.embedding)?;
            let chunker = Arc::new(ParagraphChunker::new(settings.chunking.clone()));
            let pipeline = IngestionPipeline::new(store, embedder, chunker);
            match (file, dir) {
                (Some(path), _) => {
                    let report = pipeline.ingest_file(&path, &table, name.as_deref()).await?;
                    println!("ingested '{}' into '{}': {} passages", report.document, report.table, report.inserted);
                }
                (None, Some(root)) => ingest_dir(&pipeline, &root, &table).await?,
                (None, None) => bail!("either --file or --dir is required"),
            }
        }
        Command::Search { table, query, index_name, mode, top_k, json } => {
            let top_k = top_k.unwrap_or(settings.retrieval.default_top_k);
            let request = SearchRequest::new(query, mode, &table, &index_name, top_k)?;
            let embedder = get_default_embedder(&settings.embedding)?;
            let engine = HybridSearchEngine::new(store, embedder, &settings.retrieval);
            let results = engine.search(&request).await?;
            let rendered = if json { output::format_json(&request, &results)? } else { output::format_human(&results) };
            println!("{rendered}");
        }
    }
    Ok(())
}

async fn ingest_dir(pipeline: &IngestionPipeline<LanceStore>, root: &std::path::Path, table: &TableName) -> Result<()> {
    let files = list_documents(root);
    if files.is_empty() {
        bail!("no .txt or .md files under {}", root.display());
    }
    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} documents {msg}")?
            .progress_chars("#>-"),
    );
    let (mut passages, mut failed) = (0usize, 0usize);
    for path in &files {
        pb.set_message(path.file_name().map(|f| f.to_string_lossy().to_string()).unwrap_or_default());
        match pipeline.ingest_file(path, table, None).await {
            Ok(report) => passages += report.inserted,
            Err(e) => {
                failed += 1;
                pb.suspend(|| warn!(path = %path.display(), error = %e, "document skipped"));
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();
    info!(documents = files.len() - failed, passages, failed, "directory ingest finished");
    println!("ingested {} of {} documents into '{table}': {passages} passages", files.len() - failed, files.len());
    if failed > 0 {
        bail!("{failed} document(s) failed; see log for details");
    }
    Ok(())
}
