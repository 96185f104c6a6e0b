use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::stream::{self, StreamExt};
use quire_chunking::{Chunker, Cl100kTokenizer};
use quire_core::{Settings, TokenBudget};
use quire_ml::EmbeddingStack;
use quire_observability::{init_tracing, PipelineMetrics};
use quire_pipeline::{extract_document, DocumentPipeline, OpenAiBoundarySuggester};
use quire_retrieval::{collection_name_for, VectorIndex};
use quire_storage::{ChunkSetRepository, Store};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "quire")]
#[command(about = "Token-budgeted document chunking and grounded retrieval")]
struct Cli {
    /// Directory holding `{document}/chunks.json` when no database URL is set.
    #[arg(long, env = "QUIRE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, Default, clap::Args)]
struct BudgetArgs {
    #[arg(long)]
    min_tokens: Option<usize>,
    #[arg(long)]
    max_tokens: Option<usize>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Extract, chunk, persist and index documents.
    Ingest {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        #[command(flatten)]
        budget: BudgetArgs,
        #[arg(long, default_value_t = 4)]
        concurrency: usize,
    },
    /// Print the chunk set for one document without persisting it.
    Chunk {
        path: PathBuf,
        #[command(flatten)]
        budget: BudgetArgs,
    },
    Search {
        query: String,
        /// Collection name or document name; all collections when omitted.
        #[arg(long)]
        collection: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    Answer {
        question: String,
        #[arg(long)]
        collection: Option<String>,
        #[arg(long)]
        top_k: Option<usize>,
    },
    Collections,
    /// Remove a document's stored chunks and its indexed entries.
    Delete { document: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("quire");
    let cli = Cli::parse();

    let mut settings = Settings::from_env().context("invalid QUIRE_* configuration")?;
    if let Some(data_dir) = cli.data_dir {
        settings.data_dir = data_dir;
    }

    match cli.command {
        Command::Ingest {
            paths,
            budget,
            concurrency,
        } => {
            let pipeline = build_pipeline(&settings, budget).await?;
            let results = stream::iter(paths)
                .map(|path| {
                    let pipeline = &pipeline;
                    async move {
                        let result = pipeline.ingest_path(&path, None).await;
                        (path, result)
                    }
                })
                .buffer_unordered(concurrency.max(1))
                .collect::<Vec<_>>()
                .await;

            let mut reports = Vec::new();
            let mut failures = Vec::new();
            for (path, result) in results {
                match result {
                    Ok(report) => reports.push(report),
                    Err(err) => failures.push(serde_json::json!({
                        "path": path.display().to_string(),
                        "error": format!("{err:#}"),
                    })),
                }
            }

            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "reports": reports,
                    "failures": failures,
                    "metrics": pipeline.metrics().snapshot(),
                }))?
            );

            if !failures.is_empty() {
                anyhow::bail!("{} of {} documents failed", failures.len(), failures.len() + reports.len());
            }
        }
        Command::Chunk { path, budget } => {
            let pipeline = build_pipeline(&settings, budget).await?;
            let document = tokio::task::spawn_blocking(move || extract_document(&path))
                .await
                .context("extraction task panicked")??;
            let chunked = pipeline.chunk(&document).await?;
            println!("{}", serde_json::to_string_pretty(&chunked.chunk_set)?);
        }
        Command::Search {
            query,
            collection,
            limit,
        } => {
            let pipeline = build_pipeline(&settings, BudgetArgs::default()).await?;
            pipeline.restore_index().await?;
            let collection = collection.map(|name| resolve_collection(&pipeline, name));
            let hits = pipeline.search(
                collection.as_deref(),
                &query,
                limit.unwrap_or(settings.top_k),
            );
            println!("{}", serde_json::to_string_pretty(&hits)?);
        }
        Command::Answer {
            question,
            collection,
            top_k,
        } => {
            let pipeline = build_pipeline(&settings, BudgetArgs::default()).await?;
            pipeline.restore_index().await?;
            let collection = collection.map(|name| resolve_collection(&pipeline, name));
            let answer = pipeline
                .answer(&question, collection.as_deref(), top_k.unwrap_or(settings.top_k))
                .await?;
            println!("{}", serde_json::to_string_pretty(&answer)?);
        }
        Command::Collections => {
            let pipeline = build_pipeline(&settings, BudgetArgs::default()).await?;
            pipeline.restore_index().await?;
            let summaries = pipeline.store().list_chunk_sets().await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "collections": pipeline.index().list_collections(),
                    "documents": summaries,
                    "retrieval": pipeline.index().stats(),
                }))?
            );
        }
        Command::Delete { document } => {
            let pipeline = build_pipeline(&settings, BudgetArgs::default()).await?;
            if !pipeline.delete_document(&document).await? {
                anyhow::bail!("no stored chunks for document `{document}`");
            }
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "deleted": document,
                    "remaining": pipeline.store().list_chunk_sets().await?,
                }))?
            );
        }
    }

    Ok(())
}

// Accepts either a collection name or the document name it was built from.
fn resolve_collection(pipeline: &DocumentPipeline<Store>, name: String) -> String {
    if pipeline.index().collection_stats(&name).is_some() {
        name
    } else {
        collection_name_for(&name)
    }
}

async fn build_pipeline(settings: &Settings, overrides: BudgetArgs) -> Result<DocumentPipeline<Store>> {
    let budget = TokenBudget::new(
        overrides.min_tokens.unwrap_or(settings.budget.min_tokens()),
        overrides.max_tokens.unwrap_or(settings.budget.max_tokens()),
    )?;

    let tokenizer = Arc::new(Cl100kTokenizer::new()?);
    let chunker = Chunker::new(budget, tokenizer);

    let embeddings = EmbeddingStack::load_default(settings);
    let index = VectorIndex::new(Some(embeddings.embedder));

    let store = Store::from_settings(settings).await?;
    info!(
        backend = store.backend_name(),
        budget = %budget.range_label(),
        "pipeline configured"
    );

    let mut pipeline = DocumentPipeline::new(chunker, Arc::new(store), index, PipelineMetrics::shared());
    if let Some(openai) = settings.openai.clone() {
        let suggester = OpenAiBoundarySuggester::new(openai, settings.suggest_timeout)?;
        pipeline = pipeline.with_suggester(Arc::new(suggester), settings.suggest_timeout);
    }

    Ok(pipeline)
}
