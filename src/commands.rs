use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use console::style;
use tracing::info;

use crate::config::{Config, show_config};
use crate::database::lancedb::LanceStore;
use crate::database::store::VectorStore;
use crate::embeddings::chunking::ChunkingConfig;
use crate::embeddings::client::{Embedder, EmbeddingClient, RetryingEmbedder};
use crate::indexer::{IngestOptions, IngestReport, Indexer};
use crate::prompt::request_for_result;
use crate::retriever::{QueryResult, Retriever};

/// Load the configuration in `config_dir` with environment overrides applied
#[inline]
pub fn load_config(config_dir: &Path) -> Result<Config> {
    let mut config = Config::load(config_dir).context("Failed to load configuration")?;
    config.apply_env_overrides();
    config
        .validate()
        .context("Configuration is invalid after applying environment overrides")?;
    Ok(config)
}

/// Write the default configuration if none exists, then print it
#[inline]
pub fn configure(config_dir: &Path, show_only: bool) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;

    if !show_only {
        if config.config_file_path().exists() {
            println!(
                "{}",
                style("Found existing configuration.").green()
            );
        } else {
            config.save().context("Failed to save configuration")?;
            println!(
                "{} {}",
                style("Wrote default configuration to").green(),
                config.config_file_path().display()
            );
        }
        println!();
    }

    let mut effective = config;
    effective.apply_env_overrides();
    show_config(&effective);
    Ok(())
}

/// Embedding client for the configured service, with retries when enabled
#[inline]
pub fn build_embedder(config: &Config) -> Result<Arc<dyn Embedder>> {
    let client = EmbeddingClient::new(&config.embedding)
        .context("Failed to initialize embedding client")?;

    if config.embedding.retry_attempts > 1 {
        Ok(Arc::new(RetryingEmbedder::new(
            client,
            config.embedding.retry_attempts,
        )))
    } else {
        Ok(Arc::new(client))
    }
}

#[inline]
pub async fn open_store(config: &Config) -> Result<Arc<dyn VectorStore>> {
    let store = LanceStore::open(&config.vector_database_path())
        .await
        .context("Failed to open vector store")?;
    Ok(Arc::new(store))
}

/// Overrides given on the command line for one ingestion run
#[derive(Debug, Clone, Default)]
pub struct IngestArgs {
    pub reset: bool,
    pub extension: Option<String>,
    pub concurrency: Option<usize>,
    pub chunk_size: Option<usize>,
    pub overlap: Option<usize>,
}

/// Ingest the documents under `root` into the configured index
#[inline]
pub async fn ingest(config: &Config, root: &Path, args: &IngestArgs) -> Result<IngestReport> {
    let extension = args
        .extension
        .as_deref()
        .unwrap_or(config.ingest.extension.as_str());
    let chunking = ChunkingConfig::new(
        args.chunk_size.unwrap_or(config.chunking.chunk_size),
        args.overlap.unwrap_or(config.chunking.overlap),
    )?;
    let options = IngestOptions {
        reset: args.reset,
        concurrency: args.concurrency.unwrap_or(config.ingest.concurrency),
    };

    let indexer = Indexer::new(
        open_store(config).await?,
        build_embedder(config)?,
        config.index.clone(),
    );

    info!("Ingesting .{} documents from {}", extension, root.display());
    let report = indexer
        .ingest_directory(root, extension, &chunking, &options)
        .await
        .with_context(|| format!("Failed to ingest documents from {}", root.display()))?;

    print_report(&report);
    Ok(report)
}

fn print_report(report: &IngestReport) {
    println!(
        "Processed {} documents into {} chunks",
        report.documents, report.chunks
    );
    println!(
        "  Records written: {}",
        style(report.records_written).green()
    );
    if !report.is_complete() {
        println!("  Failed chunks: {}", style(report.failed()).red());
        for failure in &report.failures {
            println!(
                "    {} ({} @ {}, {}): {}",
                failure.key,
                failure.source.display(),
                failure.offset,
                failure.stage,
                failure.error
            );
        }
    }
}

/// Options of one query
#[derive(Debug, Clone, Default)]
pub struct QueryArgs {
    pub top_k: Option<usize>,
    pub timeout_seconds: Option<u64>,
    /// Print the chat request JSON instead of the matches
    pub chat_request: bool,
}

/// Retrieve the chunks nearest to `question`
#[inline]
pub async fn query(config: &Config, question: &str, args: &QueryArgs) -> Result<QueryResult> {
    let retriever = Retriever::new(
        open_store(config).await?,
        build_embedder(config)?,
        config.index.clone(),
    );

    let k = args.top_k.unwrap_or(config.retrieval.top_k);
    let timeout = Duration::from_secs(
        args.timeout_seconds
            .unwrap_or(config.retrieval.timeout_seconds),
    );

    let result = retriever
        .retrieve_with_timeout(question, k, timeout)
        .await
        .context("Retrieval failed")?;

    if args.chat_request {
        let request = request_for_result(&config.chat, &result, question);
        println!(
            "{}",
            serde_json::to_string_pretty(&request).context("Failed to serialize chat request")?
        );
    } else {
        println!(
            "{}",
            style(format!("Found {} matches", result.len())).bold().cyan()
        );
        for (rank, neighbor) in result.matches.iter().enumerate() {
            println!();
            println!(
                "{} distance {}",
                style(format!("#{}", rank + 1)).bold(),
                style(neighbor.distance).yellow()
            );
            println!("{}", neighbor.text);
        }
    }

    Ok(result)
}

/// Print the record count of the configured index
#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    let index = &config.index;

    println!("{}", style("📊 Index Status").bold().cyan());
    println!(
        "  Vector store: {}",
        style(config.vector_database_path().display()).dim()
    );
    println!("  Index: {}", style(&index.name).cyan());

    match store.count_records(index).await {
        Ok(count) => println!("  Records: {}", style(count).green()),
        Err(e) => println!(
            "  Records: {} ({})",
            style("unavailable").red(),
            e
        ),
    }

    Ok(())
}
