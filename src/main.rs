use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use docs_rag::commands::{
    IngestArgs, QueryArgs, configure, ingest, load_config, query, show_status,
};
use docs_rag::config::get_config_dir;

#[derive(Parser)]
#[command(name = "docs-rag")]
#[command(about = "Retrieval-augmented generation over a local documentation corpus")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml and the vector store
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration if missing and print it
    Config {
        /// Only print the current configuration
        #[arg(long)]
        show: bool,
    },
    /// Chunk, embed and store the documents under a directory
    Ingest {
        /// Root of the document tree
        dir: PathBuf,
        /// Drop and recreate the index first
        #[arg(long)]
        reset: bool,
        /// Extension of the files to read, e.g. "md"
        #[arg(long)]
        extension: Option<String>,
        /// Embedding requests in flight at once
        #[arg(long)]
        concurrency: Option<usize>,
        /// Chunk size in characters
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Characters shared by consecutive chunks
        #[arg(long)]
        overlap: Option<usize>,
    },
    /// Find the stored chunks nearest to a question
    Query {
        question: String,
        /// Number of chunks to return
        #[arg(short, long)]
        k: Option<usize>,
        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
        /// Print the chat completion request instead of the matches
        #[arg(long)]
        chat_request: bool,
    },
    /// Show the record count of the configured index
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => get_config_dir()?,
    };

    match cli.command {
        Commands::Config { show } => {
            configure(&config_dir, show)?;
        }
        Commands::Ingest {
            dir,
            reset,
            extension,
            concurrency,
            chunk_size,
            overlap,
        } => {
            let config = load_config(&config_dir)?;
            let args = IngestArgs {
                reset,
                extension,
                concurrency,
                chunk_size,
                overlap,
            };
            ingest(&config, &dir, &args).await?;
        }
        Commands::Query {
            question,
            k,
            timeout,
            chat_request,
        } => {
            let config = load_config(&config_dir)?;
            let args = QueryArgs {
                top_k: k,
                timeout_seconds: timeout,
                chat_request,
            };
            query(&config, &question, &args).await?;
        }
        Commands::Status => {
            let config = load_config(&config_dir)?;
            show_status(&config).await?;
        }
    }

    Ok(())
}
