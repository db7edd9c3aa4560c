use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Length mismatch in {context}: expected {expected}, got {actual}")]
    LengthMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },

    #[error("Embedding service error: {message}")]
    EmbeddingService { message: String, retryable: bool },

    #[error("Failed to create index '{index}': {reason}")]
    IndexCreationFailed { index: String, reason: String },

    #[error("Failed to write record '{key}': {reason}")]
    StoreWrite { key: String, reason: String },

    #[error("Failed to query index '{index}': {reason}")]
    StoreQuery { index: String, reason: String },

    #[error("Failed to read document {}: {source}", path.display())]
    DocumentRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl RagError {
    /// Whether retrying the same call might succeed
    #[inline]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::EmbeddingService {
                retryable: true,
                ..
            }
        )
    }
}

pub mod commands;
pub mod config;
pub mod database;
pub mod embeddings;
pub mod indexer;
pub mod prompt;
pub mod retriever;
