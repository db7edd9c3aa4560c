// Indexer module
// Chunks documents, embeds each chunk and writes the records into the index

pub mod documents;

#[cfg(test)]
mod tests;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::StreamExt;
use futures::stream;
use tracing::{debug, info, warn};

use crate::database::index::{IndexManager, IndexSchema};
use crate::database::store::{StoredRecord, VectorStore};
use crate::embeddings::chunking::{ChunkingConfig, chunk_with_config};
use crate::embeddings::client::Embedder;
use crate::embeddings::codec;
use crate::{RagError, Result};

pub use documents::{Document, load_documents};

/// Caller policy for one ingestion run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOptions {
    /// Drop and recreate the index before writing
    pub reset: bool,
    /// Embedding requests in flight at once
    pub concurrency: usize,
}

impl Default for IngestOptions {
    #[inline]
    fn default() -> Self {
        Self {
            reset: false,
            concurrency: 1,
        }
    }
}

/// Step at which a chunk was lost
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Embedding,
    Write,
}

impl fmt::Display for FailureStage {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Embedding => "embedding",
            Self::Write => "write",
        })
    }
}

/// A chunk that was skipped during ingestion
#[derive(Debug)]
pub struct ChunkFailure {
    pub key: String,
    pub source: PathBuf,
    pub offset: usize,
    pub stage: FailureStage,
    pub error: RagError,
}

/// Outcome of an ingestion run
#[derive(Debug, Default)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
    pub records_written: usize,
    pub failures: Vec<ChunkFailure>,
}

impl IngestReport {
    #[inline]
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Whether every chunk made it into the store
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A chunk waiting for its embedding
struct PendingChunk<'a> {
    key: String,
    source: &'a Path,
    offset: usize,
    text: String,
}

/// Bulk loader for one index
pub struct Indexer {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    schema: IndexSchema,
}

impl Indexer {
    #[inline]
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>, schema: IndexSchema) -> Self {
        Self {
            store,
            embedder,
            schema,
        }
    }

    #[inline]
    pub fn schema(&self) -> &IndexSchema {
        &self.schema
    }

    /// Read the documents under `root` and ingest them
    #[inline]
    pub async fn ingest_directory(
        &self,
        root: &Path,
        extension: &str,
        chunking: &ChunkingConfig,
        options: &IngestOptions,
    ) -> Result<IngestReport> {
        let documents = load_documents(root, extension)?;
        self.ingest(&documents, chunking, options).await
    }

    /// Chunk, embed and store every document.
    ///
    /// Keys are assigned in chunk emission order. A chunk whose embedding or
    /// write fails is recorded in the report and skipped. An embedding whose
    /// length differs from the index dimension aborts the run with
    /// `LengthMismatch`, as does an index reset failure.
    #[inline]
    pub async fn ingest(
        &self,
        documents: &[Document],
        chunking: &ChunkingConfig,
        options: &IngestOptions,
    ) -> Result<IngestReport> {
        chunking.validate()?;
        if options.concurrency == 0 {
            return Err(RagError::InvalidParameter(
                "concurrency must be at least 1".to_string(),
            ));
        }

        if options.reset {
            IndexManager::new(Arc::clone(&self.store))
                .reset_index(&self.schema)
                .await?;
        }

        let mut pending = Vec::new();
        for document in documents {
            for chunk in chunk_with_config(&document.content, chunking)? {
                pending.push(PendingChunk {
                    key: self.schema.record_key(pending.len()),
                    source: &document.source,
                    offset: chunk.offset,
                    text: chunk.text,
                });
            }
        }

        let mut report = IngestReport {
            documents: documents.len(),
            chunks: pending.len(),
            ..IngestReport::default()
        };
        info!(
            "Ingesting {} chunks from {} documents into '{}'",
            report.chunks, report.documents, self.schema.name
        );

        let embedder = &self.embedder;
        let mut embedded = stream::iter(pending)
            .map(|chunk| async move {
                let result = embedder.embed(&chunk.text).await;
                (chunk, result)
            })
            .buffer_unordered(options.concurrency);

        while let Some((chunk, result)) = embedded.next().await {
            let vector = match result {
                Ok(vector) => vector,
                Err(error) => {
                    warn!(
                        "Skipping {} ({} @ {}): {}",
                        chunk.key,
                        chunk.source.display(),
                        chunk.offset,
                        error
                    );
                    report.failures.push(failure(chunk, FailureStage::Embedding, error));
                    continue;
                }
            };

            self.schema.check_dimension(&vector, "embedding")?;

            let record = StoredRecord {
                key: chunk.key.clone(),
                text: chunk.text.clone(),
                vector: codec::encode(&vector),
            };
            match self.store.write_record(&self.schema, record).await {
                Ok(()) => {
                    debug!("Stored {}", chunk.key);
                    report.records_written += 1;
                }
                Err(error) => {
                    warn!(
                        "Failed to store {} ({} @ {}): {}",
                        chunk.key,
                        chunk.source.display(),
                        chunk.offset,
                        error
                    );
                    report.failures.push(failure(chunk, FailureStage::Write, error));
                }
            }
        }

        info!(
            "Ingestion into '{}' finished: {} written, {} failed",
            self.schema.name,
            report.records_written,
            report.failed()
        );
        Ok(report)
    }
}

fn failure(chunk: PendingChunk<'_>, stage: FailureStage, error: RagError) -> ChunkFailure {
    ChunkFailure {
        key: chunk.key,
        source: chunk.source.to_path_buf(),
        offset: chunk.offset,
        stage,
        error,
    }
}
