
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::database::index::IndexSchema;
use crate::database::store::{Neighbor, VectorStore};
use crate::embeddings::client::Embedder;
use crate::embeddings::codec;
use crate::{RagError, Result};

/// Matches of one nearest-neighbor query, nearest first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub matches: Vec<Neighbor>,
}

impl QueryResult {
    #[inline]
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    #[inline]
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.matches.iter().map(|m| m.text.as_str())
    }

    /// Matched texts concatenated in result order, the block injected into the
    /// chat prompt
    #[inline]
    pub fn knowledge_base(&self) -> String {
        self.texts().collect()
    }
}

/// Answers questions with the nearest stored chunks of one index
pub struct Retriever {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    schema: IndexSchema,
}

impl Retriever {
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

    /// The `k` stored chunks nearest to `query_vector`.
    ///
    /// Ordering comes from the store. Fewer than `k` matches are returned when
    /// the index holds fewer records.
    #[inline]
    pub async fn search(&self, query_vector: &[f32], k: usize) -> Result<QueryResult> {
        if k == 0 {
            return Err(RagError::InvalidParameter(
                "k must be at least 1".to_string(),
            ));
        }
        self.schema.check_dimension(query_vector, "query vector")?;

        let encoded = codec::encode(query_vector);
        let matches = self.store.knn_search(&self.schema, &encoded, k).await?;

        debug!(
            "Query on '{}' returned {} of {} requested matches",
            self.schema.name,
            matches.len(),
            k
        );
        Ok(QueryResult { matches })
    }

    /// Embed `question` and search with its vector
    #[inline]
    pub async fn retrieve(&self, question: &str, k: usize) -> Result<QueryResult> {
        if k == 0 {
            return Err(RagError::InvalidParameter(
                "k must be at least 1".to_string(),
            ));
        }

        let vector = self.embedder.embed(question).await?;
        self.search(&vector, k).await
    }

    /// [`Retriever::retrieve`] bounded by `timeout`
    #[inline]
    pub async fn retrieve_with_timeout(
        &self,
        question: &str,
        k: usize,
        timeout: Duration,
    ) -> Result<QueryResult> {
        tokio::time::timeout(timeout, self.retrieve(question, k))
            .await
            .unwrap_or_else(|_| {
                warn!("Retrieval timed out after {:?}", timeout);
                Err(RagError::Cancelled(format!(
                    "retrieval timed out after {:?}",
                    timeout
                )))
            })
    }

    /// [`Retriever::retrieve`], abandoned as soon as `cancel` completes
    #[inline]
    pub async fn retrieve_until<F>(&self, question: &str, k: usize, cancel: F) -> Result<QueryResult>
    where
        F: Future<Output = ()> + Send,
    {
        tokio::select! {
            biased;
            () = cancel => {
                warn!("Retrieval cancelled by caller");
                Err(RagError::Cancelled("retrieval cancelled by caller".to_string()))
            }
            result = self.retrieve(question, k) => result,
        }
    }
}
