// Vector store boundary
// Any backend able to drop/create a named index, write keyed records and run
// k-nearest-neighbor queries plugs in here.

pub mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;

use super::index::IndexSchema;
use crate::Result;
use crate::embeddings::codec::EncodedVector;

/// Result of dropping an index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropOutcome {
    Dropped,
    NotFound,
}

/// A chunk persisted in the store
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub key: String,
    pub text: String,
    pub vector: EncodedVector,
}

/// One k-nearest-neighbor match
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub text: String,
    pub distance: f32,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Drop the index `name` and every record under its key prefix
    async fn drop_index(&self, name: &str) -> Result<DropOutcome>;

    /// Create an empty index bound to `schema`; fails if it already exists
    async fn create_index(&self, schema: &IndexSchema) -> Result<()>;

    /// Persist one record under the index described by `schema`
    async fn write_record(&self, schema: &IndexSchema, record: StoredRecord) -> Result<()>;

    /// Up to `k` records nearest to `query` under the schema's distance
    /// metric, nearest first
    async fn knn_search(
        &self,
        schema: &IndexSchema,
        query: &EncodedVector,
        k: usize,
    ) -> Result<Vec<Neighbor>>;

    /// Number of records reachable through the index
    async fn count_records(&self, schema: &IndexSchema) -> Result<usize>;
}
