// Database module
// Vector index schema and lifecycle, the store boundary and its backends

pub mod index;
pub mod lancedb;
pub mod store;

pub use index::{DistanceMetric, IndexManager, IndexSchema, VectorEncoding};
pub use lancedb::LanceStore;
pub use store::{DropOutcome, MemoryStore, Neighbor, StoredRecord, VectorStore};
