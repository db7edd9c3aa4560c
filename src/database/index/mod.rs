
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::store::{DropOutcome, VectorStore};
use crate::embeddings::codec::BYTES_PER_COMPONENT;
use crate::{RagError, Result};

/// Largest vector dimensionality an index may declare
pub const MAX_DIMENSION: usize = 32_768;

/// Dissimilarity function used for nearest-neighbor search; smaller is closer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum DistanceMetric {
    /// Squared Euclidean distance
    #[default]
    #[serde(rename = "L2")]
    L2,
    /// `1 - cosine similarity`
    #[serde(rename = "COSINE")]
    Cosine,
    /// `1 - dot product`
    #[serde(rename = "IP")]
    InnerProduct,
}

impl fmt::Display for DistanceMetric {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::L2 => "L2",
            Self::Cosine => "COSINE",
            Self::InnerProduct => "IP",
        })
    }
}

/// Storage encoding of vector components
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum VectorEncoding {
    #[default]
    #[serde(rename = "FLOAT32")]
    Float32,
}

impl VectorEncoding {
    #[inline]
    pub fn bytes_per_component(self) -> usize {
        match self {
            Self::Float32 => BYTES_PER_COMPONENT,
        }
    }
}

impl fmt::Display for VectorEncoding {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Float32 => "FLOAT32",
        })
    }
}

/// Declared structure of a named vector index.
///
/// Records belong to the index when their key starts with `key_prefix`. The
/// index stores the chunk text under `text_field` and the encoded vector under
/// `vector_field`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IndexSchema {
    pub name: String,
    pub key_prefix: String,
    pub text_field: String,
    pub vector_field: String,
    pub dimension: usize,
    pub distance_metric: DistanceMetric,
    pub encoding: VectorEncoding,
}

impl Default for IndexSchema {
    #[inline]
    fn default() -> Self {
        Self {
            name: "vector_idx".to_string(),
            key_prefix: "doc:".to_string(),
            text_field: "content".to_string(),
            vector_field: "embedding".to_string(),
            dimension: 1024,
            distance_metric: DistanceMetric::L2,
            encoding: VectorEncoding::Float32,
        }
    }
}

impl IndexSchema {
    #[inline]
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty()
            || !self
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        {
            return Err(RagError::InvalidParameter(format!(
                "index name '{}' must be non-empty and contain only letters, digits, '_', '-' or '.'",
                self.name
            )));
        }

        if self.key_prefix.is_empty() {
            return Err(RagError::InvalidParameter(
                "key prefix cannot be empty".to_string(),
            ));
        }

        if self.text_field.trim().is_empty() || self.vector_field.trim().is_empty() {
            return Err(RagError::InvalidParameter(
                "text and vector field names cannot be empty".to_string(),
            ));
        }

        if self.text_field == self.vector_field {
            return Err(RagError::InvalidParameter(format!(
                "text and vector fields must differ (both are '{}')",
                self.text_field
            )));
        }

        if !(1..=MAX_DIMENSION).contains(&self.dimension) {
            return Err(RagError::InvalidParameter(format!(
                "dimension {} must be between 1 and {}",
                self.dimension, MAX_DIMENSION
            )));
        }

        Ok(())
    }

    /// Key of the `seq`-th record written in an ingestion run
    #[inline]
    pub fn record_key(&self, seq: usize) -> String {
        format!("{}{}", self.key_prefix, seq)
    }

    #[inline]
    pub fn owns_key(&self, key: &str) -> bool {
        key.starts_with(&self.key_prefix)
    }

    /// Byte length every stored vector of this index must have
    #[inline]
    pub fn encoded_len(&self) -> usize {
        self.dimension * self.encoding.bytes_per_component()
    }

    /// Fail with `LengthMismatch` unless `vector` has the declared dimensionality
    #[inline]
    pub fn check_dimension(&self, vector: &[f32], context: &str) -> Result<()> {
        if vector.len() == self.dimension {
            Ok(())
        } else {
            Err(RagError::LengthMismatch {
                context: format!("{} for index '{}'", context, self.name),
                expected: self.dimension,
                actual: vector.len(),
            })
        }
    }

    /// Fail with `LengthMismatch` unless `bytes` is a full encoded vector
    #[inline]
    pub fn check_encoded(&self, bytes: &[u8], context: &str) -> Result<()> {
        if bytes.len() == self.encoded_len() {
            Ok(())
        } else {
            Err(RagError::LengthMismatch {
                context: format!("{} for index '{}'", context, self.name),
                expected: self.encoded_len(),
                actual: bytes.len(),
            })
        }
    }
}

/// Creates and resets vector indexes on a store
pub struct IndexManager {
    store: Arc<dyn VectorStore>,
}

impl IndexManager {
    #[inline]
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }

    /// Drop any index named `schema.name` together with its records, then
    /// create a fresh empty index bound to `schema`.
    ///
    /// A missing index is not an error. Every other failure is reported as
    /// `IndexCreationFailed`.
    #[inline]
    pub async fn reset_index(&self, schema: &IndexSchema) -> Result<()> {
        schema
            .validate()
            .map_err(|e| creation_failed(&schema.name, e))?;

        match self.store.drop_index(&schema.name).await {
            Ok(DropOutcome::Dropped) => info!("Dropped existing index '{}'", schema.name),
            Ok(DropOutcome::NotFound) => debug!("Index '{}' did not exist", schema.name),
            Err(e) => return Err(creation_failed(&schema.name, e)),
        }

        self.store
            .create_index(schema)
            .await
            .map_err(|e| creation_failed(&schema.name, e))?;

        info!(
            "Created index '{}' (prefix '{}', {} x {}, {})",
            schema.name, schema.key_prefix, schema.dimension, schema.encoding, schema.distance_metric
        );
        Ok(())
    }
}

fn creation_failed(index: &str, error: RagError) -> RagError {
    match error {
        e @ RagError::IndexCreationFailed { .. } => e,
        other => RagError::IndexCreationFailed {
            index: index.to_string(),
            reason: other.to_string(),
        },
    }
}
