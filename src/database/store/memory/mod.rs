
use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use tracing::debug;

use super::{DropOutcome, Neighbor, StoredRecord, VectorStore};
use crate::database::index::{DistanceMetric, IndexSchema};
use crate::embeddings::codec::{self, EncodedVector};
use crate::{RagError, Result};

/// In-process store with a flat keyspace.
///
/// Records live under their key independent of any index; an index sees the
/// records whose key starts with its prefix. Search is brute force.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

#[derive(Debug, Default)]
struct State {
    indexes: HashMap<String, IndexSchema>,
    records: BTreeMap<String, StoredRecord>,
}

impl MemoryStore {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in the keyspace, indexed or not
    #[inline]
    pub fn len(&self) -> usize {
        self.read().records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.read().records.is_empty()
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<StoredRecord> {
        self.read().records.get(key).cloned()
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn drop_index(&self, name: &str) -> Result<DropOutcome> {
        let mut state = self.write();
        let Some(schema) = state.indexes.remove(name) else {
            return Ok(DropOutcome::NotFound);
        };

        let before = state.records.len();
        state.records.retain(|key, _| !schema.owns_key(key));
        debug!(
            "Dropped index '{}' and {} records",
            name,
            before - state.records.len()
        );
        Ok(DropOutcome::Dropped)
    }

    async fn create_index(&self, schema: &IndexSchema) -> Result<()> {
        schema.validate().map_err(|e| RagError::IndexCreationFailed {
            index: schema.name.clone(),
            reason: e.to_string(),
        })?;

        let mut state = self.write();
        if state.indexes.contains_key(&schema.name) {
            return Err(RagError::IndexCreationFailed {
                index: schema.name.clone(),
                reason: "index already exists".to_string(),
            });
        }
        state.indexes.insert(schema.name.clone(), schema.clone());
        Ok(())
    }

    async fn write_record(&self, schema: &IndexSchema, record: StoredRecord) -> Result<()> {
        schema.check_encoded(record.vector.as_bytes(), "record write")?;
        if !schema.owns_key(&record.key) {
            return Err(RagError::StoreWrite {
                key: record.key,
                reason: format!(
                    "key is outside prefix '{}' of index '{}'",
                    schema.key_prefix, schema.name
                ),
            });
        }

        self.write().records.insert(record.key.clone(), record);
        Ok(())
    }

    async fn knn_search(
        &self,
        schema: &IndexSchema,
        query: &EncodedVector,
        k: usize,
    ) -> Result<Vec<Neighbor>> {
        let query_error = |reason: String| RagError::StoreQuery {
            index: schema.name.clone(),
            reason,
        };

        let query = query
            .decode(schema.dimension)
            .map_err(|e| query_error(e.to_string()))?;

        let state = self.read();
        let index = state
            .indexes
            .get(&schema.name)
            .ok_or_else(|| query_error("no such index".to_string()))?;

        let mut neighbors = Vec::new();
        for record in state.records.values().filter(|r| index.owns_key(&r.key)) {
            // Records of another dimensionality are not part of this index
            let Ok(vector) = codec::decode(record.vector.as_bytes(), index.dimension) else {
                continue;
            };
            neighbors.push(Neighbor {
                text: record.text.clone(),
                distance: distance(index.distance_metric, &query, &vector),
            });
        }

        neighbors.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        neighbors.truncate(k);
        Ok(neighbors)
    }

    async fn count_records(&self, schema: &IndexSchema) -> Result<usize> {
        let state = self.read();
        let index = state
            .indexes
            .get(&schema.name)
            .ok_or_else(|| RagError::StoreQuery {
                index: schema.name.clone(),
                reason: "no such index".to_string(),
            })?;

        Ok(state
            .records
            .keys()
            .filter(|key| index.owns_key(key))
            .count())
    }
}

/// Distance between two vectors of equal length under `metric`
#[inline]
pub fn distance(metric: DistanceMetric, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        DistanceMetric::L2 => a
            .iter()
            .zip(b)
            .map(|(x, y)| (x - y) * (x - y))
            .sum(),
        DistanceMetric::Cosine => {
            let (dot, norm_a, norm_b) = a.iter().zip(b).fold(
                (0.0_f32, 0.0_f32, 0.0_f32),
                |(dot, na, nb), (x, y)| (x.mul_add(*y, dot), x.mul_add(*x, na), y.mul_add(*y, nb)),
            );
            let denom = norm_a.sqrt() * norm_b.sqrt();
            if denom == 0.0 { 1.0 } else { 1.0 - dot / denom }
        }
        DistanceMetric::InnerProduct => 1.0 - a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>(),
    }
}
