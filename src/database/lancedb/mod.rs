// LanceDB vector store
// One table per index with key, text and vector columns

#[cfg(test)]
mod tests;

use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use tracing::{debug, info};

use super::index::{DistanceMetric, IndexSchema};
use super::store::{DropOutcome, Neighbor, StoredRecord, VectorStore};
use crate::embeddings::codec::EncodedVector;
use crate::{RagError, Result};

/// Column holding the record key
pub const KEY_COLUMN: &str = "key";
const DISTANCE_COLUMN: &str = "_distance";

/// Vector store backed by a LanceDB directory
pub struct LanceStore {
    connection: Connection,
}

impl LanceStore {
    /// Open (creating if needed) the LanceDB database at `path`
    #[inline]
    pub async fn open(path: &Path) -> Result<Self> {
        debug!("Opening LanceDB at path: {}", path.display());

        std::fs::create_dir_all(path).map_err(|e| {
            RagError::Config(format!(
                "Failed to create vector database directory {}: {}",
                path.display(),
                e
            ))
        })?;

        let uri = format!("file://{}", path.display());
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| RagError::Config(format!("Failed to connect to LanceDB: {}", e)))?;

        info!("Vector store opened at {}", path.display());
        Ok(Self { connection })
    }

    async fn has_table(&self, name: &str) -> Result<bool> {
        let table_names = self.connection.table_names().execute().await.map_err(|e| {
            RagError::StoreQuery {
                index: name.to_string(),
                reason: format!("failed to list tables: {}", e),
            }
        })?;
        Ok(table_names.iter().any(|table| table == name))
    }

    async fn open_index(&self, schema: &IndexSchema) -> lancedb::Result<Table> {
        self.connection.open_table(&schema.name).execute().await
    }
}

fn list_size(schema: &IndexSchema) -> Result<i32> {
    i32::try_from(schema.dimension).map_err(|_| {
        RagError::InvalidParameter(format!(
            "dimension {} does not fit a fixed-size list",
            schema.dimension
        ))
    })
}

fn vector_item_field() -> Arc<Field> {
    Arc::new(Field::new("item", DataType::Float32, false))
}

/// Arrow schema of the table backing `schema`
fn table_schema(schema: &IndexSchema) -> Result<Arc<Schema>> {
    Ok(Arc::new(Schema::new(vec![
        Field::new(KEY_COLUMN, DataType::Utf8, false),
        Field::new(&schema.text_field, DataType::Utf8, false),
        Field::new(
            &schema.vector_field,
            DataType::FixedSizeList(vector_item_field(), list_size(schema)?),
            false,
        ),
    ])))
}

fn distance_type(metric: DistanceMetric) -> DistanceType {
    match metric {
        DistanceMetric::L2 => DistanceType::L2,
        DistanceMetric::Cosine => DistanceType::Cosine,
        DistanceMetric::InnerProduct => DistanceType::Dot,
    }
}

fn record_batch(
    schema: &IndexSchema,
    record: &StoredRecord,
    vector: Vec<f32>,
) -> Result<RecordBatch> {
    let arrow_schema = table_schema(schema)?;
    let write_error = |e: arrow::error::ArrowError| RagError::StoreWrite {
        key: record.key.clone(),
        reason: e.to_string(),
    };

    let vector_array = FixedSizeListArray::try_new(
        vector_item_field(),
        list_size(schema)?,
        Arc::new(Float32Array::from(vector)),
        None,
    )
    .map_err(write_error)?;

    let arrays: Vec<Arc<dyn Array>> = vec![
        Arc::new(StringArray::from(vec![record.key.as_str()])),
        Arc::new(StringArray::from(vec![record.text.as_str()])),
        Arc::new(vector_array),
    ];

    RecordBatch::try_new(arrow_schema, arrays).map_err(write_error)
}

fn parse_neighbors(schema: &IndexSchema, batch: &RecordBatch) -> Result<Vec<Neighbor>> {
    let query_error = |reason: String| RagError::StoreQuery {
        index: schema.name.clone(),
        reason,
    };

    let texts = batch
        .column_by_name(&schema.text_field)
        .ok_or_else(|| query_error(format!("missing {} column", schema.text_field)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| query_error(format!("invalid {} column type", schema.text_field)))?;

    let distances = batch
        .column_by_name(DISTANCE_COLUMN)
        .ok_or_else(|| query_error("missing _distance column".to_string()))?
        .as_any()
        .downcast_ref::<Float32Array>()
        .ok_or_else(|| query_error("invalid _distance column type".to_string()))?;

    Ok((0..batch.num_rows())
        .map(|row| Neighbor {
            text: texts.value(row).to_string(),
            distance: distances.value(row),
        })
        .collect())
}

#[async_trait]
impl VectorStore for LanceStore {
    async fn drop_index(&self, name: &str) -> Result<DropOutcome> {
        if !self.has_table(name).await? {
            return Ok(DropOutcome::NotFound);
        }

        self.connection
            .drop_table(name)
            .await
            .map_err(|e| RagError::IndexCreationFailed {
                index: name.to_string(),
                reason: format!("failed to drop table: {}", e),
            })?;
        debug!("Dropped table '{}'", name);
        Ok(DropOutcome::Dropped)
    }

    async fn create_index(&self, schema: &IndexSchema) -> Result<()> {
        let creation_failed = |reason: String| RagError::IndexCreationFailed {
            index: schema.name.clone(),
            reason,
        };

        schema.validate().map_err(|e| creation_failed(e.to_string()))?;
        if schema.text_field == KEY_COLUMN || schema.vector_field == KEY_COLUMN {
            return Err(creation_failed(format!(
                "field name '{}' is reserved for record keys",
                KEY_COLUMN
            )));
        }

        let arrow_schema = table_schema(schema).map_err(|e| creation_failed(e.to_string()))?;
        self.connection
            .create_empty_table(&schema.name, arrow_schema)
            .execute()
            .await
            .map_err(|e| creation_failed(format!("failed to create table: {}", e)))?;
        Ok(())
    }

    async fn write_record(&self, schema: &IndexSchema, record: StoredRecord) -> Result<()> {
        let vector = record.vector.decode(schema.dimension)?;
        let batch = record_batch(schema, &record, vector)?;

        let table = self.open_index(schema).await.map_err(|e| RagError::StoreWrite {
            key: record.key.clone(),
            reason: format!("failed to open table '{}': {}", schema.name, e),
        })?;

        let arrow_schema = batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(batch)), arrow_schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| RagError::StoreWrite {
                key: record.key.clone(),
                reason: e.to_string(),
            })?;
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

        let table = self
            .open_index(schema)
            .await
            .map_err(|e| query_error(format!("failed to open table: {}", e)))?;

        let rows = table
            .count_rows(None)
            .await
            .map_err(|e| query_error(format!("failed to count rows: {}", e)))?;
        if rows == 0 {
            return Ok(Vec::new());
        }

        let mut results = table
            .vector_search(query.as_slice())
            .map_err(|e| query_error(format!("failed to create vector search: {}", e)))?
            .column(&schema.vector_field)
            .distance_type(distance_type(schema.distance_metric))
            .limit(k)
            .execute()
            .await
            .map_err(|e| query_error(format!("failed to execute search: {}", e)))?;

        let mut neighbors = Vec::new();
        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| query_error(format!("failed to read result stream: {}", e)))?
        {
            neighbors.extend(parse_neighbors(schema, &batch)?);
        }

        debug!(
            "Search on '{}' returned {} neighbors",
            schema.name,
            neighbors.len()
        );
        Ok(neighbors)
    }

    async fn count_records(&self, schema: &IndexSchema) -> Result<usize> {
        let table = self.open_index(schema).await.map_err(|e| RagError::StoreQuery {
            index: schema.name.clone(),
            reason: format!("failed to open table: {}", e),
        })?;

        table.count_rows(None).await.map_err(|e| RagError::StoreQuery {
            index: schema.name.clone(),
            reason: format!("failed to count rows: {}", e),
        })
    }
}
