use super::*;
use crate::database::index::IndexManager;
use crate::embeddings::codec::encode;
use tempfile::TempDir;

fn test_schema(metric: DistanceMetric) -> IndexSchema {
    IndexSchema {
        dimension: 3,
        distance_metric: metric,
        ..IndexSchema::default()
    }
}

async fn create_test_store() -> (Arc<LanceStore>, TempDir) {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = LanceStore::open(&temp_dir.path().join("vectors"))
        .await
        .expect("should open lance store");
    (Arc::new(store), temp_dir)
}

async fn write(store: &LanceStore, schema: &IndexSchema, seq: usize, text: &str, vector: &[f32]) {
    store
        .write_record(
            schema,
            StoredRecord {
                key: schema.record_key(seq),
                text: text.to_string(),
                vector: encode(vector),
            },
        )
        .await
        .expect("should write record");
}

#[tokio::test]
async fn open_creates_directory() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("nested").join("vectors");

    LanceStore::open(&path)
        .await
        .expect("should open lance store");
    assert!(path.exists());
}

#[tokio::test]
async fn drop_missing_index_is_not_found() {
    let (store, _temp_dir) = create_test_store().await;
    let outcome = store
        .drop_index("vector_idx")
        .await
        .expect("drop should succeed");
    assert_eq!(outcome, DropOutcome::NotFound);
}

#[tokio::test]
async fn reset_twice_and_search_empty_index() {
    let (store, _temp_dir) = create_test_store().await;
    let manager = IndexManager::new(Arc::clone(&store) as Arc<dyn VectorStore>);
    let schema = test_schema(DistanceMetric::L2);

    manager
        .reset_index(&schema)
        .await
        .expect("first reset should succeed");
    manager
        .reset_index(&schema)
        .await
        .expect("second reset should succeed");

    let results = store
        .knn_search(&schema, &encode(&[0.1, 0.2, 0.3]), 3)
        .await
        .expect("search on empty index should succeed");
    assert!(results.is_empty());
    assert_eq!(
        store
            .count_records(&schema)
            .await
            .expect("should count records"),
        0
    );
}

#[tokio::test]
async fn knn_orders_by_l2_distance() {
    let (store, _temp_dir) = create_test_store().await;
    let schema = test_schema(DistanceMetric::L2);
    store
        .create_index(&schema)
        .await
        .expect("should create index");

    write(&store, &schema, 0, "origin", &[0.0, 0.0, 0.0]).await;
    write(&store, &schema, 1, "near", &[1.0, 0.0, 0.0]).await;
    write(&store, &schema, 2, "far", &[4.0, 0.0, 0.0]).await;

    let results = store
        .knn_search(&schema, &encode(&[0.9, 0.0, 0.0]), 2)
        .await
        .expect("should search");

    let texts: Vec<&str> = results.iter().map(|n| n.text.as_str()).collect();
    assert_eq!(texts, vec!["near", "origin"]);
    assert!((results[0].distance - 0.01).abs() < 1e-4);
    assert!((results[1].distance - 0.81).abs() < 1e-4);
}

#[tokio::test]
async fn knn_with_large_k_returns_all_records() {
    let (store, _temp_dir) = create_test_store().await;
    let schema = test_schema(DistanceMetric::Cosine);
    store
        .create_index(&schema)
        .await
        .expect("should create index");

    write(&store, &schema, 0, "x axis", &[1.0, 0.0, 0.0]).await;
    write(&store, &schema, 1, "y axis", &[0.0, 1.0, 0.0]).await;

    let results = store
        .knn_search(&schema, &encode(&[2.0, 0.1, 0.0]), 10)
        .await
        .expect("should search");

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].text, "x axis");
    assert!(results[0].distance <= results[1].distance);
    assert_eq!(
        store
            .count_records(&schema)
            .await
            .expect("should count records"),
        2
    );
}

#[tokio::test]
async fn reset_drops_previous_records() {
    let (store, _temp_dir) = create_test_store().await;
    let manager = IndexManager::new(Arc::clone(&store) as Arc<dyn VectorStore>);
    let schema = test_schema(DistanceMetric::L2);

    manager
        .reset_index(&schema)
        .await
        .expect("reset should succeed");
    write(&store, &schema, 0, "stale", &[1.0, 1.0, 1.0]).await;

    manager
        .reset_index(&schema)
        .await
        .expect("reset should succeed");
    assert_eq!(
        store
            .count_records(&schema)
            .await
            .expect("should count records"),
        0
    );
}

#[tokio::test]
async fn write_rejects_wrong_dimension() {
    let (store, _temp_dir) = create_test_store().await;
    let schema = test_schema(DistanceMetric::L2);
    store
        .create_index(&schema)
        .await
        .expect("should create index");

    let result = store
        .write_record(
            &schema,
            StoredRecord {
                key: schema.record_key(0),
                text: "short".to_string(),
                vector: encode(&[1.0, 2.0]),
            },
        )
        .await;
    assert!(matches!(result, Err(RagError::LengthMismatch { .. })));
}

#[tokio::test]
async fn search_without_index_fails() {
    let (store, _temp_dir) = create_test_store().await;
    let schema = test_schema(DistanceMetric::L2);

    let result = store.knn_search(&schema, &encode(&[1.0, 2.0, 3.0]), 3).await;
    assert!(matches!(result, Err(RagError::StoreQuery { .. })));
}

#[tokio::test]
async fn reserved_field_name_is_rejected() {
    let (store, _temp_dir) = create_test_store().await;
    let schema = IndexSchema {
        text_field: KEY_COLUMN.to_string(),
        ..test_schema(DistanceMetric::L2)
    };

    let result = store.create_index(&schema).await;
    assert!(matches!(result, Err(RagError::IndexCreationFailed { .. })));
}
