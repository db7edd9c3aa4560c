use super::*;
use crate::database::index::DistanceMetric;
use crate::database::store::{DropOutcome, MemoryStore, Neighbor};
use crate::embeddings::codec::EncodedVector;
use crate::retriever::Retriever;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

const DIMENSION: usize = 3;

/// Embeds text as (length, count of 'A', count of 'C'); fails on "FAIL"
struct LetterEmbedder;

#[async_trait]
impl Embedder for LetterEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.contains("FAIL") {
            return Err(RagError::EmbeddingService {
                message: "model rejected input".to_string(),
                retryable: false,
            });
        }
        let count = |letter: char| text.chars().filter(|c| *c == letter).count() as f32;
        Ok(vec![text.chars().count() as f32, count('A'), count('C')])
    }

    fn model(&self) -> &str {
        "letters"
    }
}

/// Returns vectors one component too long
struct WideEmbedder;

#[async_trait]
impl Embedder for WideEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![0.0; DIMENSION + 1])
    }

    fn model(&self) -> &str {
        "wide"
    }
}

/// Tracks the largest number of concurrent requests
#[derive(Default)]
struct GaugedEmbedder {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl Embedder for GaugedEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(vec![1.0; DIMENSION])
    }

    fn model(&self) -> &str {
        "gauged"
    }
}

/// Memory store that refuses one key
struct RefusingStore {
    inner: MemoryStore,
    refused_key: String,
}

#[async_trait]
impl VectorStore for RefusingStore {
    async fn drop_index(&self, name: &str) -> Result<DropOutcome> {
        self.inner.drop_index(name).await
    }

    async fn create_index(&self, schema: &IndexSchema) -> Result<()> {
        self.inner.create_index(schema).await
    }

    async fn write_record(&self, schema: &IndexSchema, record: StoredRecord) -> Result<()> {
        if record.key == self.refused_key {
            return Err(RagError::StoreWrite {
                key: record.key,
                reason: "disk full".to_string(),
            });
        }
        self.inner.write_record(schema, record).await
    }

    async fn knn_search(
        &self,
        schema: &IndexSchema,
        query: &EncodedVector,
        k: usize,
    ) -> Result<Vec<Neighbor>> {
        self.inner.knn_search(schema, query, k).await
    }

    async fn count_records(&self, schema: &IndexSchema) -> Result<usize> {
        self.inner.count_records(schema).await
    }
}

fn test_schema() -> IndexSchema {
    IndexSchema {
        dimension: DIMENSION,
        distance_metric: DistanceMetric::L2,
        ..IndexSchema::default()
    }
}

fn chunking(size: usize, overlap: usize) -> ChunkingConfig {
    ChunkingConfig::new(size, overlap).expect("valid chunking config")
}

fn reset() -> IngestOptions {
    IngestOptions {
        reset: true,
        ..IngestOptions::default()
    }
}

fn create_test_indexer(embedder: Arc<dyn Embedder>) -> (Indexer, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let indexer = Indexer::new(
        Arc::clone(&store) as Arc<dyn VectorStore>,
        embedder,
        test_schema(),
    );
    (indexer, store)
}

#[tokio::test]
async fn ingests_every_chunk_with_sequential_keys() {
    let (indexer, store) = create_test_indexer(Arc::new(LetterEmbedder));
    let documents = vec![
        Document::new("one.md", "AAAABBBBCCCC"),
        Document::new("two.md", "CCCC"),
    ];

    let report = indexer
        .ingest(&documents, &chunking(8, 4), &reset())
        .await
        .expect("ingestion should succeed");

    assert_eq!(report.documents, 2);
    assert_eq!(report.chunks, 3);
    assert_eq!(report.records_written, 3);
    assert!(report.is_complete());

    let first = store.get("doc:0").expect("doc:0 should exist");
    assert_eq!(first.text, "AAAABBBB");
    assert_eq!(
        first.vector.decode(DIMENSION).expect("should decode"),
        vec![8.0, 4.0, 0.0]
    );
    assert_eq!(store.get("doc:1").expect("doc:1 should exist").text, "BBBBCCCC");
    assert_eq!(store.get("doc:2").expect("doc:2 should exist").text, "CCCC");
    assert!(store.get("doc:3").is_none());
}

#[tokio::test]
async fn embedding_failures_are_skipped_and_reported() {
    let (indexer, store) = create_test_indexer(Arc::new(LetterEmbedder));
    let documents = vec![
        Document::new("good.md", "AAAA"),
        Document::new("bad.md", "FAIL"),
        Document::new("also-good.md", "CCCC"),
    ];

    let report = indexer
        .ingest(&documents, &chunking(8, 2), &reset())
        .await
        .expect("ingestion should succeed");

    assert_eq!(report.chunks, 3);
    assert_eq!(report.records_written, 2);
    assert_eq!(report.failed(), 1);

    let failure = &report.failures[0];
    assert_eq!(failure.key, "doc:1");
    assert_eq!(failure.source, PathBuf::from("bad.md"));
    assert_eq!(failure.offset, 0);
    assert_eq!(failure.stage, FailureStage::Embedding);
    assert!(matches!(failure.error, RagError::EmbeddingService { .. }));

    assert!(store.get("doc:0").is_some());
    assert!(store.get("doc:1").is_none());
    assert!(store.get("doc:2").is_some());
}

#[tokio::test]
async fn write_failures_are_skipped_and_reported() {
    let store = Arc::new(RefusingStore {
        inner: MemoryStore::new(),
        refused_key: "doc:0".to_string(),
    });
    let indexer = Indexer::new(
        Arc::clone(&store) as Arc<dyn VectorStore>,
        Arc::new(LetterEmbedder),
        test_schema(),
    );

    let report = indexer
        .ingest(
            &[Document::new("a.md", "AAAACCCC")],
            &chunking(4, 0),
            &reset(),
        )
        .await
        .expect("ingestion should succeed");

    assert_eq!(report.records_written, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].stage, FailureStage::Write);
    assert!(matches!(
        report.failures[0].error,
        RagError::StoreWrite { .. }
    ));
    assert_eq!(store.inner.len(), 1);
}

#[tokio::test]
async fn dimension_mismatch_aborts_the_run() {
    let (indexer, store) = create_test_indexer(Arc::new(WideEmbedder));

    let result = indexer
        .ingest(&[Document::new("a.md", "AAAA")], &chunking(8, 2), &reset())
        .await;

    assert!(matches!(
        result,
        Err(RagError::LengthMismatch {
            expected: DIMENSION,
            actual: 4,
            ..
        })
    ));
    assert!(store.is_empty());
}

#[tokio::test]
async fn reset_replaces_the_previous_corpus() {
    let (indexer, store) = create_test_indexer(Arc::new(LetterEmbedder));

    indexer
        .ingest(
            &[Document::new("old.md", "AAAABBBBCCCCDDDD")],
            &chunking(4, 0),
            &reset(),
        )
        .await
        .expect("first ingestion should succeed");
    assert_eq!(store.len(), 4);

    indexer
        .ingest(&[Document::new("new.md", "CCCC")], &chunking(4, 0), &reset())
        .await
        .expect("second ingestion should succeed");

    assert_eq!(store.len(), 1);
    assert_eq!(store.get("doc:0").expect("doc:0 should exist").text, "CCCC");
}

#[tokio::test]
async fn without_reset_records_accumulate() {
    let (indexer, store) = create_test_indexer(Arc::new(LetterEmbedder));
    let options = IngestOptions::default();

    indexer
        .ingest(&[Document::new("a.md", "AAAA")], &chunking(4, 0), &reset())
        .await
        .expect("first ingestion should succeed");
    indexer
        .ingest(&[Document::new("b.md", "AAAACCCC")], &chunking(4, 0), &options)
        .await
        .expect("second ingestion should succeed");

    // doc:0 was overwritten, doc:1 is new
    assert_eq!(store.len(), 2);
    assert_eq!(store.get("doc:0").expect("doc:0 should exist").text, "AAAA");
    assert_eq!(store.get("doc:1").expect("doc:1 should exist").text, "CCCC");
}

#[tokio::test]
async fn memory_keyspace_accepts_writes_without_index() {
    let (indexer, _store) = create_test_indexer(Arc::new(LetterEmbedder));

    let report = indexer
        .ingest(
            &[Document::new("a.md", "AAAA")],
            &chunking(4, 0),
            &IngestOptions::default(),
        )
        .await
        .expect("ingestion should succeed");

    // The memory keyspace accepts writes without an index
    assert_eq!(report.records_written, 1);
}

#[tokio::test]
async fn concurrency_is_bounded() {
    let embedder = Arc::new(GaugedEmbedder::default());
    let (indexer, store) = create_test_indexer(Arc::clone(&embedder) as Arc<dyn Embedder>);
    let text = "x".repeat(40);

    let report = indexer
        .ingest(
            &[Document::new("a.md", text)],
            &chunking(4, 0),
            &IngestOptions {
                reset: true,
                concurrency: 3,
            },
        )
        .await
        .expect("ingestion should succeed");

    assert_eq!(report.records_written, 10);
    assert_eq!(store.len(), 10);
    let peak = embedder.peak.load(Ordering::SeqCst);
    assert!(peak > 1 && peak <= 3, "peak concurrency was {peak}");
}

#[tokio::test]
async fn invalid_parameters_are_rejected() {
    let (indexer, _store) = create_test_indexer(Arc::new(LetterEmbedder));
    let documents = [Document::new("a.md", "AAAA")];

    let bad_chunking = ChunkingConfig {
        chunk_size: 4,
        overlap: 4,
    };
    assert!(matches!(
        indexer
            .ingest(&documents, &bad_chunking, &IngestOptions::default())
            .await,
        Err(RagError::InvalidParameter(_))
    ));

    let bad_options = IngestOptions {
        reset: false,
        concurrency: 0,
    };
    assert!(matches!(
        indexer
            .ingest(&documents, &chunking(4, 0), &bad_options)
            .await,
        Err(RagError::InvalidParameter(_))
    ));
}

#[tokio::test]
async fn empty_corpus_writes_nothing() {
    let (indexer, store) = create_test_indexer(Arc::new(LetterEmbedder));

    let report = indexer
        .ingest(&[Document::new("empty.md", "")], &chunking(8, 2), &reset())
        .await
        .expect("ingestion should succeed");

    assert_eq!(report.documents, 1);
    assert_eq!(report.chunks, 0);
    assert_eq!(report.records_written, 0);
    assert!(store.is_empty());
}

#[tokio::test]
async fn ingest_directory_then_retrieve() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    std::fs::write(temp_dir.path().join("a.md"), "AAAAAAAA").expect("should write file");
    std::fs::write(temp_dir.path().join("c.md"), "CCCCCCCC").expect("should write file");
    std::fs::write(temp_dir.path().join("skip.txt"), "AAAA").expect("should write file");

    let (indexer, store) = create_test_indexer(Arc::new(LetterEmbedder));
    let report = indexer
        .ingest_directory(temp_dir.path(), "md", &chunking(8, 2), &reset())
        .await
        .expect("ingestion should succeed");
    assert_eq!(report.documents, 2);
    assert_eq!(report.records_written, 2);

    let retriever = Retriever::new(store, Arc::new(LetterEmbedder), test_schema());
    let result = retriever
        .retrieve("CCCCCCCC", 5)
        .await
        .expect("retrieval should succeed");
    assert_eq!(result.len(), 2);
    assert_eq!(result.matches[0].text, "CCCCCCCC");
    assert_eq!(result.matches[0].distance, 0.0);
}
