use super::*;
use tempfile::TempDir;

fn test_document(id: &str, source_id: &str, vector: Vec<f32>) -> IndexedDocument {
    IndexedDocument {
        id: id.to_string(),
        text: format!("Document body for {id}"),
        vector,
        metadata: PatternMetadata {
            source_id: source_id.to_string(),
            ingested_at: "2026-01-01T00:00:00Z".to_string(),
        },
    }
}

#[tokio::test]
async fn connect_does_not_create_collection() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let mut store = VectorStore::connect(temp_dir.path(), "patterns")
        .await
        .expect("should connect");

    assert_eq!(store.collection(), "patterns");
    assert!(matches!(
        store.open_collection().await,
        Err(PatternError::CollectionMissing(_))
    ));
}

#[tokio::test]
async fn reset_on_missing_collection_is_noop() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut store = VectorStore::connect(temp_dir.path(), "patterns")
        .await
        .expect("should connect");

    store.reset().await.expect("reset should tolerate absence");
}

#[tokio::test]
async fn ensure_then_open_round_trip() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut store = VectorStore::connect(temp_dir.path(), "patterns")
        .await
        .expect("should connect");

    store
        .ensure_collection(4)
        .await
        .expect("should create collection");
    store
        .open_collection()
        .await
        .expect("should open existing collection");
    assert_eq!(store.count().await.expect("should count"), 0);
}

#[tokio::test]
async fn empty_collection_returns_empty_results() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut store = VectorStore::connect(temp_dir.path(), "patterns")
        .await
        .expect("should connect");
    store
        .ensure_collection(4)
        .await
        .expect("should create collection");

    let matches = store
        .query(&[1.0, 0.0, 0.0, 0.0], 3)
        .await
        .expect("query on empty collection should succeed");

    assert!(matches.is_empty());
}

#[tokio::test]
async fn upsert_and_query_ordering() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut store = VectorStore::connect(temp_dir.path(), "patterns")
        .await
        .expect("should connect");
    store
        .ensure_collection(4)
        .await
        .expect("should create collection");

    let documents = vec![
        test_document("pattern_1_1", "pattern_1", vec![1.0, 0.0, 0.0, 0.0]),
        test_document("pattern_2_2", "pattern_2", vec![0.0, 1.0, 0.0, 0.0]),
        test_document("pattern_3_3", "pattern_3", vec![0.9, 0.1, 0.0, 0.0]),
    ];
    store.upsert(&documents).await.expect("should upsert");

    let matches = store
        .query(&[1.0, 0.0, 0.0, 0.0], 3)
        .await
        .expect("query should succeed");

    assert_eq!(matches.len(), 3);
    assert_eq!(matches[0].metadata.source_id, "pattern_1");
    for pair in matches.windows(2) {
        assert!(
            pair[0].distance <= pair[1].distance,
            "matches should be ordered by ascending distance"
        );
    }
}

#[tokio::test]
async fn query_truncates_to_top_k() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut store = VectorStore::connect(temp_dir.path(), "patterns")
        .await
        .expect("should connect");
    store
        .ensure_collection(4)
        .await
        .expect("should create collection");

    let documents: Vec<IndexedDocument> = (0..5)
        .map(|index| {
            let mut vector = vec![0.0f32; 4];
            vector[index % 4] = 1.0;
            test_document(
                &format!("pattern_{index}_{}", index + 1),
                &format!("pattern_{index}"),
                vector,
            )
        })
        .collect();
    store.upsert(&documents).await.expect("should upsert");

    let matches = store
        .query(&[1.0, 0.0, 0.0, 0.0], 2)
        .await
        .expect("query should succeed");

    assert_eq!(matches.len(), 2);
}

#[tokio::test]
async fn underfull_collection_returns_all_members() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut store = VectorStore::connect(temp_dir.path(), "patterns")
        .await
        .expect("should connect");
    store
        .ensure_collection(4)
        .await
        .expect("should create collection");

    let documents = vec![test_document("pattern_1_1", "pattern_1", vec![0.5, 0.5, 0.5, 0.5])];
    store.upsert(&documents).await.expect("should upsert");

    let matches = store
        .query(&[1.0, 0.0, 0.0, 0.0], 10)
        .await
        .expect("query should succeed");

    assert_eq!(matches.len(), 1);
}

#[tokio::test]
async fn reset_empties_the_store() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut store = VectorStore::connect(temp_dir.path(), "patterns")
        .await
        .expect("should connect");
    store
        .ensure_collection(4)
        .await
        .expect("should create collection");
    store
        .upsert(&[test_document("pattern_1_1", "pattern_1", vec![1.0, 0.0, 0.0, 0.0])])
        .await
        .expect("should upsert");

    store.reset().await.expect("reset should succeed");

    assert!(matches!(
        store.open_collection().await,
        Err(PatternError::CollectionMissing(_))
    ));
}

#[tokio::test]
async fn ensure_collection_recreates_empty_on_dimension_change() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut store = VectorStore::connect(temp_dir.path(), "patterns")
        .await
        .expect("should connect");

    store
        .ensure_collection(DEFAULT_VECTOR_DIMENSION)
        .await
        .expect("should create collection");
    store
        .ensure_collection(4)
        .await
        .expect("empty collection should be recreated at the new width");

    store
        .upsert(&[test_document("pattern_1_1", "pattern_1", vec![1.0, 0.0, 0.0, 0.0])])
        .await
        .expect("should upsert at the new width");
}

#[tokio::test]
async fn ensure_collection_rejects_dimension_change_with_data() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut store = VectorStore::connect(temp_dir.path(), "patterns")
        .await
        .expect("should connect");
    store
        .ensure_collection(4)
        .await
        .expect("should create collection");
    store
        .upsert(&[test_document("pattern_1_1", "pattern_1", vec![1.0, 0.0, 0.0, 0.0])])
        .await
        .expect("should upsert");

    assert!(matches!(
        store.ensure_collection(8).await,
        Err(PatternError::Database(_))
    ));
}

#[tokio::test]
async fn upsert_rejects_mismatched_vector_width() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut store = VectorStore::connect(temp_dir.path(), "patterns")
        .await
        .expect("should connect");
    store
        .ensure_collection(4)
        .await
        .expect("should create collection");

    let result = store
        .upsert(&[test_document("pattern_1_1", "pattern_1", vec![1.0, 0.0])])
        .await;

    assert!(matches!(result, Err(PatternError::Database(_))));
}
