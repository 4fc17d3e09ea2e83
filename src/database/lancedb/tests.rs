use super::*;

#[test]
fn indexed_document_structure() {
    let document = IndexedDocument {
        id: "pattern_3_1".to_string(),
        text: "Observer pattern\n\n---CODE---\n\nsubject.notify()".to_string(),
        vector: vec![0.1, 0.2, 0.3],
        metadata: PatternMetadata {
            source_id: "pattern_3".to_string(),
            ingested_at: "2026-01-01T00:00:00Z".to_string(),
        },
    };

    assert_eq!(document.id, "pattern_3_1");
    assert_eq!(document.vector.len(), 3);
    assert_eq!(document.metadata.source_id, "pattern_3");
}

#[test]
fn pattern_metadata_serialization() {
    let metadata = PatternMetadata {
        source_id: "pattern_9".to_string(),
        ingested_at: "2026-01-01T00:00:00Z".to_string(),
    };

    let json = serde_json::to_string(&metadata).expect("can serialize json");
    let deserialized: PatternMetadata = serde_json::from_str(&json).expect("can parse json");

    assert_eq!(metadata, deserialized);
}
