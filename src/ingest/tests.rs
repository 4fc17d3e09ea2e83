use super::*;
use std::cell::Cell;

struct CountingFallback {
    calls: Cell<usize>,
    records: Vec<PatternRecord>,
}

impl CountingFallback {
    fn returning(records: Vec<PatternRecord>) -> Self {
        Self {
            calls: Cell::new(0),
            records,
        }
    }
}

impl FallbackParser for CountingFallback {
    fn parse(&self, _text: &str) -> Vec<PatternRecord> {
        self.calls.set(self.calls.get() + 1);
        self.records.clone()
    }
}

fn record(id: &str, description: &str, code_blocks: &[&str]) -> PatternRecord {
    PatternRecord {
        id: id.to_string(),
        description: description.to_string(),
        code_blocks: code_blocks.iter().map(|block| block.to_string()).collect(),
    }
}

#[test]
fn matching_counts_keep_quick_parse() {
    let fallback = CountingFallback::returning(vec![record("pattern_9", "unused", &[])]);
    let catalog = "# 1\n'''Adds two numbers'''\n\"\"\"return a+b\"\"\"\n";

    let (records, used_fallback) = segment_with_fallback(catalog, &fallback);

    assert!(!used_fallback);
    assert_eq!(fallback.calls.get(), 0);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, "pattern_1");
}

#[test]
fn count_mismatch_replaces_output_with_fallback() {
    let replacement = vec![record("pattern_5", "from fallback", &[])];
    let fallback = CountingFallback::returning(replacement.clone());
    let parsed = vec![record("pattern_1", "quick", &[]), record("pattern_2", "quick", &[])];

    // Three headers expected but only two records parsed.
    let (records, used_fallback) = reconcile(parsed, 3, "irrelevant", &fallback);

    assert!(used_fallback);
    assert_eq!(fallback.calls.get(), 1);
    assert_eq!(records, replacement);
}

#[test]
fn fallback_output_is_not_merged() {
    let fallback = CountingFallback::returning(Vec::new());
    let parsed = vec![record("pattern_1", "quick", &[])];

    let (records, used_fallback) = reconcile(parsed, 2, "irrelevant", &fallback);

    assert!(used_fallback);
    assert!(records.is_empty(), "quick-parse records must be discarded");
}

#[test]
fn build_documents_joins_description_and_code() {
    let records = vec![record(
        "pattern_7",
        "Adds two numbers",
        &["return a+b", "return sum(values)"],
    )];

    let drafts = build_documents(&records);

    assert_eq!(drafts.len(), 1);
    assert_eq!(drafts[0].id, "pattern_7_1");
    assert_eq!(drafts[0].source_id, "pattern_7");
    assert_eq!(
        drafts[0].text,
        "Adds two numbers\n\n---CODE---\n\nreturn a+b\n\n---\n\nreturn sum(values)"
    );
}

#[test]
fn build_documents_with_description_only() {
    let records = vec![record("pattern_2", "Just a description", &[])];

    let drafts = build_documents(&records);

    assert_eq!(drafts[0].text, "Just a description");
}

#[test]
fn build_documents_with_code_only() {
    let records = vec![record("pattern_3", "", &["lonely_code()"])];

    let drafts = build_documents(&records);

    assert_eq!(drafts[0].text, "lonely_code()");
}

#[test]
fn build_documents_with_nothing_yields_empty_text() {
    let records = vec![record("pattern_4", "", &[])];

    let drafts = build_documents(&records);

    assert_eq!(drafts[0].text, "");
}

#[test]
fn duplicate_catalog_ids_get_distinct_document_ids() {
    let records = vec![
        record("pattern_1", "first", &[]),
        record("pattern_1", "second", &[]),
    ];

    let drafts = build_documents(&records);

    assert_eq!(drafts[0].id, "pattern_1_1");
    assert_eq!(drafts[1].id, "pattern_1_2");
    assert_eq!(drafts[0].source_id, drafts[1].source_id);
}

#[test]
fn missing_record_id_falls_back_to_position() {
    let records = vec![record("", "anonymous", &[])];

    let drafts = build_documents(&records);

    assert_eq!(drafts[0].id, "pattern_1_1");
    assert_eq!(drafts[0].source_id, "pattern_1");
}
