// Ingestion pipeline
// Reads the pattern catalog, segments it into records, embeds every
// document text in one batch, and stores the results in the vector
// collection.

#[cfg(test)]
mod tests;

use std::path::Path;

use chrono::Utc;
use tracing::{info, warn};

use crate::database::lancedb::vector_store::{DEFAULT_VECTOR_DIMENSION, VectorStore};
use crate::database::lancedb::{IndexedDocument, PatternMetadata};
use crate::embeddings::Embedder;
use crate::parser::{self, FallbackParser, PatternRecord};
use crate::{PatternError, Result};

/// Separator between a record's description and its code blocks.
const CODE_SEPARATOR: &str = "\n\n---CODE---\n\n";
/// Separator between consecutive code blocks.
const BLOCK_SEPARATOR: &str = "\n\n---\n\n";

const PREVIEW_DOCUMENTS: usize = 3;
const PREVIEW_CHARS: usize = 500;

/// Outcome of one ingestion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    /// Header lines counted independently of parsing
    pub header_count: usize,
    /// Records produced by segmentation (after any fallback)
    pub record_count: usize,
    /// Documents actually written to the collection
    pub documents_added: usize,
    /// Whether the fallback parser replaced the quick parse
    pub used_fallback: bool,
    /// Excerpts of the first few document texts, for display
    pub previews: Vec<DocumentPreview>,
}

/// Short excerpt of one document text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPreview {
    pub excerpt: String,
    pub total_chars: usize,
}

/// Document text plus ids, ready for embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentDraft {
    /// Unique id: the record id suffixed with its 1-based position
    pub id: String,
    /// The record's own (non-unique) id, kept as metadata
    pub source_id: String,
    /// Description and code blocks joined for embedding
    pub text: String,
}

/// Run the quick parser and swap in the fallback when its record count
/// disagrees with the independent header count.
#[inline]
pub fn segment_with_fallback(
    text: &str,
    fallback: &dyn FallbackParser,
) -> (Vec<PatternRecord>, bool) {
    let records = parser::quick_parse(text);
    let expected = parser::header_count(text);
    reconcile(records, expected, text, fallback)
}

/// Confidence check for the quick parse: a record count that does not
/// match the header count means the parse failed silently, and the
/// fallback output replaces it entirely (no merge).
fn reconcile(
    records: Vec<PatternRecord>,
    expected: usize,
    text: &str,
    fallback: &dyn FallbackParser,
) -> (Vec<PatternRecord>, bool) {
    if records.len() == expected {
        info!(
            "Quick parse produced {} records (headers: {expected})",
            records.len()
        );
        return (records, false);
    }

    warn!(
        "Quick parse incomplete ({} records for {expected} headers); using fallback parser",
        records.len()
    );
    let records = fallback.parse(text);
    info!("Fallback parser produced {} records", records.len());
    (records, true)
}

/// Build one draft per record.
///
/// The document text is the description joined to the code blocks with
/// a `---CODE---` separator; whichever part is missing is dropped, and
/// a record with neither yields an empty string. The unique id combines
/// the record id with its 1-based position so repeated catalog ids
/// cannot collide in the collection.
#[inline]
pub fn build_documents(records: &[PatternRecord]) -> Vec<DocumentDraft> {
    records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            let position = index + 1;
            let source_id = if record.id.is_empty() {
                format!("pattern_{position}")
            } else {
                record.id.clone()
            };

            let code = record.code_blocks.join(BLOCK_SEPARATOR);
            let description = record.description.trim();
            let text = if description.is_empty() {
                code
            } else if code.is_empty() {
                description.to_string()
            } else {
                format!("{description}{CODE_SEPARATOR}{code}")
            };

            DocumentDraft {
                id: format!("{source_id}_{position}"),
                source_id,
                text,
            }
        })
        .collect()
}

/// Ingest `source_file` into the store.
///
/// A catalog that yields no records completes successfully with zero
/// documents added; only a missing source file or component failure is
/// an error. With `reset` set, the existing collection is dropped
/// before anything is fetched or created, so the run always starts
/// from an empty collection.
#[inline]
pub async fn run<E: Embedder>(
    source_file: &Path,
    store: &mut VectorStore,
    embedder: &mut E,
    fallback: &dyn FallbackParser,
    reset: bool,
) -> Result<IngestReport> {
    if !source_file.is_file() {
        return Err(PatternError::Config(format!(
            "Source file not found: {}",
            source_file.display()
        )));
    }
    let text = std::fs::read_to_string(source_file)?;

    let header_count = parser::header_count(&text);
    let (records, used_fallback) = segment_with_fallback(&text, fallback);
    let record_count = records.len();
    let drafts = build_documents(&records);

    if reset {
        store.reset().await?;
    }

    if drafts.is_empty() {
        info!("No texts found to ingest; finishing as a no-op");
        if !store.exists().await? {
            store.ensure_collection(DEFAULT_VECTOR_DIMENSION).await?;
        }
        return Ok(IngestReport {
            header_count,
            record_count,
            documents_added: 0,
            used_fallback,
            previews: Vec::new(),
        });
    }

    let previews = drafts
        .iter()
        .take(PREVIEW_DOCUMENTS)
        .map(|draft| DocumentPreview {
            excerpt: draft.text.chars().take(PREVIEW_CHARS).collect(),
            total_chars: draft.text.chars().count(),
        })
        .collect();

    let texts: Vec<String> = drafts.iter().map(|draft| draft.text.clone()).collect();
    info!("Computing embeddings for {} documents", texts.len());
    let embeddings = embedder.encode(&texts)?;
    if embeddings.len() != drafts.len() {
        return Err(PatternError::Embedding(format!(
            "Embedder returned {} vectors for {} documents",
            embeddings.len(),
            drafts.len()
        )));
    }

    let dimension = embeddings.first().map_or(DEFAULT_VECTOR_DIMENSION, Vec::len);
    store.ensure_collection(dimension).await?;

    let ingested_at = Utc::now().to_rfc3339();
    let documents: Vec<IndexedDocument> = drafts
        .into_iter()
        .zip(embeddings)
        .map(|(draft, vector)| IndexedDocument {
            id: draft.id,
            text: draft.text,
            vector,
            metadata: PatternMetadata {
                source_id: draft.source_id,
                ingested_at: ingested_at.clone(),
            },
        })
        .collect();

    store.upsert(&documents).await?;
    info!(
        "Ingestion complete: {} documents added to '{}'",
        documents.len(),
        store.collection()
    );

    Ok(IngestReport {
        header_count,
        record_count,
        documents_added: documents.len(),
        used_fallback,
        previews,
    })
}
