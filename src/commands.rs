use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use crate::answerer::{self, Answer, OpenRouterClient};
use crate::config::{GenerationConfig, ModelConfig};
use crate::database::lancedb::VectorStore;
use crate::embeddings::OnnxEncoder;
use crate::ingest;
use crate::parser::StubParser;
use crate::retriever;

/// Ingest a pattern catalog into the vector collection.
///
/// Returns the number of documents added, or `None` when the catalog
/// produced nothing to ingest (a successful no-op).
#[inline]
pub async fn ingest_patterns(
    source_file: &Path,
    persist_dir: &Path,
    collection: &str,
    reset: bool,
    model: &ModelConfig,
) -> Result<Option<usize>> {
    info!("Ingesting pattern catalog: {}", source_file.display());

    let mut store = VectorStore::connect(persist_dir, collection)
        .await
        .context("Failed to open vector store")?;

    println!("Loading embedding model from {}...", model.model_dir.display());
    let mut encoder = OnnxEncoder::load(model).context("Failed to load embedding model")?;

    let report = ingest::run(source_file, &mut store, &mut encoder, &StubParser, reset)
        .await
        .context("Ingestion failed")?;

    if report.used_fallback {
        println!(
            "Quick parse incomplete; the fallback parser produced {} patterns.",
            report.record_count
        );
    } else {
        println!(
            "Quick parsed {} patterns (headers: {}).",
            report.record_count, report.header_count
        );
    }

    if report.documents_added == 0 {
        println!("No texts found to ingest. Exiting.");
        return Ok(None);
    }

    println!("Previewing first {} extracted texts:", report.previews.len());
    for (index, preview) in report.previews.iter().enumerate() {
        println!(
            "--- Doc {} (len={} chars) ---",
            index + 1,
            preview.total_chars
        );
        println!("{}", preview.excerpt);
        println!("...");
    }

    println!(
        "Done. {} documents added to collection '{collection}' in {}.",
        report.documents_added,
        persist_dir.display()
    );

    Ok(Some(report.documents_added))
}

/// Search the collection and print the nearest patterns.
#[inline]
pub async fn query_patterns(
    query: &str,
    top_k: usize,
    persist_dir: &Path,
    collection: &str,
    model: &ModelConfig,
) -> Result<()> {
    let mut store = VectorStore::connect(persist_dir, collection)
        .await
        .context("Failed to open vector store")?;
    store
        .open_collection()
        .await
        .context("Failed to open collection")?;

    let mut encoder = OnnxEncoder::load(model).context("Failed to load embedding model")?;
    let hits = retriever::query_patterns(&mut encoder, &store, query, top_k)
        .await
        .context("Retrieval failed")?;

    println!("\nTop {top_k} results for query: '{query}'\n");

    if hits.is_empty() {
        println!("No documents matched the query.");
        return Ok(());
    }

    for (index, hit) in hits.iter().enumerate() {
        println!("Result {}:", index + 1);
        println!(
            "Source: {} (distance: {:.4})",
            hit.metadata.source_id, hit.distance
        );
        let preview: String = hit.text.chars().take(300).collect();
        println!("Text preview: {preview}");
        println!("{}", "-".repeat(40));
    }

    Ok(())
}

/// Retrieve the best match for `query` and explain it with generated
/// code.
#[inline]
pub async fn answer_query(
    query: &str,
    top_k: usize,
    persist_dir: &Path,
    collection: &str,
    model: &ModelConfig,
    generation: &GenerationConfig,
) -> Result<Answer> {
    let mut store = VectorStore::connect(persist_dir, collection)
        .await
        .context("Failed to open vector store")?;
    store
        .open_collection()
        .await
        .context("Failed to open collection")?;

    let mut encoder = OnnxEncoder::load(model).context("Failed to load embedding model")?;
    let hits = retriever::query_patterns(&mut encoder, &store, query, top_k)
        .await
        .context("Retrieval failed")?;

    let client = OpenRouterClient::new(generation)
        .context("Failed to initialize generation client")?;
    let answer = answerer::generate_answer(query, hits.first(), &client)
        .context("Answer generation failed")?;

    println!("\n=== Final Answer ===\n");
    println!("{}", answer.explanation);
    if !answer.code.is_empty() {
        println!("\n--- Example code ---\n");
        println!("{}", answer.code);
    }

    Ok(answer)
}
