#[cfg(test)]
mod tests;

use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection, Table,
    query::{ExecutableQuery, QueryBase},
};
use tracing::{debug, info, warn};

use super::{IndexedDocument, PatternMatch, PatternMetadata};
use crate::{PatternError, Result};

/// Vector width used when a collection has to exist before any
/// embeddings have been computed (matches the MiniLM-L6 hidden size).
pub const DEFAULT_VECTOR_DIMENSION: usize = 384;

/// Adapter over a named LanceDB table holding
/// `(id, text, vector, source_id, ingested_at)` rows.
///
/// The adapter does no locking; callers serialize ingestion against
/// queries at the process level.
pub struct VectorStore {
    connection: Connection,
    collection: String,
    vector_dimension: Option<usize>,
}

impl VectorStore {
    /// Connect to the store directory without touching the collection
    /// itself.
    #[inline]
    pub async fn connect(persist_dir: &Path, collection: &str) -> Result<Self> {
        std::fs::create_dir_all(persist_dir).map_err(|e| {
            PatternError::Database(format!("Failed to create store directory: {e}"))
        })?;

        let uri = format!("file://{}", persist_dir.display());
        debug!("Connecting to LanceDB at {uri}");

        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| PatternError::Database(format!("Failed to connect to LanceDB: {e}")))?;

        Ok(Self {
            connection,
            collection: collection.to_string(),
            vector_dimension: None,
        })
    }

    /// Name of the collection this store operates on.
    #[inline]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Whether the collection currently exists.
    #[inline]
    pub async fn exists(&self) -> Result<bool> {
        self.collection_exists().await
    }

    /// Drop the collection if it exists; absence is a no-op.
    #[inline]
    pub async fn reset(&mut self) -> Result<()> {
        if !self.collection_exists().await? {
            debug!("Collection '{}' absent; nothing to reset", self.collection);
            return Ok(());
        }

        self.connection
            .drop_table(&self.collection)
            .await
            .map_err(|e| PatternError::Database(format!("Failed to drop collection: {e}")))?;
        self.vector_dimension = None;

        info!("Existing collection '{}' deleted (reset)", self.collection);
        Ok(())
    }

    /// Create the collection for `dimension`-wide vectors, or adopt an
    /// existing one. An existing non-empty collection with a different
    /// vector width is rejected rather than silently mixed; an empty
    /// one is recreated with the requested width.
    #[inline]
    pub async fn ensure_collection(&mut self, dimension: usize) -> Result<()> {
        if self.collection_exists().await? {
            let existing = self.detect_vector_dimension().await?;
            if existing != dimension {
                if self.count().await? == 0 {
                    warn!(
                        "Recreating empty collection '{}' ({existing} -> {dimension} dimensions)",
                        self.collection
                    );
                    self.connection
                        .drop_table(&self.collection)
                        .await
                        .map_err(|e| {
                            PatternError::Database(format!("Failed to drop collection: {e}"))
                        })?;
                    return self.create_collection(dimension).await;
                }
                return Err(PatternError::Database(format!(
                    "Collection '{}' holds {existing}-dimensional vectors but the embedder produces {dimension}",
                    self.collection
                )));
            }
            self.vector_dimension = Some(existing);
            return Ok(());
        }

        self.create_collection(dimension).await
    }

    /// Open the collection for querying. A missing collection means
    /// ingestion has never run, reported distinctly from an empty one.
    #[inline]
    pub async fn open_collection(&mut self) -> Result<()> {
        if !self.collection_exists().await? {
            return Err(PatternError::CollectionMissing(self.collection.clone()));
        }

        let dimension = self.detect_vector_dimension().await?;
        self.vector_dimension = Some(dimension);
        debug!(
            "Opened collection '{}' ({dimension} dimensions)",
            self.collection
        );
        Ok(())
    }

    /// Append documents to the collection. Empty input is a no-op.
    /// Ids are expected to be unique already; the ingestion pipeline
    /// guarantees that with positional suffixes.
    #[inline]
    pub async fn upsert(&mut self, documents: &[IndexedDocument]) -> Result<()> {
        if documents.is_empty() {
            debug!("No documents to store");
            return Ok(());
        }

        let vector_dim = self.vector_dimension.ok_or_else(|| {
            PatternError::Database("Collection not initialized before upsert".to_string())
        })?;

        let record_batch = Self::create_record_batch(documents, vector_dim)?;
        let table = self.open_table().await?;

        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| PatternError::Database(format!("Failed to insert documents: {e}")))?;

        info!(
            "Stored {} documents in collection '{}'",
            documents.len(),
            self.collection
        );
        Ok(())
    }

    /// Nearest documents to `vector` by ascending distance, at most
    /// `top_k`. An empty or underfull collection returns whatever
    /// exists, never an error.
    #[inline]
    pub async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<PatternMatch>> {
        debug!("Searching collection '{}' (top_k: {top_k})", self.collection);

        let table = self.open_table().await?;
        let mut stream = table
            .vector_search(vector)
            .map_err(|e| PatternError::Database(format!("Failed to build vector search: {e}")))?
            .column("vector")
            .limit(top_k)
            .execute()
            .await
            .map_err(|e| PatternError::Database(format!("Failed to execute search: {e}")))?;

        let mut matches = Vec::new();
        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(|e| PatternError::Database(format!("Failed to read result stream: {e}")))?
        {
            matches.extend(Self::parse_search_batch(&batch)?);
        }

        debug!("Search returned {} matches", matches.len());
        Ok(matches)
    }

    /// Total number of documents in the collection.
    #[inline]
    pub async fn count(&self) -> Result<u64> {
        let table = self.open_table().await?;
        let count = table
            .count_rows(None)
            .await
            .map_err(|e| PatternError::Database(format!("Failed to count rows: {e}")))?;

        Ok(count as u64)
    }

    async fn create_collection(&mut self, dimension: usize) -> Result<()> {
        let schema = Self::collection_schema(dimension);
        self.connection
            .create_empty_table(&self.collection, schema)
            .execute()
            .await
            .map_err(|e| PatternError::Database(format!("Failed to create collection: {e}")))?;

        self.vector_dimension = Some(dimension);
        info!(
            "Created collection '{}' ({dimension} dimensions)",
            self.collection
        );
        Ok(())
    }

    async fn collection_exists(&self) -> Result<bool> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| PatternError::Database(format!("Failed to list collections: {e}")))?;

        Ok(table_names.contains(&self.collection))
    }

    async fn open_table(&self) -> Result<Table> {
        self.connection
            .open_table(&self.collection)
            .execute()
            .await
            .map_err(|e| PatternError::Database(format!("Failed to open collection: {e}")))
    }

    /// Read the vector width recorded in the collection schema.
    async fn detect_vector_dimension(&self) -> Result<usize> {
        let table = self.open_table().await?;
        let schema = table
            .schema()
            .await
            .map_err(|e| PatternError::Database(format!("Failed to read schema: {e}")))?;

        for field in schema.fields() {
            if field.name() == "vector" {
                if let DataType::FixedSizeList(_, size) = field.data_type() {
                    return usize::try_from(*size).map_err(|_| {
                        PatternError::Database("Invalid vector dimension in schema".to_string())
                    });
                }
            }
        }

        Err(PatternError::Database(
            "Could not find vector column or determine dimension".to_string(),
        ))
    }

    fn collection_schema(vector_dim: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    vector_dim as i32,
                ),
                false,
            ),
            Field::new("text", DataType::Utf8, false),
            Field::new("source_id", DataType::Utf8, false),
            Field::new("ingested_at", DataType::Utf8, false),
        ]))
    }

    fn create_record_batch(
        documents: &[IndexedDocument],
        vector_dim: usize,
    ) -> Result<RecordBatch> {
        let len = documents.len();

        let mut ids = Vec::with_capacity(len);
        let mut texts = Vec::with_capacity(len);
        let mut source_ids = Vec::with_capacity(len);
        let mut ingested_ats = Vec::with_capacity(len);
        let mut flat_values = Vec::with_capacity(len * vector_dim);

        for document in documents {
            if document.vector.len() != vector_dim {
                return Err(PatternError::Database(format!(
                    "Document '{}' has a {}-dimensional vector, expected {vector_dim}",
                    document.id,
                    document.vector.len()
                )));
            }
            ids.push(document.id.as_str());
            texts.push(document.text.as_str());
            source_ids.push(document.metadata.source_id.as_str());
            ingested_ats.push(document.metadata.ingested_at.as_str());
            flat_values.extend_from_slice(&document.vector);
        }

        let values_array = Float32Array::from(flat_values);
        let item_field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array = FixedSizeListArray::try_new(
            item_field,
            vector_dim as i32,
            Arc::new(values_array),
            None,
        )
        .map_err(|e| PatternError::Database(format!("Failed to create vector array: {e}")))?;

        let schema = Self::collection_schema(vector_dim);
        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(texts)),
            Arc::new(StringArray::from(source_ids)),
            Arc::new(StringArray::from(ingested_ats)),
        ];

        RecordBatch::try_new(schema, arrays)
            .map_err(|e| PatternError::Database(format!("Failed to create record batch: {e}")))
    }

    fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<PatternMatch>> {
        let num_rows = batch.num_rows();

        let texts = batch
            .column_by_name("text")
            .ok_or_else(|| PatternError::Database("Missing text column".to_string()))?
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| PatternError::Database("Invalid text column type".to_string()))?;

        let source_ids = batch
            .column_by_name("source_id")
            .ok_or_else(|| PatternError::Database("Missing source_id column".to_string()))?
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| PatternError::Database("Invalid source_id column type".to_string()))?;

        let ingested_ats = batch
            .column_by_name("ingested_at")
            .ok_or_else(|| PatternError::Database("Missing ingested_at column".to_string()))?
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| {
                PatternError::Database("Invalid ingested_at column type".to_string())
            })?;

        let distances = batch
            .column_by_name("_distance")
            .map(|column| column.as_any().downcast_ref::<Float32Array>());

        let mut matches = Vec::with_capacity(num_rows);
        for row in 0..num_rows {
            let distance = distances
                .flatten()
                .map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

            matches.push(PatternMatch {
                text: texts.value(row).to_string(),
                metadata: PatternMetadata {
                    source_id: source_ids.value(row).to_string(),
                    ingested_at: ingested_ats.value(row).to_string(),
                },
                distance,
            });
        }

        Ok(matches)
    }
}
