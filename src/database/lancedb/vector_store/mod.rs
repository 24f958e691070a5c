
use super::{ChunkMetadata, EmbeddingRecord, QueryMatch};
use crate::embeddings::EmbeddingFunction;
use crate::{RagError, config::Config};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection,
    query::{ExecutableQuery, QueryBase},
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Named, persistent collection of chunks and their embeddings.
///
/// Texts are embedded by the collection's own [`EmbeddingFunction`] on write
/// and on query, so callers only ever deal with text.
pub struct VectorStore {
    connection: Connection,
    table_name: String,
    vector_dimension: Option<usize>,
    embedder: Arc<dyn EmbeddingFunction>,
}

impl VectorStore {
    /// Open the collection configured in `config`, creating it if needed
    #[inline]
    pub async fn new(
        config: &Config,
        embedder: Arc<dyn EmbeddingFunction>,
    ) -> Result<Self, RagError> {
        Self::open(
            &config.vector_database_path(),
            &config.store.collection_name,
            config.gemini.embedding_dimension as usize,
            embedder,
        )
        .await
    }

    /// Open or create the collection `table_name` in the database at `db_path`.
    ///
    /// `default_dimension` is only used when the collection has to be created;
    /// an existing collection keeps the dimension of its vector column.
    #[inline]
    pub async fn open(
        db_path: &Path,
        table_name: &str,
        default_dimension: usize,
        embedder: Arc<dyn EmbeddingFunction>,
    ) -> Result<Self, RagError> {
        debug!("Initializing LanceDB at path: {}", db_path.display());

        std::fs::create_dir_all(db_path).map_err(|e| {
            RagError::Database(format!("Failed to create vector database directory: {}", e))
        })?;

        let uri = db_path.to_string_lossy();
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to connect to LanceDB: {}", e)))?;

        let mut store = Self {
            connection,
            table_name: table_name.to_string(),
            vector_dimension: None,
            embedder,
        };

        store.initialize_table(default_dimension).await?;

        info!("Collection '{}' ready", store.table_name);
        Ok(store)
    }

    /// Name of the collection
    #[inline]
    pub fn name(&self) -> &str {
        &self.table_name
    }

    /// Dimension of the vectors stored in the collection
    #[inline]
    pub fn vector_dimension(&self) -> Option<usize> {
        self.vector_dimension
    }

    /// Initialize the collection table with the correct schema
    async fn initialize_table(&mut self, default_dimension: usize) -> Result<(), RagError> {
        if self.table_exists().await? {
            debug!("Collection table already exists, detecting vector dimension");
            let dim = self.detect_existing_vector_dimension().await?;
            self.vector_dimension = Some(dim);
            info!("Detected existing vector dimension: {}", dim);
            return Ok(());
        }

        info!(
            "Creating collection '{}' with {} dimensions",
            self.table_name, default_dimension
        );
        self.create_table(default_dimension).await?;
        self.vector_dimension = Some(default_dimension);
        Ok(())
    }

    async fn table_exists(&self) -> Result<bool, RagError> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to list tables: {}", e)))?;

        Ok(table_names.contains(&self.table_name))
    }

    async fn create_table(&self, vector_dim: usize) -> Result<(), RagError> {
        let schema = create_schema(vector_dim);

        self.connection
            .create_empty_table(&self.table_name, schema)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to create table: {}", e)))?;

        Ok(())
    }

    async fn open_table(&self) -> Result<lancedb::Table, RagError> {
        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to open table: {}", e)))
    }

    /// Detect vector dimension from existing table schema
    async fn detect_existing_vector_dimension(&self) -> Result<usize, RagError> {
        let table = self.open_table().await?;

        let schema = table
            .schema()
            .await
            .map_err(|e| RagError::Database(format!("Failed to get table schema: {}", e)))?;

        for field in schema.fields() {
            if field.name() == "vector" {
                if let DataType::FixedSizeList(_, size) = field.data_type() {
                    return Ok(*size as usize);
                }
            }
        }

        Err(RagError::Database(
            "Could not find vector column or determine dimension".to_string(),
        ))
    }

    /// Embed and store a batch of chunks in a single write.
    ///
    /// `documents`, `ids` and `metadatas` are parallel slices. Embedding and
    /// write failures are returned; nothing is written in that case.
    #[inline]
    pub async fn add(
        &mut self,
        documents: &[String],
        ids: &[String],
        metadatas: &[ChunkMetadata],
    ) -> Result<(), RagError> {
        self.replace_sources(documents, ids, metadatas, &[]).await
    }

    /// Embed a batch of chunks, then swap out every stored chunk of `sources`
    /// for it.
    ///
    /// Old chunks are only deleted once the new batch is embedded, so an
    /// embedding failure leaves the collection untouched.
    #[inline]
    pub async fn replace_sources(
        &mut self,
        documents: &[String],
        ids: &[String],
        metadatas: &[ChunkMetadata],
        sources: &[String],
    ) -> Result<(), RagError> {
        let Some(record_batch) = self.prepare_batch(documents, ids, metadatas).await? else {
            debug!("No chunks to store");
            return Ok(());
        };

        self.delete_sources(sources).await?;

        let rows = record_batch.num_rows();
        let table = self.open_table().await?;
        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to insert embeddings: {}", e)))?;

        info!("Successfully stored {} embeddings", rows);
        Ok(())
    }

    /// Embed `documents` and build the record batch to write, or `None` for an
    /// empty batch
    async fn prepare_batch(
        &mut self,
        documents: &[String],
        ids: &[String],
        metadatas: &[ChunkMetadata],
    ) -> Result<Option<RecordBatch>, RagError> {
        if documents.len() != ids.len() || documents.len() != metadatas.len() {
            return Err(RagError::Database(format!(
                "Mismatched batch: {} documents, {} ids, {} metadatas",
                documents.len(),
                ids.len(),
                metadatas.len()
            )));
        }

        if documents.is_empty() {
            return Ok(None);
        }

        debug!("Embedding batch of {} chunks", documents.len());
        let vectors = self.embedder.embed_documents(documents)?;

        if vectors.len() != documents.len() {
            return Err(RagError::Embedding(format!(
                "Expected {} embeddings, got {}",
                documents.len(),
                vectors.len()
            )));
        }

        let vector_dim = vectors[0].len();
        if vector_dim == 0 || vectors.iter().any(|v| v.len() != vector_dim) {
            return Err(RagError::Embedding(
                "Embedding function returned vectors of inconsistent dimension".to_string(),
            ));
        }

        self.ensure_dimension(vector_dim).await?;

        let created_at = chrono::Utc::now().to_rfc3339();
        let records: Vec<EmbeddingRecord> = documents
            .iter()
            .zip(ids)
            .zip(metadatas)
            .zip(vectors)
            .map(|(((content, id), metadata), vector)| EmbeddingRecord {
                id: id.clone(),
                vector,
                content: content.clone(),
                metadata: metadata.clone(),
                created_at: created_at.clone(),
            })
            .collect();

        create_record_batch(&records, vector_dim).map(Some)
    }

    /// Make the table accept vectors of `vector_dim` dimensions.
    ///
    /// An empty table is recreated with the new dimension; a populated table
    /// with a different dimension is an error.
    async fn ensure_dimension(&mut self, vector_dim: usize) -> Result<(), RagError> {
        if self.vector_dimension == Some(vector_dim) {
            return Ok(());
        }

        if self.count().await? > 0 {
            return Err(RagError::Database(format!(
                "Collection '{}' stores {}-dimensional vectors but the embedding function produced {}",
                self.table_name,
                self.vector_dimension.unwrap_or_default(),
                vector_dim
            )));
        }

        info!(
            "Vector dimension changed from {:?} to {}, recreating empty table",
            self.vector_dimension, vector_dim
        );
        self.drop_table_if_exists().await?;
        self.create_table(vector_dim).await?;
        self.vector_dimension = Some(vector_dim);
        Ok(())
    }

    /// Return up to `n_results` chunks nearest to `query_text`, closest first
    #[inline]
    pub async fn query(
        &self,
        query_text: &str,
        n_results: usize,
    ) -> Result<Vec<QueryMatch>, RagError> {
        if n_results == 0 {
            return Ok(Vec::new());
        }

        if self.count().await? == 0 {
            debug!("Collection '{}' is empty", self.table_name);
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed_query(query_text)?;
        if Some(query_vector.len()) != self.vector_dimension {
            return Err(RagError::Embedding(format!(
                "Query embedding has {} dimensions, collection expects {:?}",
                query_vector.len(),
                self.vector_dimension
            )));
        }

        debug!("Searching for similar vectors with limit: {}", n_results);

        let table = self.open_table().await?;
        let results = table
            .vector_search(query_vector.as_slice())
            .map_err(|e| RagError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .limit(n_results)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to execute search: {}", e)))?;

        let mut matches = parse_search_results_stream(results).await?;

        matches.sort_by(|a, b| {
            let a = a.distance.unwrap_or(f32::INFINITY);
            let b = b.distance.unwrap_or(f32::INFINITY);
            a.total_cmp(&b)
        });
        matches.truncate(n_results);

        Ok(matches)
    }

    /// Get the total number of chunks stored
    #[inline]
    pub async fn count(&self) -> Result<u64, RagError> {
        let table = self.open_table().await?;

        let count = table
            .count_rows(None)
            .await
            .map_err(|e| RagError::Database(format!("Failed to count rows: {}", e)))?;

        Ok(count as u64)
    }

    /// Delete every chunk whose source is one of `sources`
    #[inline]
    pub async fn delete_sources(&self, sources: &[String]) -> Result<(), RagError> {
        if sources.is_empty() {
            return Ok(());
        }

        let predicate = format!(
            "source IN ({})",
            sources
                .iter()
                .map(|source| quote_literal(source))
                .collect::<Vec<_>>()
                .join(", ")
        );
        debug!("Deleting chunks where {}", predicate);

        let table = self.open_table().await?;
        table
            .delete(&predicate)
            .await
            .map_err(|e| RagError::Database(format!("Failed to delete chunks: {}", e)))?;

        Ok(())
    }

    /// Drop the collection table if it exists
    async fn drop_table_if_exists(&self) -> Result<(), RagError> {
        if self.table_exists().await? {
            warn!("Dropping collection table '{}'", self.table_name);
            self.connection
                .drop_table(&self.table_name)
                .await
                .map_err(|e| RagError::Database(format!("Failed to drop table: {}", e)))?;
        }

        Ok(())
    }
}

/// Create schema with the specified vector dimension
fn create_schema(vector_dim: usize) -> Arc<Schema> {
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
        Field::new("source", DataType::Utf8, false),
        Field::new("chunk_index", DataType::UInt32, false),
        Field::new("total_chunks", DataType::UInt32, false),
        Field::new("content", DataType::Utf8, false),
        Field::new("created_at", DataType::Utf8, false),
    ]))
}

/// Create a RecordBatch from embedding records
fn create_record_batch(
    records: &[EmbeddingRecord],
    vector_dim: usize,
) -> Result<RecordBatch, RagError> {
    let len = records.len();

    let mut ids = Vec::with_capacity(len);
    let mut flat_values = Vec::with_capacity(len * vector_dim);
    let mut sources = Vec::with_capacity(len);
    let mut chunk_indices = Vec::with_capacity(len);
    let mut total_chunks = Vec::with_capacity(len);
    let mut contents = Vec::with_capacity(len);
    let mut created_ats = Vec::with_capacity(len);

    for record in records {
        ids.push(record.id.as_str());
        flat_values.extend_from_slice(&record.vector);
        sources.push(record.metadata.source.as_str());
        chunk_indices.push(record.metadata.chunk_index);
        total_chunks.push(record.metadata.total_chunks);
        contents.push(record.content.as_str());
        created_ats.push(record.created_at.as_str());
    }

    let values_array = Float32Array::from(flat_values);
    let field = Arc::new(Field::new("item", DataType::Float32, false));
    let vector_array =
        FixedSizeListArray::try_new(field, vector_dim as i32, Arc::new(values_array), None)
            .map_err(|e| RagError::Database(format!("Failed to create vector array: {}", e)))?;

    let arrays: Vec<Arc<dyn Array>> = vec![
        Arc::new(StringArray::from(ids)),
        Arc::new(vector_array),
        Arc::new(StringArray::from(sources)),
        Arc::new(UInt32Array::from(chunk_indices)),
        Arc::new(UInt32Array::from(total_chunks)),
        Arc::new(StringArray::from(contents)),
        Arc::new(StringArray::from(created_ats)),
    ];

    RecordBatch::try_new(create_schema(vector_dim), arrays)
        .map_err(|e| RagError::Database(format!("Failed to create record batch: {}", e)))
}

/// Parse search results from LanceDB stream into QueryMatch structs
async fn parse_search_results_stream(
    mut results: lancedb::arrow::SendableRecordBatchStream,
) -> Result<Vec<QueryMatch>, RagError> {
    let mut matches = Vec::new();

    while let Some(batch) = results
        .try_next()
        .await
        .map_err(|e| RagError::Database(format!("Failed to read result stream: {}", e)))?
    {
        matches.extend(parse_search_batch(&batch)?);
    }

    debug!("Parsed {} search results from stream", matches.len());
    Ok(matches)
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T, RagError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::Database(format!("Missing {name} column")))?
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| RagError::Database(format!("Invalid {name} column type")))
}

/// Parse a single record batch from search results
fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<QueryMatch>, RagError> {
    let ids = column::<StringArray>(batch, "id")?;
    let contents = column::<StringArray>(batch, "content")?;
    let sources = column::<StringArray>(batch, "source")?;
    let chunk_indices = column::<UInt32Array>(batch, "chunk_index")?;
    let total_chunks = column::<UInt32Array>(batch, "total_chunks")?;

    let distances = batch
        .column_by_name("_distance")
        .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

    let matches = (0..batch.num_rows())
        .map(|row| QueryMatch {
            id: ids.value(row).to_string(),
            content: contents.value(row).to_string(),
            metadata: ChunkMetadata {
                source: sources.value(row).to_string(),
                chunk_index: chunk_indices.value(row),
                total_chunks: total_chunks.value(row),
            },
            distance: distances.and_then(|d| (!d.is_null(row)).then(|| d.value(row))),
        })
        .collect();

    Ok(matches)
}

/// Quote a string as a SQL literal for LanceDB filters
fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
