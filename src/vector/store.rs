use super::schema::{connect, ensure_schema, table_names};
use super::search::{
    cosine_similarity, decode_embedding, encode_embedding, fts_query, fuse_rankings, l2_norm,
    sort_scored, FusionParams,
};
use super::VectorStoreError;
use crate::capability::{
    CapabilityError, CollectionInfo, EmbeddingService, QueryInput, QueryOptions, UpsertOptions,
    UpsertResult, VectorDocument, VectorMatch, VectorService,
};
use crate::config::VectorStoreSettings;
use crate::filter::{compile_filter, CompiledFilter};
use crate::shared::logging::now_secs;
use crate::shared::{
    generate_document_id, CollectionName, Deadline, LogLevel, LogSink, NullLogSink, TenantId,
};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Collection row as stored; `collection_id` never leaves the store.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CollectionRecord {
    collection_id: String,
    info: CollectionInfo,
}

struct StoredDocument {
    doc_id: String,
    content: String,
    metadata: Map<String, Value>,
    embedding: Vec<f32>,
}

struct PreparedDocument {
    doc_id: String,
    content: String,
    metadata: String,
    embedding: Vec<f32>,
}

/// SQLite-backed vector store scoped to one tenant.
///
/// The tenant is fixed when the store is opened and bound into every
/// statement; no method accepts a tenant id.
pub struct VectorStore {
    db_path: PathBuf,
    tenant_id: TenantId,
    embedder: Arc<dyn EmbeddingService>,
    settings: VectorStoreSettings,
    logger: Arc<dyn LogSink>,
}

impl VectorStore {
    pub fn open(
        db_path: &Path,
        tenant_id: TenantId,
        embedder: Arc<dyn EmbeddingService>,
        settings: VectorStoreSettings,
    ) -> Result<Self, VectorStoreError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| VectorStoreError::CreateParent {
                    path: parent.display().to_string(),
                    source,
                })?;
            }
        }
        let store = Self {
            db_path: db_path.to_path_buf(),
            tenant_id,
            embedder,
            settings,
            logger: Arc::new(NullLogSink),
        };
        let connection = store.connect()?;
        ensure_schema(&connection)?;
        Ok(store)
    }

    /// Parses a raw tenant id and opens the store at the configured path.
    pub fn open_for_tenant(
        raw_tenant_id: &str,
        embedder: Arc<dyn EmbeddingService>,
        settings: VectorStoreSettings,
    ) -> Result<Self, VectorStoreError> {
        let tenant_id = TenantId::parse(raw_tenant_id).map_err(VectorStoreError::InvalidTenant)?;
        let db_path = settings.database_path.clone();
        Self::open(&db_path, tenant_id, embedder, settings)
    }

    pub fn with_logger(mut self, logger: Arc<dyn LogSink>) -> Self {
        self.logger = logger;
        self
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn table_names(&self) -> Result<Vec<String>, VectorStoreError> {
        table_names(&self.connect()?)
    }

    pub fn upsert(
        &self,
        deadline: &Deadline,
        collection: &str,
        documents: Vec<VectorDocument>,
        options: &UpsertOptions,
    ) -> Result<UpsertResult, VectorStoreError> {
        let name = parse_collection(collection)?;
        if documents.is_empty() {
            return Ok(UpsertResult {
                upserted: 0,
                ids: Vec::new(),
            });
        }
        ensure_time_left(deadline, "vector.upsert")?;

        let existing = {
            let connection = self.connect()?;
            self.find_collection(&connection, name.as_str())?
        };
        let (provider, model) = match &existing {
            Some(record) => (
                record.info.embedding_provider.clone(),
                record.info.embedding_model.clone(),
            ),
            None => (
                options
                    .embedding_provider
                    .clone()
                    .filter(|value| !value.trim().is_empty())
                    .unwrap_or_else(|| self.settings.embedding_provider.clone()),
                options
                    .embedding_model
                    .clone()
                    .filter(|value| !value.trim().is_empty())
                    .unwrap_or_else(|| self.settings.embedding_model.clone()),
            ),
        };

        let prepared = self.prepare_documents(deadline, documents, &provider, &model)?;
        let dimension = uniform_dimension(name.as_str(), &prepared)?;
        if let Some(record) = &existing {
            check_dimension(&record.info, dimension)?;
        }

        ensure_time_left(deadline, "vector.upsert")?;
        let mut connection = self.connect()?;
        let record = self.resolve_or_create_collection(
            &connection,
            name.as_str(),
            &provider,
            &model,
            dimension,
        )?;
        check_dimension(&record.info, dimension)?;

        let now = now_secs();
        let tx = connection
            .transaction()
            .map_err(|source| VectorStoreError::Sql { source })?;
        for document in &prepared {
            tx.execute(
                "
                INSERT INTO vector_documents (
                    tenant_id, collection_id, doc_id, content, metadata, embedding,
                    created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
                ON CONFLICT(tenant_id, collection_id, doc_id) DO UPDATE SET
                    content = excluded.content,
                    metadata = excluded.metadata,
                    embedding = excluded.embedding,
                    updated_at = excluded.updated_at
                ",
                params![
                    self.tenant_id.as_str(),
                    record.collection_id,
                    document.doc_id,
                    document.content,
                    document.metadata,
                    encode_embedding(&document.embedding),
                    now,
                ],
            )
            .map_err(|source| VectorStoreError::Sql { source })?;
            tx.execute(
                "
                DELETE FROM vector_documents_fts
                WHERE tenant_id = ?1 AND collection_id = ?2 AND doc_id = ?3
                ",
                params![self.tenant_id.as_str(), record.collection_id, document.doc_id],
            )
            .map_err(|source| VectorStoreError::Sql { source })?;
            tx.execute(
                "
                INSERT INTO vector_documents_fts (tenant_id, collection_id, doc_id, content)
                VALUES (?1, ?2, ?3, ?4)
                ",
                params![
                    self.tenant_id.as_str(),
                    record.collection_id,
                    document.doc_id,
                    document.content,
                ],
            )
            .map_err(|source| VectorStoreError::Sql { source })?;
        }
        tx.commit()
            .map_err(|source| VectorStoreError::Sql { source })?;

        self.refresh_document_count(&connection, &record);
        let ids = prepared
            .into_iter()
            .map(|document| document.doc_id)
            .collect::<Vec<_>>();
        self.logger.log(
            LogLevel::Info,
            "vector.upsert.completed",
            "documents upserted",
            &[
                ("tenant_id", Value::String(self.tenant_id.to_string())),
                ("collection", Value::String(name.to_string())),
                ("count", Value::from(ids.len())),
            ],
        );
        Ok(UpsertResult {
            upserted: ids.len(),
            ids,
        })
    }

    pub fn query(
        &self,
        deadline: &Deadline,
        collection: &str,
        query: QueryInput,
        options: &QueryOptions,
    ) -> Result<Vec<VectorMatch>, VectorStoreError> {
        let name = parse_collection(collection)?;
        ensure_time_left(deadline, "vector.query")?;
        let filter_value = options.filter.as_ref().filter(|filter| !filter.is_null());
        let filter = compile_metadata_filter(filter_value, 3)?;

        let Some(record) = self.find_collection(&self.connect()?, name.as_str())? else {
            return Ok(Vec::new());
        };

        let query_vector = match query {
            QueryInput::Vector(vector) => vector,
            QueryInput::Text(text) => {
                let mut vectors = self.embed(
                    deadline,
                    &record.info.embedding_provider,
                    &record.info.embedding_model,
                    &[text],
                )?;
                vectors.pop().unwrap_or_default()
            }
        };
        check_dimension(&record.info, query_vector.len())?;

        ensure_time_left(deadline, "vector.query")?;
        let connection = self.connect()?;
        let documents = self.load_documents(&connection, &record, &filter)?;
        let query_norm = l2_norm(&query_vector);
        let mut scored = documents
            .iter()
            .map(|document| {
                (
                    document.doc_id.clone(),
                    cosine_similarity(&query_vector, query_norm, &document.embedding),
                )
            })
            .collect::<Vec<_>>();
        sort_scored(&mut scored);

        let top_k = if options.top_k == 0 {
            self.settings.default_top_k
        } else {
            options.top_k
        };
        let keyword_query = options.hybrid_keyword().and_then(fts_query);
        let ranked = match keyword_query {
            Some(keyword_query) => {
                let candidates = self.settings.hybrid_candidates;
                let vector_ranked = scored
                    .iter()
                    .take(candidates)
                    .map(|(id, _)| id.clone())
                    .collect::<Vec<_>>();
                let keyword_filter = compile_metadata_filter(filter_value, 4)?;
                let keyword_ranked = self.keyword_candidates(
                    &connection,
                    &record,
                    &keyword_query,
                    &keyword_filter,
                    candidates,
                )?;
                let alpha = options
                    .alpha
                    .unwrap_or(self.settings.default_alpha)
                    .clamp(0.0, 1.0);
                fuse_rankings(
                    &vector_ranked,
                    &keyword_ranked,
                    FusionParams {
                        alpha,
                        rrf_k: self.settings.rrf_k,
                        missing_rank: self.settings.missing_rank,
                    },
                )
            }
            None => scored,
        };

        let by_id = documents
            .into_iter()
            .map(|document| (document.doc_id.clone(), document))
            .collect::<HashMap<_, _>>();
        let matches = ranked
            .into_iter()
            .filter(|(_, score)| options.min_score.map_or(true, |min| *score >= min))
            .take(top_k)
            .filter_map(|(id, score)| {
                let document = by_id.get(&id)?;
                Some(VectorMatch {
                    id,
                    score,
                    content: options
                        .include_content
                        .then(|| document.content.clone()),
                    metadata: options
                        .include_metadata
                        .then(|| document.metadata.clone()),
                })
            })
            .collect::<Vec<_>>();

        self.logger.log(
            LogLevel::Debug,
            "vector.query.completed",
            "vector query completed",
            &[
                ("tenant_id", Value::String(self.tenant_id.to_string())),
                ("collection", Value::String(name.to_string())),
                ("hybrid", Value::Bool(options.hybrid_keyword().is_some())),
                ("matches", Value::from(matches.len())),
            ],
        );
        Ok(matches)
    }

    pub fn delete(
        &self,
        deadline: &Deadline,
        collection: &str,
        ids: &[String],
    ) -> Result<usize, VectorStoreError> {
        let name = parse_collection(collection)?;
        if ids.is_empty() {
            return Ok(0);
        }
        ensure_time_left(deadline, "vector.delete")?;
        let mut connection = self.connect()?;
        let Some(record) = self.find_collection(&connection, name.as_str())? else {
            return Ok(0);
        };

        let tx = connection
            .transaction()
            .map_err(|source| VectorStoreError::Sql { source })?;
        let mut removed = 0;
        for id in ids {
            removed += tx
                .execute(
                    "
                    DELETE FROM vector_documents
                    WHERE tenant_id = ?1 AND collection_id = ?2 AND doc_id = ?3
                    ",
                    params![self.tenant_id.as_str(), record.collection_id, id],
                )
                .map_err(|source| VectorStoreError::Sql { source })?;
            tx.execute(
                "
                DELETE FROM vector_documents_fts
                WHERE tenant_id = ?1 AND collection_id = ?2 AND doc_id = ?3
                ",
                params![self.tenant_id.as_str(), record.collection_id, id],
            )
            .map_err(|source| VectorStoreError::Sql { source })?;
        }
        tx.commit()
            .map_err(|source| VectorStoreError::Sql { source })?;

        self.refresh_document_count(&connection, &record);
        Ok(removed)
    }

    /// Newest first.
    pub fn list_collections(&self) -> Result<Vec<CollectionInfo>, VectorStoreError> {
        let connection = self.connect()?;
        let mut statement = connection
            .prepare(
                "
                SELECT collection_id, name, embedding_provider, embedding_model, dimension,
                       document_count, created_at, updated_at
                FROM vector_collections
                WHERE tenant_id = ?1
                ORDER BY created_at DESC, rowid DESC
                ",
            )
            .map_err(|source| VectorStoreError::Sql { source })?;
        let rows = statement
            .query_map(params![self.tenant_id.as_str()], map_collection_row)
            .map_err(|source| VectorStoreError::Sql { source })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(|source| VectorStoreError::Sql { source })?.info);
        }
        Ok(out)
    }

    pub fn get_collection(&self, name: &str) -> Result<Option<CollectionInfo>, VectorStoreError> {
        let name = parse_collection(name)?;
        let connection = self.connect()?;
        Ok(self
            .find_collection(&connection, name.as_str())?
            .map(|record| record.info))
    }

    /// Drops the collection and all of its documents. Returns false when the
    /// tenant has no collection by that name.
    pub fn delete_collection(&self, name: &str) -> Result<bool, VectorStoreError> {
        let name = parse_collection(name)?;
        let mut connection = self.connect()?;
        let Some(record) = self.find_collection(&connection, name.as_str())? else {
            return Ok(false);
        };
        let tx = connection
            .transaction()
            .map_err(|source| VectorStoreError::Sql { source })?;
        for sql in [
            "DELETE FROM vector_documents_fts WHERE tenant_id = ?1 AND collection_id = ?2",
            "DELETE FROM vector_documents WHERE tenant_id = ?1 AND collection_id = ?2",
            "DELETE FROM vector_collections WHERE tenant_id = ?1 AND collection_id = ?2",
        ] {
            tx.execute(sql, params![self.tenant_id.as_str(), record.collection_id])
                .map_err(|source| VectorStoreError::Sql { source })?;
        }
        tx.commit()
            .map_err(|source| VectorStoreError::Sql { source })?;
        self.logger.log(
            LogLevel::Info,
            "vector.collection.deleted",
            "collection deleted",
            &[
                ("tenant_id", Value::String(self.tenant_id.to_string())),
                ("collection", Value::String(name.to_string())),
            ],
        );
        Ok(true)
    }

    fn connect(&self) -> Result<Connection, VectorStoreError> {
        connect(&self.db_path)
    }

    fn embed(
        &self,
        deadline: &Deadline,
        provider: &str,
        model: &str,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>, VectorStoreError> {
        ensure_time_left(deadline, "embedding.embed")?;
        let response = self
            .embedder
            .embed(deadline, provider, model, texts)
            .map_err(|source| VectorStoreError::Embedding { source })?;
        if response.vectors.len() != texts.len() {
            return Err(VectorStoreError::EmbeddingCount {
                expected: texts.len(),
                actual: response.vectors.len(),
            });
        }
        Ok(response.vectors)
    }

    /// Assigns ids and fills missing embeddings with a single batched call.
    fn prepare_documents(
        &self,
        deadline: &Deadline,
        documents: Vec<VectorDocument>,
        provider: &str,
        model: &str,
    ) -> Result<Vec<PreparedDocument>, VectorStoreError> {
        let missing = documents
            .iter()
            .filter(|document| document.vector.is_none())
            .map(|document| document.content.clone())
            .collect::<Vec<_>>();
        let generated = if missing.is_empty() {
            Vec::new()
        } else {
            self.embed(deadline, provider, model, &missing)?
        };
        let mut generated = generated.into_iter();

        let mut prepared = Vec::with_capacity(documents.len());
        for document in documents {
            let doc_id = match document.id.filter(|id| !id.trim().is_empty()) {
                Some(id) => id,
                None => generate_document_id().map_err(VectorStoreError::InvalidDocument)?,
            };
            let embedding = match document.vector {
                Some(vector) => vector,
                None => generated.next().ok_or(VectorStoreError::EmbeddingCount {
                    expected: missing.len(),
                    actual: 0,
                })?,
            };
            let metadata = serde_json::to_string(&document.metadata).map_err(|err| {
                VectorStoreError::InvalidDocument(format!(
                    "metadata for `{doc_id}` is not encodable: {err}"
                ))
            })?;
            prepared.push(PreparedDocument {
                doc_id,
                content: document.content,
                metadata,
                embedding,
            });
        }
        Ok(prepared)
    }

    fn find_collection(
        &self,
        connection: &Connection,
        name: &str,
    ) -> Result<Option<CollectionRecord>, VectorStoreError> {
        connection
            .query_row(
                "
                SELECT collection_id, name, embedding_provider, embedding_model, dimension,
                       document_count, created_at, updated_at
                FROM vector_collections
                WHERE tenant_id = ?1 AND name = ?2
                ",
                params![self.tenant_id.as_str(), name],
                map_collection_row,
            )
            .optional()
            .map_err(|source| VectorStoreError::Sql { source })
    }

    /// First writer wins: a concurrent creator's row is re-read, not replaced.
    fn resolve_or_create_collection(
        &self,
        connection: &Connection,
        name: &str,
        provider: &str,
        model: &str,
        dimension: usize,
    ) -> Result<CollectionRecord, VectorStoreError> {
        if let Some(record) = self.find_collection(connection, name)? {
            return Ok(record);
        }
        let collection_id = generate_document_id().map_err(VectorStoreError::InvalidDocument)?;
        let now = now_secs();
        let inserted = connection
            .execute(
                "
                INSERT INTO vector_collections (
                    tenant_id, collection_id, name, embedding_provider, embedding_model,
                    dimension, document_count, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?7)
                ON CONFLICT(tenant_id, name) DO NOTHING
                ",
                params![
                    self.tenant_id.as_str(),
                    collection_id,
                    name,
                    provider,
                    model,
                    dimension as i64,
                    now,
                ],
            )
            .map_err(|source| VectorStoreError::Sql { source })?;
        if inserted > 0 {
            self.logger.log(
                LogLevel::Info,
                "vector.collection.created",
                "collection created",
                &[
                    ("tenant_id", Value::String(self.tenant_id.to_string())),
                    ("collection", Value::String(name.to_string())),
                    ("embedding_provider", Value::String(provider.to_string())),
                    ("embedding_model", Value::String(model.to_string())),
                    ("dimension", Value::from(dimension)),
                ],
            );
        }
        self.find_collection(connection, name)?
            .ok_or_else(|| VectorStoreError::InvalidCollection {
                name: name.to_string(),
                reason: "collection vanished after creation".to_string(),
            })
    }

    fn refresh_document_count(&self, connection: &Connection, record: &CollectionRecord) {
        let refreshed = connection.execute(
            "
            UPDATE vector_collections
            SET document_count = (
                    SELECT COUNT(*) FROM vector_documents
                    WHERE tenant_id = ?1 AND collection_id = ?2
                ),
                updated_at = ?3
            WHERE tenant_id = ?1 AND collection_id = ?2
            ",
            params![self.tenant_id.as_str(), record.collection_id, now_secs()],
        );
        if let Err(err) = refreshed {
            self.logger.log(
                LogLevel::Warn,
                "vector.collection.count_refresh_failed",
                &err.to_string(),
                &[
                    ("tenant_id", Value::String(self.tenant_id.to_string())),
                    ("collection", Value::String(record.info.name.clone())),
                ],
            );
        }
    }

    fn load_documents(
        &self,
        connection: &Connection,
        record: &CollectionRecord,
        filter: &CompiledFilter,
    ) -> Result<Vec<StoredDocument>, VectorStoreError> {
        let sql = format!(
            "
            SELECT d.doc_id, d.content, d.metadata, d.embedding
            FROM vector_documents d
            WHERE d.tenant_id = ?1
              AND d.collection_id = ?2
              AND {}
            ",
            filter.sql
        );
        let mut params = vec![
            SqlValue::Text(self.tenant_id.to_string()),
            SqlValue::Text(record.collection_id.clone()),
        ];
        params.extend(filter.params.iter().cloned());

        let mut statement = connection
            .prepare(&sql)
            .map_err(|source| VectorStoreError::Sql { source })?;
        let rows = statement
            .query_map(params_from_iter(params), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Vec<u8>>(3)?,
                ))
            })
            .map_err(|source| VectorStoreError::Sql { source })?;

        let mut out = Vec::new();
        for row in rows {
            let (doc_id, content, metadata, blob) =
                row.map_err(|source| VectorStoreError::Sql { source })?;
            let embedding = decode_embedding(&doc_id, &blob)?;
            let metadata = serde_json::from_str::<Map<String, Value>>(&metadata)
                .unwrap_or_default();
            out.push(StoredDocument {
                doc_id,
                content,
                metadata,
                embedding,
            });
        }
        Ok(out)
    }

    /// Ids ranked by bm25 (best first). `filter` must be compiled from `?4`.
    fn keyword_candidates(
        &self,
        connection: &Connection,
        record: &CollectionRecord,
        fts_query: &str,
        filter: &CompiledFilter,
        limit: usize,
    ) -> Result<Vec<String>, VectorStoreError> {
        let filter_sql = &filter.sql;
        let limit_index = filter.next_param_index(4);
        let sql = format!(
            "
            SELECT d.doc_id, bm25(vector_documents_fts) AS rank_score
            FROM vector_documents_fts
            JOIN vector_documents d
              ON d.tenant_id = vector_documents_fts.tenant_id
             AND d.collection_id = vector_documents_fts.collection_id
             AND d.doc_id = vector_documents_fts.doc_id
            WHERE vector_documents_fts MATCH ?3
              AND vector_documents_fts.tenant_id = ?1
              AND vector_documents_fts.collection_id = ?2
              AND {filter_sql}
            ORDER BY rank_score ASC, d.doc_id ASC
            LIMIT ?{limit_index}
            "
        );
        let mut params = vec![
            SqlValue::Text(self.tenant_id.to_string()),
            SqlValue::Text(record.collection_id.clone()),
            SqlValue::Text(fts_query.to_string()),
        ];
        params.extend(filter.params.iter().cloned());
        params.push(SqlValue::Integer(limit as i64));

        let mut statement = connection
            .prepare(&sql)
            .map_err(|source| VectorStoreError::Sql { source })?;
        let rows = statement
            .query_map(params_from_iter(params), |row| row.get::<_, String>(0))
            .map_err(|source| VectorStoreError::Sql { source })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(|source| VectorStoreError::Sql { source })?);
        }
        Ok(out)
    }
}

impl std::fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("db_path", &self.db_path)
            .field("tenant_id", &self.tenant_id)
            .finish()
    }
}

impl VectorService for VectorStore {
    fn upsert(
        &self,
        deadline: &Deadline,
        collection: &str,
        documents: Vec<VectorDocument>,
        options: &UpsertOptions,
    ) -> Result<UpsertResult, CapabilityError> {
        Ok(VectorStore::upsert(self, deadline, collection, documents, options)?)
    }

    fn query(
        &self,
        deadline: &Deadline,
        collection: &str,
        query: QueryInput,
        options: &QueryOptions,
    ) -> Result<Vec<VectorMatch>, CapabilityError> {
        Ok(VectorStore::query(self, deadline, collection, query, options)?)
    }

    fn delete(
        &self,
        deadline: &Deadline,
        collection: &str,
        ids: &[String],
    ) -> Result<usize, CapabilityError> {
        Ok(VectorStore::delete(self, deadline, collection, ids)?)
    }

    fn list_collections(
        &self,
        deadline: &Deadline,
    ) -> Result<Vec<CollectionInfo>, CapabilityError> {
        ensure_time_left(deadline, "vector.listCollections")?;
        Ok(VectorStore::list_collections(self)?)
    }
}

fn compile_metadata_filter(
    filter: Option<&Value>,
    first_param_index: usize,
) -> Result<CompiledFilter, VectorStoreError> {
    match filter {
        Some(filter) => Ok(compile_filter(filter, "d.metadata", first_param_index)?),
        None => Ok(CompiledFilter::always_true()),
    }
}

fn parse_collection(raw: &str) -> Result<CollectionName, VectorStoreError> {
    CollectionName::parse(raw.trim()).map_err(|reason| VectorStoreError::InvalidCollection {
        name: raw.to_string(),
        reason,
    })
}

fn ensure_time_left(deadline: &Deadline, operation: &str) -> Result<(), VectorStoreError> {
    if deadline.is_expired() {
        return Err(VectorStoreError::DeadlineExceeded {
            operation: operation.to_string(),
        });
    }
    Ok(())
}

fn uniform_dimension(
    collection: &str,
    documents: &[PreparedDocument],
) -> Result<usize, VectorStoreError> {
    let mut dimension = None;
    for document in documents {
        let len = document.embedding.len();
        if len == 0 {
            return Err(VectorStoreError::InvalidDocument(format!(
                "document `{}` has an empty embedding",
                document.doc_id
            )));
        }
        match dimension {
            None => dimension = Some(len),
            Some(expected) if expected != len => {
                return Err(VectorStoreError::DimensionMismatch {
                    collection: collection.to_string(),
                    expected,
                    actual: len,
                })
            }
            Some(_) => {}
        }
    }
    dimension.ok_or_else(|| VectorStoreError::InvalidDocument("no documents".to_string()))
}

fn check_dimension(info: &CollectionInfo, actual: usize) -> Result<(), VectorStoreError> {
    if info.dimension != actual {
        return Err(VectorStoreError::DimensionMismatch {
            collection: info.name.clone(),
            expected: info.dimension,
            actual,
        });
    }
    Ok(())
}

fn map_collection_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CollectionRecord> {
    Ok(CollectionRecord {
        collection_id: row.get(0)?,
        info: CollectionInfo {
            name: row.get(1)?,
            embedding_provider: row.get(2)?,
            embedding_model: row.get(3)?,
            dimension: row.get::<_, i64>(4)?.max(0) as usize,
            document_count: row.get::<_, i64>(5)?.max(0) as u64,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        },
    })
}
