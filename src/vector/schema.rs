use super::VectorStoreError;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) fn connect(db_path: &Path) -> Result<Connection, VectorStoreError> {
    let connection = Connection::open(db_path).map_err(|source| VectorStoreError::Open {
        path: db_path.display().to_string(),
        source,
    })?;
    connection
        .busy_timeout(BUSY_TIMEOUT)
        .map_err(|source| VectorStoreError::Sql { source })?;
    connection
        .execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
        .map_err(|source| VectorStoreError::Sql { source })?;
    Ok(connection)
}

pub(crate) fn ensure_schema(connection: &Connection) -> Result<(), VectorStoreError> {
    connection
        .execute_batch(
            "
            CREATE TABLE IF NOT EXISTS vector_collections (
                tenant_id TEXT NOT NULL,
                collection_id TEXT NOT NULL,
                name TEXT NOT NULL,
                embedding_provider TEXT NOT NULL,
                embedding_model TEXT NOT NULL,
                dimension INTEGER NOT NULL,
                document_count INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (tenant_id, collection_id),
                UNIQUE (tenant_id, name)
            );

            CREATE TABLE IF NOT EXISTS vector_documents (
                tenant_id TEXT NOT NULL,
                collection_id TEXT NOT NULL,
                doc_id TEXT NOT NULL,
                content TEXT NOT NULL,
                metadata TEXT NOT NULL,
                embedding BLOB NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (tenant_id, collection_id, doc_id)
            );

            CREATE INDEX IF NOT EXISTS idx_vector_collections_tenant_created
                ON vector_collections(tenant_id, created_at DESC);
            CREATE INDEX IF NOT EXISTS idx_vector_documents_tenant_collection
                ON vector_documents(tenant_id, collection_id);
            ",
        )
        .map_err(|source| VectorStoreError::Sql { source })?;
    ensure_fts_table(connection)
}

fn ensure_fts_table(connection: &Connection) -> Result<(), VectorStoreError> {
    let existing_sql: Option<String> = connection
        .query_row(
            "
            SELECT sql
            FROM sqlite_master
            WHERE type = 'table' AND name = 'vector_documents_fts'
            LIMIT 1
            ",
            [],
            |row| row.get(0),
        )
        .optional()
        .map_err(|source| VectorStoreError::Sql { source })?;

    if let Some(sql) = existing_sql {
        if !sql.to_ascii_uppercase().contains("VIRTUAL TABLE") {
            connection
                .execute_batch("DROP TABLE vector_documents_fts;")
                .map_err(|source| VectorStoreError::Sql { source })?;
        }
    }

    connection
        .execute_batch(
            "
            CREATE VIRTUAL TABLE IF NOT EXISTS vector_documents_fts
            USING fts5(
                tenant_id UNINDEXED,
                collection_id UNINDEXED,
                doc_id UNINDEXED,
                content
            );
            ",
        )
        .map_err(|source| VectorStoreError::Sql { source })?;
    Ok(())
}

pub(crate) fn table_names(connection: &Connection) -> Result<Vec<String>, VectorStoreError> {
    let mut statement = connection
        .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name ASC")
        .map_err(|source| VectorStoreError::Sql { source })?;
    let rows = statement
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(|source| VectorStoreError::Sql { source })?;
    let mut names = Vec::new();
    for row in rows {
        names.push(row.map_err(|source| VectorStoreError::Sql { source })?);
    }
    Ok(names)
}
