use crate::capability::CapabilityError;
use crate::filter::FilterError;

#[derive(Debug, thiserror::Error)]
pub enum VectorStoreError {
    #[error("sqlite open failed at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("failed to create vector database parent {path}: {source}")]
    CreateParent {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("sqlite statement failed: {source}")]
    Sql {
        #[source]
        source: rusqlite::Error,
    },
    #[error("invalid tenant id: {0}")]
    InvalidTenant(String),
    #[error("invalid collection `{name}`: {reason}")]
    InvalidCollection { name: String, reason: String },
    #[error("invalid document: {0}")]
    InvalidDocument(String),
    #[error("embedding request failed: {source}")]
    Embedding {
        #[source]
        source: CapabilityError,
    },
    #[error("embedding provider returned {actual} vectors for {expected} texts")]
    EmbeddingCount { expected: usize, actual: usize },
    #[error("dimension mismatch for collection `{collection}`: expected {expected}, got {actual}")]
    DimensionMismatch {
        collection: String,
        expected: usize,
        actual: usize,
    },
    #[error("invalid metadata filter: {0}")]
    Filter(#[from] FilterError),
    #[error("failed to decode embedding for document `{doc_id}`")]
    InvalidEmbedding { doc_id: String },
    #[error("deadline exceeded before `{operation}`")]
    DeadlineExceeded { operation: String },
}

impl From<VectorStoreError> for CapabilityError {
    fn from(err: VectorStoreError) -> Self {
        match err {
            VectorStoreError::Embedding { source } => source,
            VectorStoreError::DeadlineExceeded { operation } => {
                CapabilityError::DeadlineExceeded { operation }
            }
            other => CapabilityError::service(other),
        }
    }
}
