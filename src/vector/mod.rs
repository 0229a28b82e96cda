//! Tenant-isolated vector store over SQLite with FTS5 keyword search and
//! reciprocal-rank fusion for hybrid queries.

pub mod error;
mod schema;
pub mod search;
pub mod store;

pub use error::VectorStoreError;
pub use search::{cosine_similarity, fuse_rankings, rrf_score, FusionParams};
pub use store::VectorStore;
