pub mod deadline;
pub mod ids;
pub mod logging;

pub use deadline::Deadline;
pub use ids::{generate_document_id, validate_identifier_value, CollectionName, TenantId};
pub use logging::{FileLogSink, LogLevel, LogSink, MemoryLogSink, NullLogSink};
