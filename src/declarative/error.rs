use crate::capability::CapabilityError;

#[derive(Debug, thiserror::Error)]
pub enum DeclarativeError {
    #[error("request url template must be non-empty")]
    MissingUrl,
    #[error("unexpected response status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("{method} {url} failed: {source}")]
    Transport {
        method: String,
        url: String,
        #[source]
        source: CapabilityError,
    },
    #[error("failed to encode request body: {source}")]
    Encode {
        #[source]
        source: serde_json::Error,
    },
}

impl DeclarativeError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}
