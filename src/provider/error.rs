use crate::capability::CapabilityError;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("unknown provider `{0}`")]
    UnknownProvider(String),
    #[error("provider `{provider}` does not support {operation}")]
    Unsupported { provider: String, operation: String },
    #[error("missing API key for `{provider}`: set `{env}`")]
    MissingApiKey { provider: String, env: String },
    #[error("{provider} request failed: {source}")]
    Transport {
        provider: String,
        #[source]
        source: CapabilityError,
    },
    #[error("{provider} returned {status}: {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },
    #[error("failed to decode {provider} response: {message}")]
    Decode { provider: String, message: String },
    #[error("failed to encode {provider} request: {source}")]
    Encode {
        provider: String,
        #[source]
        source: serde_json::Error,
    },
}

impl From<ProviderError> for CapabilityError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Transport { source, .. } => source,
            other => CapabilityError::service(other),
        }
    }
}
