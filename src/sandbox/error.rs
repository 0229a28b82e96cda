use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SandboxError {
    #[error("script code must be a non-empty string")]
    InvalidCode,
    #[error("script execution timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },
    #[error("script compilation failed: {message}")]
    Compilation { message: String },
    #[error("script execution failed: {message}")]
    Execution { message: String },
    #[error("invalid capability arguments: {message}")]
    CapabilityArgument { message: String },
    #[error("script runtime error: {message}")]
    Runtime { message: String },
}

impl SandboxError {
    pub(crate) fn timeout(elapsed: Duration) -> Self {
        Self::Timeout {
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Short tag used in log events.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidCode => "invalid_code",
            Self::Timeout { .. } => "timeout",
            Self::Compilation { .. } => "compilation",
            Self::Execution { .. } => "execution",
            Self::CapabilityArgument { .. } => "capability_argument",
            Self::Runtime { .. } => "runtime",
        }
    }
}
