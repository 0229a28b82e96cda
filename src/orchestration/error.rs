use crate::declarative::DeclarativeError;
use crate::sandbox::SandboxError;

/// Pipeline stage that produced a block failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStage {
    PreProcess,
    Request,
    Code,
    PostProcess,
}

impl BlockStage {
    pub fn as_str(self) -> &'static str {
        match self {
            BlockStage::PreProcess => "preProcess",
            BlockStage::Request => "request",
            BlockStage::Code => "code",
            BlockStage::PostProcess => "postProcess",
        }
    }
}

impl std::fmt::Display for BlockStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BlockExecutionError {
    #[error("preProcess failed: {source}")]
    PreProcess {
        index: usize,
        #[source]
        source: SandboxError,
    },
    #[error("request failed: {source}")]
    Request {
        #[source]
        source: DeclarativeError,
    },
    #[error("code failed: {source}")]
    Code {
        #[source]
        source: SandboxError,
    },
    #[error("postProcess failed: {source}")]
    PostProcess {
        index: usize,
        #[source]
        source: SandboxError,
    },
}

impl BlockExecutionError {
    pub fn stage(&self) -> BlockStage {
        match self {
            Self::PreProcess { .. } => BlockStage::PreProcess,
            Self::Request { .. } => BlockStage::Request,
            Self::Code { .. } => BlockStage::Code,
            Self::PostProcess { .. } => BlockStage::PostProcess,
        }
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            Self::PreProcess { source, .. }
            | Self::Code { source }
            | Self::PostProcess { source, .. } => source.is_timeout(),
            Self::Request {
                source: DeclarativeError::Transport { source, .. },
            } => matches!(source, crate::capability::CapabilityError::DeadlineExceeded { .. }),
            Self::Request { .. } => false,
        }
    }
}
