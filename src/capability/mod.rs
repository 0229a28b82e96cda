//! Host capabilities reachable from sandboxed scripts.
//!
//! Every capability is a narrow service trait plus a [`CapabilityBinding`]
//! that owns the script-facing method table. Bindings receive raw JSON
//! arguments and re-validate arity and shape on the host side before any
//! service code runs.

pub mod bindings;
pub mod context;
pub mod http;
pub mod services;
pub mod types;

pub use bindings::{
    AdapterBinding, BuilderBinding, EmbeddingBinding, HttpBinding, HumanApprovalBinding,
    LlmBinding, ResourceBinding, VectorBinding, WorkflowBinding,
};
pub use context::{ExecutionContext, ExecutionContextBuilder};
pub use http::UreqHttpClient;
pub use services::{
    AdapterService, BuilderService, EmbeddingService, HttpClient, HumanApprovalService,
    LlmService, ResourceReader, VectorService, WorkflowStepExecutor,
};
pub use types::*;

use crate::shared::Deadline;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapabilityError {
    #[error("{method}: {reason}")]
    Argument { method: String, reason: String },
    #[error("capability `{capability}` is not installed")]
    NotInstalled { capability: String },
    #[error("unknown method `{method}` on capability `{capability}`")]
    UnknownMethod { capability: String, method: String },
    #[error("deadline exceeded before `{operation}` completed")]
    DeadlineExceeded { operation: String },
    #[error("failed to encode capability value: {0}")]
    Serialization(String),
    #[error("{0}")]
    Service(String),
}

impl CapabilityError {
    pub fn service(message: impl std::fmt::Display) -> Self {
        Self::Service(message.to_string())
    }

    pub fn argument(method: &str, reason: impl Into<String>) -> Self {
        Self::Argument {
            method: method.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CapabilityKind {
    Http,
    Llm,
    Embedding,
    Vector,
    Workflow,
    HumanApproval,
    Adapter,
    Blocks,
    Workflows,
    Runs,
    Builder,
}

impl CapabilityKind {
    /// Property name under `context` in the script binding.
    pub fn namespace(self) -> &'static str {
        match self {
            CapabilityKind::Http => "http",
            CapabilityKind::Llm => "llm",
            CapabilityKind::Embedding => "embedding",
            CapabilityKind::Vector => "vector",
            CapabilityKind::Workflow => "workflow",
            CapabilityKind::HumanApproval => "humanApproval",
            CapabilityKind::Adapter => "adapter",
            CapabilityKind::Blocks => "blocks",
            CapabilityKind::Workflows => "workflows",
            CapabilityKind::Runs => "runs",
            CapabilityKind::Builder => "builder",
        }
    }
}

impl std::fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.namespace())
    }
}

pub trait CapabilityBinding: Send + Sync {
    fn kind(&self) -> CapabilityKind;

    /// Script-visible method names, in camelCase.
    fn methods(&self) -> &'static [&'static str];

    fn invoke(
        &self,
        deadline: &Deadline,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, CapabilityError>;
}

/// Capabilities installed for one execution, keyed by kind. A kind that was
/// never registered is simply absent from the script binding.
#[derive(Clone, Default)]
pub struct CapabilityRegistry {
    bindings: BTreeMap<CapabilityKind, Arc<dyn CapabilityBinding>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, binding: Arc<dyn CapabilityBinding>) {
        self.bindings.insert(binding.kind(), binding);
    }

    pub fn contains(&self, kind: CapabilityKind) -> bool {
        self.bindings.contains_key(&kind)
    }

    pub fn get(&self, kind: CapabilityKind) -> Option<&Arc<dyn CapabilityBinding>> {
        self.bindings.get(&kind)
    }

    pub fn kinds(&self) -> Vec<CapabilityKind> {
        self.bindings.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CapabilityKind, &Arc<dyn CapabilityBinding>)> {
        self.bindings.iter()
    }

    pub fn invoke(
        &self,
        kind: CapabilityKind,
        deadline: &Deadline,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, CapabilityError> {
        let binding = self
            .bindings
            .get(&kind)
            .ok_or_else(|| CapabilityError::NotInstalled {
                capability: kind.namespace().to_string(),
            })?;
        if !binding.methods().contains(&method) {
            return Err(CapabilityError::UnknownMethod {
                capability: kind.namespace().to_string(),
                method: method.to_string(),
            });
        }
        if deadline.is_expired() {
            return Err(CapabilityError::DeadlineExceeded {
                operation: format!("{}.{}", kind.namespace(), method),
            });
        }
        binding.invoke(deadline, method, args)
    }
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
