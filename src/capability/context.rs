use super::bindings::{
    AdapterBinding, BuilderBinding, EmbeddingBinding, HttpBinding, HumanApprovalBinding,
    LlmBinding, ResourceBinding, VectorBinding, WorkflowBinding,
};
use super::services::{
    AdapterService, BuilderService, EmbeddingService, HttpClient, HumanApprovalService,
    LlmService, ResourceReader, VectorService, WorkflowStepExecutor,
};
use super::{CapabilityBinding, CapabilityRegistry};
use crate::capability::http::UreqHttpClient;
use crate::shared::{LogSink, NullLogSink};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Everything one script execution may reach on the host.
///
/// `http` is always present. Every other capability is optional and is
/// absent from the script binding unless its service was supplied.
#[derive(Clone)]
pub struct ExecutionContext {
    http: Arc<dyn HttpClient>,
    capabilities: CapabilityRegistry,
    credentials: Map<String, Value>,
    logger: Arc<dyn LogSink>,
}

impl ExecutionContext {
    pub fn builder(http: Arc<dyn HttpClient>) -> ExecutionContextBuilder {
        ExecutionContextBuilder::new(http)
    }

    pub fn http(&self) -> &Arc<dyn HttpClient> {
        &self.http
    }

    pub fn capabilities(&self) -> &CapabilityRegistry {
        &self.capabilities
    }

    pub fn credentials(&self) -> &Map<String, Value> {
        &self.credentials
    }

    pub fn logger(&self) -> &Arc<dyn LogSink> {
        &self.logger
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        ExecutionContextBuilder::new(Arc::new(UreqHttpClient::default())).build()
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("capabilities", &self.capabilities)
            .field("credentials", &self.credentials.keys().collect::<Vec<_>>())
            .finish()
    }
}

pub struct ExecutionContextBuilder {
    http: Arc<dyn HttpClient>,
    capabilities: CapabilityRegistry,
    credentials: Map<String, Value>,
    logger: Arc<dyn LogSink>,
}

impl ExecutionContextBuilder {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        let mut capabilities = CapabilityRegistry::new();
        capabilities.register(Arc::new(HttpBinding::new(Arc::clone(&http))));
        Self {
            http,
            capabilities,
            credentials: Map::new(),
            logger: Arc::new(NullLogSink),
        }
    }

    fn with_binding(mut self, binding: impl CapabilityBinding + 'static) -> Self {
        self.capabilities.register(Arc::new(binding));
        self
    }

    pub fn with_llm(self, service: Arc<dyn LlmService>) -> Self {
        self.with_binding(LlmBinding::new(service))
    }

    pub fn with_embedding(self, service: Arc<dyn EmbeddingService>) -> Self {
        self.with_binding(EmbeddingBinding::new(service))
    }

    pub fn with_vector(self, service: Arc<dyn VectorService>) -> Self {
        self.with_binding(VectorBinding::new(service))
    }

    pub fn with_workflow_executor(self, executor: Arc<dyn WorkflowStepExecutor>) -> Self {
        self.with_binding(WorkflowBinding::new(executor))
    }

    pub fn with_human_approval(self, service: Arc<dyn HumanApprovalService>) -> Self {
        self.with_binding(HumanApprovalBinding::new(service))
    }

    pub fn with_adapter(self, service: Arc<dyn AdapterService>) -> Self {
        self.with_binding(AdapterBinding::new(service))
    }

    pub fn with_blocks(self, reader: Arc<dyn ResourceReader>) -> Self {
        self.with_binding(ResourceBinding::blocks(reader))
    }

    pub fn with_workflows(self, reader: Arc<dyn ResourceReader>) -> Self {
        self.with_binding(ResourceBinding::workflows(reader))
    }

    pub fn with_runs(self, reader: Arc<dyn ResourceReader>) -> Self {
        self.with_binding(ResourceBinding::runs(reader))
    }

    pub fn with_builder(self, service: Arc<dyn BuilderService>) -> Self {
        self.with_binding(BuilderBinding::new(service))
    }

    pub fn with_credentials(mut self, credentials: Map<String, Value>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn LogSink>) -> Self {
        self.logger = logger;
        self
    }

    pub fn build(self) -> ExecutionContext {
        ExecutionContext {
            http: self.http,
            capabilities: self.capabilities,
            credentials: self.credentials,
            logger: self.logger,
        }
    }
}
