use super::types::{
    ApprovalDecision, ApprovalRequest, ChatRequest, ChatResponse, CollectionInfo,
    EmbeddingResponse, HttpRequest, HttpResponse, ListQuery, QueryInput, QueryOptions,
    UpsertOptions, UpsertResult, VectorDocument, VectorMatch,
};
use super::CapabilityError;
use crate::shared::Deadline;
use serde_json::{Map, Value};

/// Outbound HTTP. Non-2xx statuses are responses, not errors.
pub trait HttpClient: Send + Sync {
    fn send(&self, deadline: &Deadline, request: &HttpRequest)
        -> Result<HttpResponse, CapabilityError>;
}

pub trait LlmService: Send + Sync {
    fn chat(
        &self,
        deadline: &Deadline,
        provider: &str,
        model: &str,
        request: &ChatRequest,
    ) -> Result<ChatResponse, CapabilityError>;
}

pub trait EmbeddingService: Send + Sync {
    fn embed(
        &self,
        deadline: &Deadline,
        provider: &str,
        model: &str,
        texts: &[String],
    ) -> Result<EmbeddingResponse, CapabilityError>;
}

pub trait VectorService: Send + Sync {
    fn upsert(
        &self,
        deadline: &Deadline,
        collection: &str,
        documents: Vec<VectorDocument>,
        options: &UpsertOptions,
    ) -> Result<UpsertResult, CapabilityError>;

    fn query(
        &self,
        deadline: &Deadline,
        collection: &str,
        query: QueryInput,
        options: &QueryOptions,
    ) -> Result<Vec<VectorMatch>, CapabilityError>;

    fn delete(
        &self,
        deadline: &Deadline,
        collection: &str,
        ids: &[String],
    ) -> Result<usize, CapabilityError>;

    fn list_collections(&self, deadline: &Deadline)
        -> Result<Vec<CollectionInfo>, CapabilityError>;
}

pub trait WorkflowStepExecutor: Send + Sync {
    fn execute_step(
        &self,
        deadline: &Deadline,
        name: &str,
        input: Map<String, Value>,
    ) -> Result<Map<String, Value>, CapabilityError>;
}

pub trait HumanApprovalService: Send + Sync {
    fn request_approval(
        &self,
        deadline: &Deadline,
        request: &ApprovalRequest,
    ) -> Result<ApprovalDecision, CapabilityError>;
}

pub trait AdapterService: Send + Sync {
    fn call(
        &self,
        deadline: &Deadline,
        adapter_id: &str,
        input: Value,
    ) -> Result<Value, CapabilityError>;
}

/// Read-only access to one kind of platform record (blocks, workflows or runs).
pub trait ResourceReader: Send + Sync {
    fn get(&self, deadline: &Deadline, id: &str) -> Result<Option<Value>, CapabilityError>;

    fn list(&self, deadline: &Deadline, query: &ListQuery) -> Result<Vec<Value>, CapabilityError>;
}

pub trait BuilderService: Send + Sync {
    fn create(
        &self,
        deadline: &Deadline,
        kind: &str,
        payload: Value,
    ) -> Result<Value, CapabilityError>;

    fn update(
        &self,
        deadline: &Deadline,
        kind: &str,
        id: &str,
        payload: Value,
    ) -> Result<Value, CapabilityError>;

    fn delete(&self, deadline: &Deadline, kind: &str, id: &str) -> Result<bool, CapabilityError>;
}
