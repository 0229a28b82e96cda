use super::services::{
    AdapterService, BuilderService, EmbeddingService, HttpClient, HumanApprovalService,
    LlmService, ResourceReader, VectorService, WorkflowStepExecutor,
};
use super::types::{
    ApprovalRequest, ChatRequest, HttpRequest, ListQuery, QueryInput, QueryOptions,
    UpsertOptions, VectorDocument,
};
use super::{CapabilityBinding, CapabilityError, CapabilityKind};
use crate::shared::Deadline;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Positional argument reader. Positions in messages are 1-based.
struct Args<'a> {
    method: &'a str,
    values: Vec<Value>,
}

impl<'a> Args<'a> {
    fn new(method: &'a str, values: Vec<Value>) -> Self {
        Self { method, values }
    }

    fn expect_between(&self, min: usize, max: usize) -> Result<(), CapabilityError> {
        let count = self.values.len();
        if count < min || count > max {
            let expected = if min == max {
                format!("{min}")
            } else {
                format!("{min} to {max}")
            };
            return Err(self.error(format!(
                "expected {expected} argument(s), got {count}"
            )));
        }
        Ok(())
    }

    fn value(&self, index: usize) -> Value {
        self.values.get(index).cloned().unwrap_or(Value::Null)
    }

    fn string(&self, index: usize) -> Result<String, CapabilityError> {
        match self.values.get(index) {
            Some(Value::String(text)) if !text.trim().is_empty() => Ok(text.clone()),
            Some(Value::String(_)) => Err(self.error(format!(
                "argument {} must be a non-empty string",
                index + 1
            ))),
            _ => Err(self.error(format!("argument {} must be a string", index + 1))),
        }
    }

    fn object(&self, index: usize) -> Result<Map<String, Value>, CapabilityError> {
        match self.values.get(index) {
            Some(Value::Object(map)) => Ok(map.clone()),
            _ => Err(self.error(format!("argument {} must be an object", index + 1))),
        }
    }

    fn optional_object(&self, index: usize) -> Result<Map<String, Value>, CapabilityError> {
        match self.values.get(index) {
            None | Some(Value::Null) => Ok(Map::new()),
            Some(Value::Object(map)) => Ok(map.clone()),
            Some(_) => Err(self.error(format!(
                "argument {} must be an object when provided",
                index + 1
            ))),
        }
    }

    fn array(&self, index: usize) -> Result<Vec<Value>, CapabilityError> {
        match self.values.get(index) {
            Some(Value::Array(items)) => Ok(items.clone()),
            _ => Err(self.error(format!("argument {} must be an array", index + 1))),
        }
    }

    fn string_array(&self, index: usize) -> Result<Vec<String>, CapabilityError> {
        self.array(index)?
            .into_iter()
            .map(|item| match item {
                Value::String(text) => Ok(text),
                _ => Err(self.error(format!(
                    "argument {} must be an array of strings",
                    index + 1
                ))),
            })
            .collect()
    }

    fn decode<T: DeserializeOwned>(&self, index: usize, value: Value) -> Result<T, CapabilityError> {
        serde_json::from_value(value)
            .map_err(|err| self.error(format!("argument {} is malformed: {err}", index + 1)))
    }

    fn error(&self, reason: String) -> CapabilityError {
        CapabilityError::argument(self.method, reason)
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Value, CapabilityError> {
    serde_json::to_value(value).map_err(|err| CapabilityError::Serialization(err.to_string()))
}

fn unknown_method(kind: CapabilityKind, method: &str) -> CapabilityError {
    CapabilityError::UnknownMethod {
        capability: kind.namespace().to_string(),
        method: method.to_string(),
    }
}

pub struct HttpBinding {
    client: Arc<dyn HttpClient>,
}

impl HttpBinding {
    pub fn new(client: Arc<dyn HttpClient>) -> Self {
        Self { client }
    }
}

impl CapabilityBinding for HttpBinding {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Http
    }

    fn methods(&self) -> &'static [&'static str] {
        &["request"]
    }

    fn invoke(
        &self,
        deadline: &Deadline,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, CapabilityError> {
        if method != "request" {
            return Err(unknown_method(self.kind(), method));
        }
        let args = Args::new("http.request", args);
        args.expect_between(1, 1)?;
        let options = args.object(0)?;
        let url = match options.get("url") {
            Some(Value::String(url)) if !url.trim().is_empty() => url.clone(),
            _ => {
                return Err(CapabilityError::argument(
                    "http.request",
                    "`url` must be a non-empty string",
                ))
            }
        };
        let method_name = options
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or("GET")
            .to_ascii_uppercase();
        let mut headers = BTreeMap::new();
        if let Some(raw_headers) = options.get("headers") {
            let Value::Object(raw_headers) = raw_headers else {
                return Err(CapabilityError::argument(
                    "http.request",
                    "`headers` must be an object",
                ));
            };
            for (name, value) in raw_headers {
                headers.insert(name.clone(), crate::template::value_to_text(value));
            }
        }
        let mut request = HttpRequest {
            method: method_name,
            url,
            headers,
            body: None,
        };
        match options.get("body") {
            None | Some(Value::Null) => {}
            Some(Value::String(text)) => request.body = Some(text.clone()),
            Some(other) => {
                request.body = Some(other.to_string());
                if request.header("content-type").is_none() {
                    request
                        .headers
                        .insert("Content-Type".to_string(), "application/json".to_string());
                }
            }
        }

        let response = self.client.send(deadline, &request)?;
        let body = serde_json::from_str::<Value>(&response.body)
            .unwrap_or_else(|_| Value::String(response.body.clone()));
        Ok(Value::Object(Map::from_iter([
            ("status".to_string(), Value::from(response.status)),
            ("headers".to_string(), encode(&response.headers)?),
            ("body".to_string(), body),
        ])))
    }
}

pub struct LlmBinding {
    service: Arc<dyn LlmService>,
}

impl LlmBinding {
    pub fn new(service: Arc<dyn LlmService>) -> Self {
        Self { service }
    }
}

impl CapabilityBinding for LlmBinding {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Llm
    }

    fn methods(&self) -> &'static [&'static str] {
        &["chat"]
    }

    fn invoke(
        &self,
        deadline: &Deadline,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, CapabilityError> {
        if method != "chat" {
            return Err(unknown_method(self.kind(), method));
        }
        let args = Args::new("llm.chat", args);
        args.expect_between(3, 3)?;
        let provider = args.string(0)?;
        let model = args.string(1)?;
        let request: ChatRequest = args.decode(2, Value::Object(args.object(2)?))?;
        if request.messages.is_empty() {
            return Err(CapabilityError::argument(
                "llm.chat",
                "request.messages must contain at least one message",
            ));
        }
        let response = self.service.chat(deadline, &provider, &model, &request)?;
        encode(&response)
    }
}

pub struct EmbeddingBinding {
    service: Arc<dyn EmbeddingService>,
}

impl EmbeddingBinding {
    pub fn new(service: Arc<dyn EmbeddingService>) -> Self {
        Self { service }
    }
}

impl CapabilityBinding for EmbeddingBinding {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Embedding
    }

    fn methods(&self) -> &'static [&'static str] {
        &["embed"]
    }

    fn invoke(
        &self,
        deadline: &Deadline,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, CapabilityError> {
        if method != "embed" {
            return Err(unknown_method(self.kind(), method));
        }
        let args = Args::new("embedding.embed", args);
        args.expect_between(3, 3)?;
        let provider = args.string(0)?;
        let model = args.string(1)?;
        let texts = match args.value(2) {
            Value::String(text) => vec![text],
            _ => args.string_array(2)?,
        };
        if texts.is_empty() {
            return Err(CapabilityError::argument(
                "embedding.embed",
                "argument 3 must contain at least one text",
            ));
        }
        let response = self.service.embed(deadline, &provider, &model, &texts)?;
        encode(&response)
    }
}

pub struct VectorBinding {
    service: Arc<dyn VectorService>,
}

impl VectorBinding {
    pub fn new(service: Arc<dyn VectorService>) -> Self {
        Self { service }
    }
}

impl CapabilityBinding for VectorBinding {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Vector
    }

    fn methods(&self) -> &'static [&'static str] {
        &["upsert", "query", "delete", "listCollections"]
    }

    fn invoke(
        &self,
        deadline: &Deadline,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, CapabilityError> {
        match method {
            "upsert" => {
                let args = Args::new("vector.upsert", args);
                args.expect_between(2, 3)?;
                let collection = args.string(0)?;
                let documents: Vec<VectorDocument> =
                    args.decode(1, Value::Array(args.array(1)?))?;
                let options: UpsertOptions =
                    args.decode(2, Value::Object(args.optional_object(2)?))?;
                let result = self
                    .service
                    .upsert(deadline, &collection, documents, &options)?;
                encode(&result)
            }
            "query" => {
                let args = Args::new("vector.query", args);
                args.expect_between(2, 3)?;
                let collection = args.string(0)?;
                let query = match args.value(1) {
                    Value::String(text) if !text.trim().is_empty() => QueryInput::Text(text),
                    value @ Value::Array(_) => args.decode::<Vec<f32>>(1, value).map(QueryInput::Vector)?,
                    _ => {
                        return Err(CapabilityError::argument(
                            "vector.query",
                            "argument 2 must be a vector (array of numbers) or query text",
                        ))
                    }
                };
                let options: QueryOptions =
                    args.decode(2, Value::Object(args.optional_object(2)?))?;
                let matches = self.service.query(deadline, &collection, query, &options)?;
                encode(&matches)
            }
            "delete" => {
                let args = Args::new("vector.delete", args);
                args.expect_between(2, 2)?;
                let collection = args.string(0)?;
                let ids = args.string_array(1)?;
                let deleted = self.service.delete(deadline, &collection, &ids)?;
                Ok(Value::Object(Map::from_iter([(
                    "deleted".to_string(),
                    Value::from(deleted),
                )])))
            }
            "listCollections" => {
                let args = Args::new("vector.listCollections", args);
                args.expect_between(0, 0)?;
                encode(&self.service.list_collections(deadline)?)
            }
            other => Err(unknown_method(self.kind(), other)),
        }
    }
}

pub struct WorkflowBinding {
    executor: Arc<dyn WorkflowStepExecutor>,
}

impl WorkflowBinding {
    pub fn new(executor: Arc<dyn WorkflowStepExecutor>) -> Self {
        Self { executor }
    }
}

impl CapabilityBinding for WorkflowBinding {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Workflow
    }

    fn methods(&self) -> &'static [&'static str] {
        &["executeStep"]
    }

    fn invoke(
        &self,
        deadline: &Deadline,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, CapabilityError> {
        if method != "executeStep" {
            return Err(unknown_method(self.kind(), method));
        }
        let args = Args::new("workflow.executeStep", args);
        args.expect_between(1, 2)?;
        let name = args.string(0)?;
        let input = args.optional_object(1)?;
        let output = self.executor.execute_step(deadline, &name, input)?;
        Ok(Value::Object(output))
    }
}

pub struct HumanApprovalBinding {
    service: Arc<dyn HumanApprovalService>,
}

impl HumanApprovalBinding {
    pub fn new(service: Arc<dyn HumanApprovalService>) -> Self {
        Self { service }
    }
}

impl CapabilityBinding for HumanApprovalBinding {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::HumanApproval
    }

    fn methods(&self) -> &'static [&'static str] {
        &["request"]
    }

    fn invoke(
        &self,
        deadline: &Deadline,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, CapabilityError> {
        if method != "request" {
            return Err(unknown_method(self.kind(), method));
        }
        let args = Args::new("humanApproval.request", args);
        args.expect_between(1, 1)?;
        let request: ApprovalRequest = args.decode(0, Value::Object(args.object(0)?))?;
        if request.title.trim().is_empty() {
            return Err(CapabilityError::argument(
                "humanApproval.request",
                "`title` must be a non-empty string",
            ));
        }
        encode(&self.service.request_approval(deadline, &request)?)
    }
}

pub struct AdapterBinding {
    service: Arc<dyn AdapterService>,
}

impl AdapterBinding {
    pub fn new(service: Arc<dyn AdapterService>) -> Self {
        Self { service }
    }
}

impl CapabilityBinding for AdapterBinding {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Adapter
    }

    fn methods(&self) -> &'static [&'static str] {
        &["call"]
    }

    fn invoke(
        &self,
        deadline: &Deadline,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, CapabilityError> {
        if method != "call" {
            return Err(unknown_method(self.kind(), method));
        }
        let args = Args::new("adapter.call", args);
        args.expect_between(1, 2)?;
        let adapter_id = args.string(0)?;
        self.service.call(deadline, &adapter_id, args.value(1))
    }
}

/// Shared by the `blocks`, `workflows` and `runs` namespaces.
pub struct ResourceBinding {
    kind: CapabilityKind,
    reader: Arc<dyn ResourceReader>,
}

impl ResourceBinding {
    pub fn blocks(reader: Arc<dyn ResourceReader>) -> Self {
        Self {
            kind: CapabilityKind::Blocks,
            reader,
        }
    }

    pub fn workflows(reader: Arc<dyn ResourceReader>) -> Self {
        Self {
            kind: CapabilityKind::Workflows,
            reader,
        }
    }

    pub fn runs(reader: Arc<dyn ResourceReader>) -> Self {
        Self {
            kind: CapabilityKind::Runs,
            reader,
        }
    }
}

impl CapabilityBinding for ResourceBinding {
    fn kind(&self) -> CapabilityKind {
        self.kind
    }

    fn methods(&self) -> &'static [&'static str] {
        &["get", "list"]
    }

    fn invoke(
        &self,
        deadline: &Deadline,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, CapabilityError> {
        let label = format!("{}.{}", self.kind.namespace(), method);
        match method {
            "get" => {
                let args = Args::new(&label, args);
                args.expect_between(1, 1)?;
                let id = args.string(0)?;
                Ok(self.reader.get(deadline, &id)?.unwrap_or(Value::Null))
            }
            "list" => {
                let args = Args::new(&label, args);
                args.expect_between(0, 1)?;
                let query: ListQuery = args.decode(0, Value::Object(args.optional_object(0)?))?;
                Ok(Value::Array(self.reader.list(deadline, &query)?))
            }
            other => Err(unknown_method(self.kind, other)),
        }
    }
}

pub struct BuilderBinding {
    service: Arc<dyn BuilderService>,
}

impl BuilderBinding {
    pub fn new(service: Arc<dyn BuilderService>) -> Self {
        Self { service }
    }
}

impl CapabilityBinding for BuilderBinding {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Builder
    }

    fn methods(&self) -> &'static [&'static str] {
        &["create", "update", "delete"]
    }

    fn invoke(
        &self,
        deadline: &Deadline,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, CapabilityError> {
        match method {
            "create" => {
                let args = Args::new("builder.create", args);
                args.expect_between(2, 2)?;
                let kind = args.string(0)?;
                let payload = Value::Object(args.object(1)?);
                self.service.create(deadline, &kind, payload)
            }
            "update" => {
                let args = Args::new("builder.update", args);
                args.expect_between(3, 3)?;
                let kind = args.string(0)?;
                let id = args.string(1)?;
                let payload = Value::Object(args.object(2)?);
                self.service.update(deadline, &kind, &id, payload)
            }
            "delete" => {
                let args = Args::new("builder.delete", args);
                args.expect_between(2, 2)?;
                let kind = args.string(0)?;
                let id = args.string(1)?;
                let deleted = self.service.delete(deadline, &kind, &id)?;
                Ok(Value::Object(Map::from_iter([(
                    "deleted".to_string(),
                    Value::Bool(deleted),
                )])))
            }
            other => Err(unknown_method(self.kind(), other)),
        }
    }
}
