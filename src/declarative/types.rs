use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Request side of a declarative block. Every string is a `{{}}` template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestConfig {
    pub url: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default, alias = "queryParams")]
    pub query_params: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResponseConfig {
    #[serde(default, alias = "successStatus")]
    pub success_status: Vec<u16>,
    /// `output key -> dot path` into `{status, headers, body}`.
    #[serde(default, alias = "outputMapping")]
    pub output_mapping: BTreeMap<String, String>,
}

impl ResponseConfig {
    pub fn accepts(&self, status: u16) -> bool {
        if self.success_status.is_empty() {
            return is_default_success(status);
        }
        self.success_status.contains(&status)
    }
}

pub fn is_default_success(status: u16) -> bool {
    (200..=299).contains(&status)
}

/// One integration step as data. Loaded from JSON or YAML and never mutated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlockDefinition {
    #[serde(default)]
    pub request: Option<RequestConfig>,
    #[serde(default)]
    pub response: Option<ResponseConfig>,
    #[serde(default, alias = "preProcessChain")]
    pub pre_process_chain: Vec<String>,
    #[serde(default, alias = "postProcessChain")]
    pub post_process_chain: Vec<String>,
    #[serde(default)]
    pub code: Option<String>,
}

impl BlockDefinition {
    pub fn inline_code(&self) -> Option<&str> {
        self.code
            .as_deref()
            .filter(|code| !code.trim().is_empty())
    }
}
