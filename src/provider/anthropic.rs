use super::{post_json, resolve_api_key, ProviderError};
use crate::capability::{ChatRequest, ChatResponse, HttpClient, TokenUsage, ToolCall};
use crate::config::AnthropicSettings;
use crate::shared::Deadline;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Messages API client. Chat only; Anthropic has no embeddings endpoint.
#[derive(Clone)]
pub struct AnthropicProvider {
    http: Arc<dyn HttpClient>,
    base_url: String,
    api_key: String,
    version: String,
    default_max_tokens: u32,
}

impl AnthropicProvider {
    pub fn new(
        http: Arc<dyn HttpClient>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        version: impl Into<String>,
        default_max_tokens: u32,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            version: version.into(),
            default_max_tokens,
        }
    }

    pub fn from_settings(
        http: Arc<dyn HttpClient>,
        settings: &AnthropicSettings,
    ) -> Result<Self, ProviderError> {
        let api_key = resolve_api_key("anthropic", &settings.api_key_env)?;
        Ok(Self::new(
            http,
            &settings.base_url,
            api_key,
            &settings.version,
            settings.max_tokens,
        ))
    }

    pub fn chat(
        &self,
        deadline: &Deadline,
        model: &str,
        request: &ChatRequest,
    ) -> Result<ChatResponse, ProviderError> {
        let mut system = request.system.clone().unwrap_or_default();
        let mut messages = Vec::with_capacity(request.messages.len());
        for message in &request.messages {
            if message.role == "system" {
                if !system.is_empty() {
                    system.push('\n');
                }
                system.push_str(&message.content);
                continue;
            }
            messages.push(WireMessage {
                role: &message.role,
                content: &message.content,
            });
        }
        let body = MessagesRequestBody {
            model,
            max_tokens: request.max_tokens.unwrap_or(self.default_max_tokens),
            system: (!system.is_empty()).then_some(system.as_str()),
            temperature: request.temperature,
            messages,
            tools: (!request.tools.is_empty()).then_some(&request.tools),
        };

        let headers = BTreeMap::from([
            ("x-api-key".to_string(), self.api_key.clone()),
            ("anthropic-version".to_string(), self.version.clone()),
        ]);
        let parsed: MessagesResponseBody = post_json(
            self.http.as_ref(),
            deadline,
            "anthropic",
            format!("{}/v1/messages", self.base_url),
            headers,
            &body,
        )?;

        let mut text = Vec::new();
        let mut tool_calls = Vec::new();
        for block in parsed.content {
            match block {
                ResponseBlock::Text { text: chunk } => text.push(chunk),
                ResponseBlock::ToolUse { id, name, input } => tool_calls.push(ToolCall {
                    id,
                    name,
                    arguments: input,
                }),
                ResponseBlock::Other => {}
            }
        }
        Ok(ChatResponse {
            content: text.join("\n"),
            finish_reason: parsed.stop_reason,
            tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
            usage: TokenUsage {
                input_tokens: parsed.usage.input_tokens,
                output_tokens: parsed.usage.output_tokens,
            },
        })
    }
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("base_url", &self.base_url)
            .field("version", &self.version)
            .finish()
    }
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct MessagesRequestBody<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponseBody {
    #[serde(default)]
    content: Vec<ResponseBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: MessagesUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
struct MessagesUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}
