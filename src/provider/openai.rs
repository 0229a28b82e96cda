use super::{post_json, resolve_api_key, ProviderError};
use crate::capability::{
    ChatRequest, ChatResponse, EmbeddingResponse, EmbeddingUsage, HttpClient, TokenUsage, ToolCall,
};
use crate::config::OpenAiSettings;
use crate::shared::Deadline;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Client for OpenAI and any endpoint speaking the same `/embeddings` and
/// `/chat/completions` contract.
#[derive(Clone)]
pub struct OpenAiCompatibleProvider {
    name: String,
    http: Arc<dyn HttpClient>,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiCompatibleProvider {
    pub fn new(
        name: impl Into<String>,
        http: Arc<dyn HttpClient>,
        base_url: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn from_settings(
        http: Arc<dyn HttpClient>,
        settings: &OpenAiSettings,
    ) -> Result<Self, ProviderError> {
        let api_key = resolve_api_key("openai", &settings.api_key_env)?;
        Ok(Self::new("openai", http, &settings.base_url, Some(api_key)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn headers(&self) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::new();
        if let Some(key) = &self.api_key {
            headers.insert("Authorization".to_string(), format!("Bearer {key}"));
        }
        headers
    }

    pub fn embed(
        &self,
        deadline: &Deadline,
        model: &str,
        texts: &[String],
    ) -> Result<EmbeddingResponse, ProviderError> {
        if texts.is_empty() {
            return Ok(EmbeddingResponse {
                model: model.to_string(),
                ..EmbeddingResponse::default()
            });
        }
        let body = EmbeddingRequestBody {
            model,
            input: texts,
        };
        let mut parsed: EmbeddingResponseBody = post_json(
            self.http.as_ref(),
            deadline,
            &self.name,
            format!("{}/embeddings", self.base_url),
            self.headers(),
            &body,
        )?;
        parsed.data.sort_by_key(|entry| entry.index);
        if parsed.data.len() != texts.len() {
            return Err(ProviderError::Decode {
                provider: self.name.clone(),
                message: format!(
                    "returned {} embeddings for {} inputs",
                    parsed.data.len(),
                    texts.len()
                ),
            });
        }
        let vectors = parsed
            .data
            .into_iter()
            .map(|entry| entry.embedding)
            .collect::<Vec<_>>();
        Ok(EmbeddingResponse {
            dimension: vectors.first().map(Vec::len).unwrap_or(0),
            vectors,
            model: parsed.model.unwrap_or_else(|| model.to_string()),
            usage: EmbeddingUsage {
                total_tokens: parsed.usage.map(|usage| usage.total_tokens).unwrap_or(0),
            },
        })
    }

    pub fn chat(
        &self,
        deadline: &Deadline,
        model: &str,
        request: &ChatRequest,
    ) -> Result<ChatResponse, ProviderError> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = request.system.as_deref().filter(|text| !text.is_empty()) {
            messages.push(WireMessage {
                role: "system",
                content: system,
            });
        }
        for message in &request.messages {
            messages.push(WireMessage {
                role: &message.role,
                content: &message.content,
            });
        }
        let body = ChatRequestBody {
            model,
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            tools: (!request.tools.is_empty()).then_some(&request.tools),
        };
        let parsed: ChatResponseBody = post_json(
            self.http.as_ref(),
            deadline,
            &self.name,
            format!("{}/chat/completions", self.base_url),
            self.headers(),
            &body,
        )?;
        let Some(choice) = parsed.choices.into_iter().next() else {
            return Err(ProviderError::Decode {
                provider: self.name.clone(),
                message: "response has no choices".to_string(),
            });
        };
        let tool_calls = choice.message.tool_calls.map(|calls| {
            calls
                .into_iter()
                .map(|call| ToolCall {
                    id: call.id,
                    arguments: serde_json::from_str(&call.function.arguments)
                        .unwrap_or(Value::String(call.function.arguments)),
                    name: call.function.name,
                })
                .collect::<Vec<_>>()
        });
        let usage = parsed.usage.unwrap_or_default();
        Ok(ChatResponse {
            content: choice.message.content.unwrap_or_default(),
            finish_reason: choice.finish_reason,
            tool_calls,
            usage: TokenUsage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
            },
        })
    }
}

impl std::fmt::Debug for OpenAiCompatibleProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatibleProvider")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Serialize)]
struct EmbeddingRequestBody<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponseBody {
    data: Vec<EmbeddingData>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<EmbeddingUsageBody>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingUsageBody {
    #[serde(default)]
    total_tokens: u64,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequestBody<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseBody {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Default, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}
