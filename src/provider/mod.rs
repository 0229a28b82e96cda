//! Outbound LLM and embedding clients behind the capability traits.
//!
//! Requests go through an [`HttpClient`](crate::capability::HttpClient) so
//! deadlines and timeouts apply the same way they do for scripts.

pub mod anthropic;
pub mod error;
pub mod openai;
pub mod router;

pub use anthropic::AnthropicProvider;
pub use error::ProviderError;
pub use openai::OpenAiCompatibleProvider;
pub use router::ProviderRouter;

use crate::capability::{HttpClient, HttpRequest};
use crate::shared::Deadline;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;

pub(crate) fn resolve_api_key(provider: &str, env: &str) -> Result<String, ProviderError> {
    std::env::var(env)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ProviderError::MissingApiKey {
            provider: provider.to_string(),
            env: env.to_string(),
        })
}

pub(crate) fn post_json<B: Serialize, T: DeserializeOwned>(
    http: &dyn HttpClient,
    deadline: &Deadline,
    provider: &str,
    url: String,
    headers: BTreeMap<String, String>,
    body: &B,
) -> Result<T, ProviderError> {
    let encoded = serde_json::to_string(body).map_err(|source| ProviderError::Encode {
        provider: provider.to_string(),
        source,
    })?;
    let mut request = HttpRequest::new("POST", url);
    request.headers = headers;
    request
        .headers
        .insert("Content-Type".to_string(), "application/json".to_string());
    request.body = Some(encoded);

    let response = http
        .send(deadline, &request)
        .map_err(|source| ProviderError::Transport {
            provider: provider.to_string(),
            source,
        })?;
    if !(200..=299).contains(&response.status) {
        return Err(ProviderError::Status {
            provider: provider.to_string(),
            status: response.status,
            body: response.body,
        });
    }
    serde_json::from_str(&response.body).map_err(|err| ProviderError::Decode {
        provider: provider.to_string(),
        message: err.to_string(),
    })
}
