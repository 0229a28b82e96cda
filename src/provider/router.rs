use super::{AnthropicProvider, OpenAiCompatibleProvider, ProviderError};
use crate::capability::{
    CapabilityError, ChatRequest, ChatResponse, EmbeddingResponse, EmbeddingService, HttpClient,
    LlmService,
};
use crate::config::ProviderSettings;
use crate::shared::Deadline;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
enum ProviderEntry {
    OpenAiCompatible(OpenAiCompatibleProvider),
    Anthropic(AnthropicProvider),
}

/// Dispatches chat and embedding calls by provider name.
#[derive(Debug, Clone, Default)]
pub struct ProviderRouter {
    providers: BTreeMap<String, ProviderEntry>,
}

impl ProviderRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `openai` and `anthropic` for every provider whose API key
    /// environment variable is set. Missing keys leave that provider out.
    pub fn from_settings(http: Arc<dyn HttpClient>, settings: &ProviderSettings) -> Self {
        let mut router = Self::new();
        if let Ok(openai) = OpenAiCompatibleProvider::from_settings(Arc::clone(&http), &settings.openai)
        {
            router = router.with_openai_compatible("openai", openai);
        }
        if let Ok(anthropic) = AnthropicProvider::from_settings(http, &settings.anthropic) {
            router = router.with_anthropic("anthropic", anthropic);
        }
        router
    }

    pub fn with_openai_compatible(
        mut self,
        name: impl Into<String>,
        provider: OpenAiCompatibleProvider,
    ) -> Self {
        self.providers
            .insert(name.into(), ProviderEntry::OpenAiCompatible(provider));
        self
    }

    pub fn with_anthropic(mut self, name: impl Into<String>, provider: AnthropicProvider) -> Self {
        self.providers
            .insert(name.into(), ProviderEntry::Anthropic(provider));
        self
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    fn entry(&self, provider: &str) -> Result<&ProviderEntry, ProviderError> {
        self.providers
            .get(provider.trim())
            .ok_or_else(|| ProviderError::UnknownProvider(provider.to_string()))
    }

    pub fn chat(
        &self,
        deadline: &Deadline,
        provider: &str,
        model: &str,
        request: &ChatRequest,
    ) -> Result<ChatResponse, ProviderError> {
        match self.entry(provider)? {
            ProviderEntry::OpenAiCompatible(client) => client.chat(deadline, model, request),
            ProviderEntry::Anthropic(client) => client.chat(deadline, model, request),
        }
    }

    pub fn embed(
        &self,
        deadline: &Deadline,
        provider: &str,
        model: &str,
        texts: &[String],
    ) -> Result<EmbeddingResponse, ProviderError> {
        match self.entry(provider)? {
            ProviderEntry::OpenAiCompatible(client) => client.embed(deadline, model, texts),
            ProviderEntry::Anthropic(_) => Err(ProviderError::Unsupported {
                provider: provider.to_string(),
                operation: "embeddings".to_string(),
            }),
        }
    }
}

impl LlmService for ProviderRouter {
    fn chat(
        &self,
        deadline: &Deadline,
        provider: &str,
        model: &str,
        request: &ChatRequest,
    ) -> Result<ChatResponse, CapabilityError> {
        Ok(ProviderRouter::chat(self, deadline, provider, model, request)?)
    }
}

impl EmbeddingService for ProviderRouter {
    fn embed(
        &self,
        deadline: &Deadline,
        provider: &str,
        model: &str,
        texts: &[String],
    ) -> Result<EmbeddingResponse, CapabilityError> {
        Ok(ProviderRouter::embed(self, deadline, provider, model, texts)?)
    }
}
