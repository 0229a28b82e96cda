use super::ConfigError;
use crate::shared::{FileLogSink, LogSink, NullLogSink};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

fn default_sandbox_timeout_ms() -> u64 {
    30_000
}

fn default_memory_limit_bytes() -> usize {
    64 * 1024 * 1024
}

fn default_max_stack_bytes() -> usize {
    1024 * 1024
}

fn default_http_timeout_ms() -> u64 {
    30_000
}

fn default_user_agent() -> String {
    concat!("sandflow/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_database_path() -> PathBuf {
    PathBuf::from("sandflow-vectors.db")
}

fn default_top_k() -> usize {
    5
}

fn default_hybrid_candidates() -> usize {
    50
}

fn default_rrf_k() -> usize {
    60
}

fn default_missing_rank() -> usize {
    100
}

fn default_alpha() -> f64 {
    0.7
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_anthropic_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_anthropic_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

fn default_anthropic_version() -> String {
    "2023-06-01".to_string()
}

fn default_anthropic_max_tokens() -> u32 {
    1024
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSettings {
    pub sandbox: SandboxSettings,
    pub http: HttpSettings,
    pub vector: VectorStoreSettings,
    pub providers: ProviderSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SandboxSettings {
    #[serde(default = "default_sandbox_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_memory_limit_bytes")]
    pub memory_limit_bytes: usize,
    #[serde(default = "default_max_stack_bytes")]
    pub max_stack_bytes: usize,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_sandbox_timeout_ms(),
            memory_limit_bytes: default_memory_limit_bytes(),
            max_stack_bytes: default_max_stack_bytes(),
        }
    }
}

impl SandboxSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct HttpSettings {
    #[serde(default = "default_http_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_http_timeout_ms(),
            user_agent: default_user_agent(),
        }
    }
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct VectorStoreSettings {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
    #[serde(default = "default_hybrid_candidates")]
    pub hybrid_candidates: usize,
    #[serde(default = "default_rrf_k")]
    pub rrf_k: usize,
    #[serde(default = "default_missing_rank")]
    pub missing_rank: usize,
    #[serde(default = "default_alpha")]
    pub default_alpha: f64,
    #[serde(default = "default_embedding_provider")]
    pub embedding_provider: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            default_top_k: default_top_k(),
            hybrid_candidates: default_hybrid_candidates(),
            rrf_k: default_rrf_k(),
            missing_rank: default_missing_rank(),
            default_alpha: default_alpha(),
            embedding_provider: default_embedding_provider(),
            embedding_model: default_embedding_model(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderSettings {
    pub openai: OpenAiSettings,
    pub anthropic: AnthropicSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct OpenAiSettings {
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_openai_api_key_env")]
    pub api_key_env: String,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            api_key_env: default_openai_api_key_env(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct AnthropicSettings {
    #[serde(default = "default_anthropic_base_url")]
    pub base_url: String,
    #[serde(default = "default_anthropic_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_anthropic_version")]
    pub version: String,
    #[serde(default = "default_anthropic_max_tokens")]
    pub max_tokens: u32,
}

impl Default for AnthropicSettings {
    fn default() -> Self {
        Self {
            base_url: default_anthropic_base_url(),
            api_key_env: default_anthropic_api_key_env(),
            version: default_anthropic_version(),
            max_tokens: default_anthropic_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSettings {
    pub path: Option<PathBuf>,
}

impl LoggingSettings {
    pub fn sink(&self) -> Arc<dyn LogSink> {
        match &self.path {
            Some(path) => Arc::new(FileLogSink::new(path.clone())),
            None => Arc::new(NullLogSink),
        }
    }
}

impl EngineSettings {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sandbox.validate().map_err(ConfigError::Settings)?;
        self.http.validate().map_err(ConfigError::Settings)?;
        self.vector.validate().map_err(ConfigError::Settings)?;
        self.providers.validate().map_err(ConfigError::Settings)?;
        Ok(())
    }
}

impl SandboxSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.timeout_ms == 0 {
            return Err("sandbox.timeout_ms must be >= 1".to_string());
        }
        if self.memory_limit_bytes < 1024 * 1024 {
            return Err("sandbox.memory_limit_bytes must be at least 1 MiB".to_string());
        }
        if self.max_stack_bytes < 64 * 1024 {
            return Err("sandbox.max_stack_bytes must be at least 64 KiB".to_string());
        }
        Ok(())
    }
}

impl HttpSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.timeout_ms == 0 {
            return Err("http.timeout_ms must be >= 1".to_string());
        }
        if self.user_agent.trim().is_empty() {
            return Err("http.user_agent must be non-empty".to_string());
        }
        Ok(())
    }
}

impl VectorStoreSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.database_path.as_os_str().is_empty() {
            return Err("vector.database_path must be non-empty".to_string());
        }
        if self.default_top_k == 0 {
            return Err("vector.default_top_k must be >= 1".to_string());
        }
        if self.hybrid_candidates == 0 {
            return Err("vector.hybrid_candidates must be >= 1".to_string());
        }
        if self.rrf_k == 0 {
            return Err("vector.rrf_k must be >= 1".to_string());
        }
        if self.missing_rank <= self.hybrid_candidates {
            return Err(
                "vector.missing_rank must be greater than vector.hybrid_candidates".to_string(),
            );
        }
        if !(0.0..=1.0).contains(&self.default_alpha) {
            return Err("vector.default_alpha must be within [0, 1]".to_string());
        }
        if self.embedding_provider.trim().is_empty() || self.embedding_model.trim().is_empty() {
            return Err(
                "vector.embedding_provider and vector.embedding_model must be non-empty"
                    .to_string(),
            );
        }
        Ok(())
    }
}

impl ProviderSettings {
    pub fn validate(&self) -> Result<(), String> {
        for (field, value) in [
            ("providers.openai.base_url", &self.openai.base_url),
            ("providers.openai.api_key_env", &self.openai.api_key_env),
            ("providers.anthropic.base_url", &self.anthropic.base_url),
            ("providers.anthropic.api_key_env", &self.anthropic.api_key_env),
            ("providers.anthropic.version", &self.anthropic.version),
        ] {
            if value.trim().is_empty() {
                return Err(format!("{field} must be non-empty"));
            }
        }
        if self.anthropic.max_tokens == 0 {
            return Err("providers.anthropic.max_tokens must be >= 1".to_string());
        }
        Ok(())
    }
}
