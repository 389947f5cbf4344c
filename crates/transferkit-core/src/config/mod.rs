//! Configuration management

use crate::error::{Result, TransferError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Generative providers in fallback order (degraded mode is appended implicitly)
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,

    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub policy: PolicyConfig,
}

/// Backend protocol spoken by a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI-compatible API (OpenAI, vLLM, OpenRouter, ...)
    Openai,
    /// Ollama native API
    Ollama,
}

/// A single generative-text backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Display name, reported as `provider_name` in responses
    pub name: String,

    pub kind: ProviderKind,

    /// Base URL of the service
    pub url: String,

    /// Model name for text generation
    pub model: String,

    /// Model name for embeddings (embedding calls are skipped when absent)
    #[serde(default)]
    pub embedding_model: Option<String>,

    /// Model tier (from policy caps) to model name
    #[serde(default)]
    pub tier_models: HashMap<String, String>,

    /// API key (optional, for authenticated services)
    #[serde(default)]
    pub api_key: Option<String>,

    /// HTTP client timeout in seconds
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: "primary".to_string(),
            kind: ProviderKind::Openai,
            url: std::env::var("TRANSFERKIT_LLM_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            model: std::env::var("TRANSFERKIT_LLM_MODEL")
                .unwrap_or_else(|_| "meta-llama/Llama-3.1-8B-Instruct".to_string()),
            embedding_model: std::env::var("TRANSFERKIT_EMBEDDING_MODEL").ok(),
            tier_models: HashMap::new(),
            api_key: std::env::var("TRANSFERKIT_LLM_API_KEY").ok(),
            timeout_secs: default_provider_timeout(),
        }
    }
}

impl ProviderConfig {
    /// Provider built purely from environment variables, if a URL is set
    pub fn from_env() -> Option<Self> {
        std::env::var("TRANSFERKIT_LLM_URL").ok()?;
        Some(Self::default())
    }

    /// Model for a call: explicit override, then tier mapping, then default
    pub fn resolve_model(&self, explicit: Option<&str>, tier: Option<&str>) -> String {
        explicit
            .map(str::to_string)
            .or_else(|| tier.and_then(|t| self.tier_models.get(t).cloned()))
            .unwrap_or_else(|| self.model.clone())
    }
}

fn default_provider_timeout() -> u64 {
    30
}

/// Retry and fallback settings for the provider orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Attempts per adapter for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Linear backoff base; attempt `n` waits `retry_delay_ms * n`
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Per-call timeout applied at the provider boundary
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    /// Whether the degraded adapter may answer generation calls
    #[serde(default = "default_true")]
    pub allow_degraded: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            call_timeout_secs: default_call_timeout_secs(),
            allow_degraded: true,
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_call_timeout_secs() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

/// Fast cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Leading segment of every cache key
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// TTL for complete results and LLM enrichments
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// TTL for results still missing analogies or domains
    #[serde(default = "default_ttl_secs")]
    pub negative_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            ttl_secs: default_ttl_secs(),
            negative_ttl_secs: default_ttl_secs(),
        }
    }
}

fn default_namespace() -> String {
    "transfer".to_string()
}

/// Seven days
fn default_ttl_secs() -> u64 {
    604_800
}

/// Extraction pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Algorithm version stamped on cache keys and stored rows
    #[serde(default = "default_version")]
    pub version: String,

    /// Prompt language when the caller supplies none. Cache keys always
    /// fall back to "pt".
    #[serde(default = "default_language")]
    pub default_language: String,

    /// Concurrent resolutions when extracting a whole content item
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            default_language: default_language(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_version() -> String {
    "v1".to_string()
}

fn default_language() -> String {
    "pt".to_string()
}

fn default_concurrency() -> usize {
    4
}

/// Generative fallback policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Master switch for generative fallback
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Session phases in which fallback is never allowed (case-insensitive)
    #[serde(default = "default_denied_phases")]
    pub denied_phases: Vec<String>,

    /// Token cap handed to providers
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Model tier label handed to providers
    #[serde(default = "default_model_tier")]
    pub model_tier: String,

    /// Generative calls allowed per caller for the lifetime of the process
    #[serde(default)]
    pub max_calls_per_caller: Option<u32>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            denied_phases: default_denied_phases(),
            max_tokens: default_max_tokens(),
            model_tier: default_model_tier(),
            max_calls_per_caller: None,
        }
    }
}

fn default_denied_phases() -> Vec<String> {
    vec!["assessment".to_string()]
}

fn default_max_tokens() -> u32 {
    512
}

fn default_model_tier() -> String {
    "standard".to_string()
}

impl Config {
    /// Load config from `TRANSFERKIT_CONFIG` or the default path
    pub fn load() -> Result<Self> {
        let path = std::env::var("TRANSFERKIT_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::default_path());
        Self::load_from(&path)
    }

    /// Load config from a specific path; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to a path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get default config path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(crate::CONFIG_DIR_NAME)
            .join("config.yml")
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.orchestrator.max_retries == 0 {
            return Err(TransferError::Config(
                "orchestrator.max_retries must be at least 1".to_string(),
            ));
        }
        if self.pipeline.concurrency == 0 {
            return Err(TransferError::Config(
                "pipeline.concurrency must be at least 1".to_string(),
            ));
        }
        if self.cache.namespace.contains(':') {
            return Err(TransferError::Config(
                "cache.namespace must not contain ':'".to_string(),
            ));
        }
        for provider in &self.providers {
            if provider.name == crate::llm::DEGRADED_PROVIDER_NAME {
                return Err(TransferError::Config(format!(
                    "provider name '{}' is reserved",
                    provider.name
                )));
            }
        }
        Ok(())
    }
}
