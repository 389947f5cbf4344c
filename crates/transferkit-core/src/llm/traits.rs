//! Provider trait definitions

use super::ProviderError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Result type for provider calls
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Uniform capability wrapper around one generative-text backend
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Provider name reported in responses
    fn name(&self) -> &str;

    /// Default generation model
    fn model_name(&self) -> &str;

    /// Whether this adapter only produces placeholder output
    fn is_degraded(&self) -> bool {
        false
    }

    /// Cheap readiness probe; unavailable adapters are skipped
    async fn is_available(&self) -> bool;

    /// Generate text for a prompt
    async fn generate_text(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> ProviderResult<ProviderResponse>;

    /// Generate an embedding vector
    async fn embed(&self, text: &str) -> ProviderResult<Vec<f32>>;
}

/// Per-call generation options
#[derive(Debug, Clone, Default)]
pub struct GenerationOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Explicit model override
    pub model: Option<String>,
    /// Model tier from the policy decision, mapped per provider
    pub model_tier: Option<String>,
    /// Per-call timeout; the orchestrator default applies when unset
    pub timeout: Option<Duration>,
    /// Overrides the orchestrator's degraded-mode setting for this call
    pub allow_degraded: Option<bool>,
    /// Providers the caller refuses to use for this call
    pub excluded_providers: Vec<String>,
}

impl GenerationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_model_tier(mut self, tier: impl Into<String>) -> Self {
        self.model_tier = Some(tier.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Require a real answer: never fall through to degraded mode
    pub fn require_real_answer(mut self) -> Self {
        self.allow_degraded = Some(false);
        self
    }

    pub fn exclude_provider(mut self, name: impl Into<String>) -> Self {
        self.excluded_providers.push(name.into());
        self
    }
}

/// Token accounting reported by a provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Text produced by a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    pub provider_name: String,
    pub model_name: String,
    /// Set when the text is the degraded placeholder rather than real output
    #[serde(default)]
    pub degraded: bool,
}

impl ProviderResponse {
    pub fn total_tokens(&self) -> u32 {
        self.usage.map(|u| u.total_tokens).unwrap_or(0)
    }
}
