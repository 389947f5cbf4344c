//! Generative provider integration
//!
//! Provides:
//! - The `ProviderAdapter` capability trait
//! - OpenAI-compatible and Ollama HTTP adapters
//! - The always-available degraded adapter
//! - Error classification and the ordered fallback orchestrator

mod classify;
mod client;
mod degraded;
mod ollama;
mod orchestrator;
mod traits;

pub use classify::{classify, is_rate_limit, AdapterFailure, ProviderError, RetryDecision};
pub use client::{ChatMessage, MetricsSnapshot, OpenAiCompatibleProvider};
pub use degraded::{DegradedProvider, DEGRADED_PROVIDER_NAME, DEGRADED_RESPONSE_TEXT};
pub use ollama::OllamaProvider;
pub use orchestrator::ProviderOrchestrator;
pub use traits::*;

use crate::config::{Config, ProviderConfig, ProviderKind};
use crate::error::Result;
use std::sync::Arc;

/// Build the adapter for one configured provider
pub fn build_adapter(config: &ProviderConfig) -> Result<Arc<dyn ProviderAdapter>> {
    let adapter: Arc<dyn ProviderAdapter> = match config.kind {
        ProviderKind::Openai => Arc::new(OpenAiCompatibleProvider::new(config.clone())?),
        ProviderKind::Ollama => Arc::new(OllamaProvider::new(config.clone())?),
    };
    Ok(adapter)
}

impl ProviderOrchestrator {
    /// Build the orchestrator from configuration, falling back to an
    /// environment-configured provider when the config lists none
    pub fn from_config(config: &Config) -> Result<Self> {
        let providers = if config.providers.is_empty() {
            ProviderConfig::from_env().into_iter().collect()
        } else {
            config.providers.clone()
        };

        let adapters = providers
            .iter()
            .map(build_adapter)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::new(adapters, &config.orchestrator))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_orders_providers() {
        let mut config = Config::default();
        config.providers = vec![
            ProviderConfig {
                name: "remote".to_string(),
                kind: ProviderKind::Openai,
                ..ProviderConfig::default()
            },
            ProviderConfig {
                name: "local".to_string(),
                kind: ProviderKind::Ollama,
                url: "http://localhost:11434".to_string(),
                ..ProviderConfig::default()
            },
        ];

        let orchestrator = ProviderOrchestrator::from_config(&config).unwrap();
        let names: Vec<_> = orchestrator.adapters().iter().map(|a| a.name()).collect();
        assert_eq!(names, vec!["remote", "local", DEGRADED_PROVIDER_NAME]);
    }
}
