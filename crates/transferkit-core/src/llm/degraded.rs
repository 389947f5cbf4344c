//! Terminal fallback adapter

use super::{GenerationOptions, ProviderAdapter, ProviderError, ProviderResponse, ProviderResult};
use async_trait::async_trait;

/// Provider name that marks degraded output
pub const DEGRADED_PROVIDER_NAME: &str = "degraded";

/// Placeholder text returned in degraded mode
pub const DEGRADED_RESPONSE_TEXT: &str =
    "[degraded] No generative provider was available; this placeholder carries no content.";

/// Always-available adapter returning a deterministic placeholder.
///
/// Its responses carry `degraded = true`; the orchestrator also sets the flag
/// from `is_degraded()` so a provider merely named "degraded" is not mistaken
/// for it.
#[derive(Debug, Clone, Copy, Default)]
pub struct DegradedProvider;

impl DegradedProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProviderAdapter for DegradedProvider {
    fn name(&self) -> &str {
        DEGRADED_PROVIDER_NAME
    }

    fn model_name(&self) -> &str {
        "none"
    }

    fn is_degraded(&self) -> bool {
        true
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn generate_text(
        &self,
        _prompt: &str,
        _options: &GenerationOptions,
    ) -> ProviderResult<ProviderResponse> {
        Ok(ProviderResponse {
            text: DEGRADED_RESPONSE_TEXT.to_string(),
            usage: None,
            provider_name: DEGRADED_PROVIDER_NAME.to_string(),
            model_name: "none".to_string(),
            degraded: true,
        })
    }

    async fn embed(&self, _text: &str) -> ProviderResult<Vec<f32>> {
        Err(ProviderError::Unsupported(
            "degraded mode cannot produce embeddings".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_degraded_is_deterministic() {
        let provider = DegradedProvider::new();
        assert!(provider.is_available().await);

        let a = provider
            .generate_text("one", &GenerationOptions::new())
            .await
            .unwrap();
        let b = provider
            .generate_text("two", &GenerationOptions::new().with_max_tokens(8))
            .await
            .unwrap();

        assert_eq!(a, b);
        assert!(!a.text.is_empty());
        assert_eq!(a.provider_name, DEGRADED_PROVIDER_NAME);
        assert!(a.degraded);
    }

    #[tokio::test]
    async fn test_degraded_refuses_embeddings() {
        let err = DegradedProvider::new().embed("text").await.unwrap_err();
        assert!(matches!(err, ProviderError::Unsupported(_)));
    }
}
