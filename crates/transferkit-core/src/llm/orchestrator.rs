//! Ordered provider fallback with retries and rate-limit escalation

use super::classify::{classify, AdapterFailure, RetryDecision};
use super::{
    DegradedProvider, GenerationOptions, ProviderAdapter, ProviderError, ProviderResponse,
    ProviderResult,
};
use crate::config::OrchestratorConfig;
use std::sync::Arc;
use std::time::Duration;

/// Calls generative providers in order until one answers.
///
/// The degraded adapter is always last, so with degraded mode allowed a
/// generation call only fails when the configuration itself is broken.
pub struct ProviderOrchestrator {
    adapters: Vec<Arc<dyn ProviderAdapter>>,
    max_retries: u32,
    retry_delay: Duration,
    call_timeout: Duration,
    allow_degraded: bool,
}

impl ProviderOrchestrator {
    /// Build from an ordered adapter list. Degraded adapters are moved to the
    /// end and one is appended if none was given.
    pub fn new(adapters: Vec<Arc<dyn ProviderAdapter>>, config: &OrchestratorConfig) -> Self {
        let (degraded, mut ordered): (Vec<_>, Vec<_>) =
            adapters.into_iter().partition(|a| a.is_degraded());

        match degraded.into_iter().next() {
            Some(d) => ordered.push(d),
            None => ordered.push(Arc::new(DegradedProvider::new())),
        }

        Self {
            adapters: ordered,
            max_retries: config.max_retries.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            call_timeout: Duration::from_secs(config.call_timeout_secs),
            allow_degraded: config.allow_degraded,
        }
    }

    /// Adapters in the order they are tried
    pub fn adapters(&self) -> &[Arc<dyn ProviderAdapter>] {
        &self.adapters
    }

    /// Availability of every adapter, in order
    pub async fn availability(&self) -> Vec<(String, bool)> {
        let mut statuses = Vec::with_capacity(self.adapters.len());
        for adapter in &self.adapters {
            let available = self.probe(adapter.as_ref()).await;
            statuses.push((adapter.name().to_string(), available));
        }
        statuses
    }

    async fn probe(&self, adapter: &dyn ProviderAdapter) -> bool {
        tokio::time::timeout(self.call_timeout, adapter.is_available())
            .await
            .unwrap_or(false)
    }

    fn skipped(&self, adapter: &dyn ProviderAdapter, options: &GenerationOptions) -> bool {
        if adapter.is_degraded() && !options.allow_degraded.unwrap_or(self.allow_degraded) {
            return true;
        }
        options
            .excluded_providers
            .iter()
            .any(|name| name == adapter.name())
    }

    /// Generate text with ordered fallback
    pub async fn generate_text(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> ProviderResult<ProviderResponse> {
        let timeout = options.timeout.unwrap_or(self.call_timeout);
        let mut failures = Vec::new();

        for adapter in &self.adapters {
            if self.skipped(adapter.as_ref(), options) {
                tracing::debug!(provider = adapter.name(), "Provider disallowed for this call");
                continue;
            }

            if !self.probe(adapter.as_ref()).await {
                tracing::debug!(provider = adapter.name(), "Provider unavailable, skipping");
                failures.push(AdapterFailure {
                    provider: adapter.name().to_string(),
                    attempts: 0,
                    error: ProviderError::Unavailable(adapter.name().to_string()).to_string(),
                });
                continue;
            }

            let mut attempt = 0u32;
            loop {
                attempt += 1;
                let outcome =
                    match tokio::time::timeout(timeout, adapter.generate_text(prompt, options))
                        .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(ProviderError::Timeout(timeout)),
                    };

                let err = match outcome {
                    Ok(mut response) => {
                        response.degraded = adapter.is_degraded();
                        if response.degraded {
                            tracing::warn!("All real providers failed; serving degraded response");
                        } else {
                            tracing::info!(
                                provider = adapter.name(),
                                model = %response.model_name,
                                attempt,
                                tokens = response.total_tokens(),
                                "Generation succeeded"
                            );
                        }
                        return Ok(response);
                    }
                    Err(err) => err,
                };

                match classify(&err, attempt, self.max_retries) {
                    RetryDecision::Retry => {
                        let delay = self.retry_delay * attempt;
                        tracing::warn!(
                            provider = adapter.name(),
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "Transient provider error, retrying: {}",
                            err
                        );
                        tokio::time::sleep(delay).await;
                    }
                    RetryDecision::AbortAdapter => {
                        tracing::warn!(
                            provider = adapter.name(),
                            attempt,
                            "Rate limited, moving to next provider: {}",
                            err
                        );
                        failures.push(AdapterFailure {
                            provider: adapter.name().to_string(),
                            attempts: attempt,
                            error: err.to_string(),
                        });
                        break;
                    }
                    RetryDecision::AdapterExhausted => {
                        tracing::warn!(
                            provider = adapter.name(),
                            attempt,
                            "Provider exhausted, moving to next provider: {}",
                            err
                        );
                        failures.push(AdapterFailure {
                            provider: adapter.name().to_string(),
                            attempts: attempt,
                            error: err.to_string(),
                        });
                        break;
                    }
                }
            }
        }

        let err = ProviderError::AllProvidersExhausted(failures);
        tracing::error!("{}", err);
        Err(err)
    }

    /// Generate an embedding: one attempt per real adapter, never degraded
    pub async fn generate_embedding(&self, text: &str) -> ProviderResult<Vec<f32>> {
        let mut failures = Vec::new();

        for adapter in self.adapters.iter().filter(|a| !a.is_degraded()) {
            if !self.probe(adapter.as_ref()).await {
                failures.push(AdapterFailure {
                    provider: adapter.name().to_string(),
                    attempts: 0,
                    error: ProviderError::Unavailable(adapter.name().to_string()).to_string(),
                });
                continue;
            }

            let outcome = match tokio::time::timeout(self.call_timeout, adapter.embed(text)).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(self.call_timeout)),
            };

            match outcome {
                Ok(embedding) => return Ok(embedding),
                Err(err) => {
                    tracing::warn!(provider = adapter.name(), "Embedding failed: {}", err);
                    failures.push(AdapterFailure {
                        provider: adapter.name().to_string(),
                        attempts: 1,
                        error: err.to_string(),
                    });
                }
            }
        }

        Err(ProviderError::AllProvidersExhausted(failures))
    }
}
