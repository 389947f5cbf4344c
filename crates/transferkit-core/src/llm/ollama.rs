//! Ollama provider
//!
//! Talks to Ollama's native API for local models. Retries live in the
//! orchestrator, so every method here makes exactly one request.

use super::{
    GenerationOptions, ProviderAdapter, ProviderError, ProviderResponse, ProviderResult,
    TokenUsage,
};
use crate::config::ProviderConfig;
use crate::error::{Result, TransferError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Ollama API provider for local inference
pub struct OllamaProvider {
    http_client: reqwest::Client,
    config: ProviderConfig,
    timeout: Duration,
}

#[derive(Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    format: &'static str,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Serialize)]
struct EmbeddingsRequest {
    model: String,
    prompt: String,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    embedding: Vec<f32>,
}

impl OllamaProvider {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(TransferError::Http)?;

        Ok(Self {
            http_client,
            config,
            timeout,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{}", self.config.url.trim_end_matches('/'), path)
    }

    async fn post_json<Req, Resp>(&self, path: &str, body: &Req) -> ProviderResult<Resp>
    where
        Req: Serialize + Sync,
        Resp: serde::de::DeserializeOwned,
    {
        let response = self
            .http_client
            .post(self.endpoint(path))
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, self.timeout))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, body));
        }

        response
            .json::<Resp>()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl ProviderAdapter for OllamaProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn is_available(&self) -> bool {
        let response = self
            .http_client
            .get(self.endpoint("tags"))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                tracing::warn!(provider = %self.config.name, status = %resp.status(), "Ollama health check failed");
                false
            }
            Err(e) => {
                tracing::warn!(provider = %self.config.name, "Ollama health check error: {}", e);
                false
            }
        }
    }

    async fn generate_text(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> ProviderResult<ProviderResponse> {
        let model = self
            .config
            .resolve_model(options.model.as_deref(), options.model_tier.as_deref());

        let request = GenerateRequest {
            model: model.clone(),
            prompt: prompt.to_string(),
            stream: false,
            format: "json",
            options: GenerateOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens,
            },
        };

        let response: GenerateResponse = self.post_json("generate", &request).await?;

        let usage = match (response.prompt_eval_count, response.eval_count) {
            (None, None) => None,
            (prompt_tokens, completion_tokens) => {
                let prompt_tokens = prompt_tokens.unwrap_or(0);
                let completion_tokens = completion_tokens.unwrap_or(0);
                Some(TokenUsage {
                    prompt_tokens,
                    completion_tokens,
                    total_tokens: prompt_tokens + completion_tokens,
                })
            }
        };

        Ok(ProviderResponse {
            text: response.response,
            usage,
            provider_name: self.config.name.clone(),
            model_name: model,
            degraded: false,
        })
    }

    async fn embed(&self, text: &str) -> ProviderResult<Vec<f32>> {
        let model = self.config.embedding_model.clone().ok_or_else(|| {
            ProviderError::Unsupported(format!(
                "provider '{}' has no embedding model configured",
                self.config.name
            ))
        })?;

        let request = EmbeddingsRequest {
            model,
            prompt: text.to_string(),
        };
        let response: EmbeddingsResponse = self.post_json("embeddings", &request).await?;
        Ok(response.embedding)
    }
}
