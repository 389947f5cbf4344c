//! HTTP client for OpenAI-compatible LLM services (OpenAI, vLLM, OpenRouter, etc.)

use super::{
    GenerationOptions, ProviderAdapter, ProviderError, ProviderResponse, ProviderResult,
    TokenUsage,
};
use crate::config::ProviderConfig;
use crate::error::{Result, TransferError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Timeout for the availability probe
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Chat message for completion requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Running call counters
#[derive(Debug, Default)]
struct CallCounters {
    requests: AtomicU64,
    errors: AtomicU64,
    tokens: AtomicU64,
    latency_ms: AtomicU64,
}

/// Point-in-time view of the call counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub total_errors: u64,
    pub total_tokens: u64,
    pub avg_latency_ms: f64,
}

/// OpenAI-compatible chat/embeddings client
pub struct OpenAiCompatibleProvider {
    http_client: reqwest::Client,
    config: ProviderConfig,
    timeout: Duration,
    metrics: Arc<CallCounters>,
}

impl OpenAiCompatibleProvider {
    /// Create new client from configuration
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
            metrics: Arc::new(CallCounters::default()),
        })
    }

    /// Current call counters
    pub fn metrics(&self) -> MetricsSnapshot {
        let total = self.metrics.requests.load(Ordering::Relaxed);
        MetricsSnapshot {
            total_requests: total,
            total_errors: self.metrics.errors.load(Ordering::Relaxed),
            total_tokens: self.metrics.tokens.load(Ordering::Relaxed),
            avg_latency_ms: if total > 0 {
                self.metrics.latency_ms.load(Ordering::Relaxed) as f64 / total as f64
            } else {
                0.0
            },
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/v1/{}", self.config.url.trim_end_matches('/'), path)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.config.api_key {
            Some(ref api_key) => req.header("Authorization", format!("Bearer {}", api_key)),
            None => req,
        }
    }

    fn record_error(&self) {
        self.metrics.errors.fetch_add(1, Ordering::Relaxed);
    }

    async fn post_json<Req, Resp>(&self, path: &str, body: &Req) -> ProviderResult<Resp>
    where
        Req: Serialize + Sync,
        Resp: serde::de::DeserializeOwned,
    {
        let req = self.authorize(self.http_client.post(self.endpoint(path)).json(body));

        let response = req.send().await.map_err(|e| {
            self.record_error();
            ProviderError::from_reqwest(e, self.timeout)
        })?;

        if !response.status().is_success() {
            self.record_error();
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, body));
        }

        response.json::<Resp>().await.map_err(|e| {
            self.record_error();
            ProviderError::InvalidResponse(e.to_string())
        })
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[derive(Serialize)]
struct EmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
}

#[async_trait]
impl ProviderAdapter for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn is_available(&self) -> bool {
        let req = self.authorize(
            self.http_client
                .get(self.endpoint("models"))
                .timeout(PROBE_TIMEOUT),
        );
        match req.send().await {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                tracing::warn!(provider = %self.config.name, status = %resp.status(), "Availability probe failed");
                false
            }
            Err(e) => {
                tracing::warn!(provider = %self.config.name, "Availability probe error: {}", e);
                false
            }
        }
    }

    async fn generate_text(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> ProviderResult<ProviderResponse> {
        let start = Instant::now();
        self.metrics.requests.fetch_add(1, Ordering::Relaxed);

        let model = self
            .config
            .resolve_model(options.model.as_deref(), options.model_tier.as_deref());

        let request = ChatRequest {
            model: model.clone(),
            messages: vec![
                ChatMessage::system(
                    "You enrich educational content with analogies and subject domains. \
                     Respond ONLY with valid JSON.",
                ),
                ChatMessage::user(prompt),
            ],
            temperature: options.temperature.unwrap_or(0.3),
            max_tokens: options.max_tokens.unwrap_or(512),
        };

        let chat_response: ChatResponse = self.post_json("chat/completions", &request).await?;

        let text = chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| {
                self.record_error();
                ProviderError::InvalidResponse("No choices in completion response".to_string())
            })?;

        let usage = chat_response.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        if let Some(u) = usage {
            self.metrics
                .tokens
                .fetch_add(u64::from(u.total_tokens), Ordering::Relaxed);
        }
        self.metrics
            .latency_ms
            .fetch_add(start.elapsed().as_millis() as u64, Ordering::Relaxed);

        Ok(ProviderResponse {
            text,
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

        self.metrics.requests.fetch_add(1, Ordering::Relaxed);
        let request = EmbedRequest {
            model,
            input: vec![text.to_string()],
        };

        let response: EmbedResponse = self.post_json("embeddings", &request).await?;
        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| ProviderError::InvalidResponse("No embedding returned".to_string()))
    }
}
