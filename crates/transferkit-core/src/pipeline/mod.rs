//! Tiered transfer-metadata resolution
//!
//! Resolution order for a (locator, scope):
//! 1. fast cache (`CACHED_LLM`, one cache hit)
//! 2. metadata store, repopulating the fast cache (`DETERMINISTIC`)
//! 3. deterministic extraction
//! 4. when analogies or domains are missing and policy allows, the `:llm`
//!    cache tier and then a provider call
//!
//! Cache and store failures are logged and bypassed. Provider failures keep
//! the deterministic result.

mod prompt;

pub use prompt::{build_enrichment_prompt, parse_enrichment};

use crate::cache::{build_cache_key, llm_cache_key, CacheKeyParts, FastCache};
use crate::config::Config;
use crate::db::Database;
use crate::error::{Result, TransferError};
use crate::extract::DeterministicExtractor;
use crate::llm::{GenerationOptions, ProviderOrchestrator};
use crate::model::{
    Channel, ContentLocator, Enrichment, ExtractionResult, ExtractionScope, StoredMetadata,
};
use crate::policy::{PhasePolicyGate, PolicyCaps, PolicyGate, PolicyRequest};
use crate::store::{ContentSnapshot, ContentSource, MetadataStore};
use crate::telemetry::{TelemetryEvent, TelemetrySink};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const ENRICHMENT_TEMPERATURE: f32 = 0.2;

/// Caller context shared by single and batch resolution
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub caller_id: Option<String>,
    pub session_phase: Option<String>,
    pub education_level: Option<String>,
    pub language: Option<String>,
}

/// One resolution request
#[derive(Debug, Clone)]
pub struct ResolveRequest {
    pub locator: ContentLocator,
    pub scope: ExtractionScope,
    pub context: RequestContext,
}

impl ResolveRequest {
    pub fn new(locator: ContentLocator, scope: ExtractionScope) -> Self {
        Self {
            locator,
            scope,
            context: RequestContext::default(),
        }
    }

    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_caller(mut self, caller_id: impl Into<String>) -> Self {
        self.context.caller_id = Some(caller_id.into());
        self
    }

    pub fn with_phase(mut self, phase: impl Into<String>) -> Self {
        self.context.session_phase = Some(phase.into());
        self
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.context.education_level = Some(level.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.context.language = Some(language.into());
        self
    }
}

/// Result of a resolution with its provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub result: ExtractionResult,
    pub channel: Channel,
    pub used_llm_count: u32,
    pub cache_hit_count: u32,
}

/// Per-locator outcome of a batch resolution
#[derive(Debug)]
pub struct LocatorResolution {
    pub locator: ContentLocator,
    pub outcome: Result<Resolution>,
}

/// Collaborators the pipeline resolves through
#[derive(Clone)]
pub struct PipelineComponents {
    pub cache: Arc<dyn FastCache>,
    pub store: Arc<dyn MetadataStore>,
    pub source: Arc<dyn ContentSource>,
    pub orchestrator: Arc<ProviderOrchestrator>,
    pub policy: Arc<dyn PolicyGate>,
    pub telemetry: Arc<dyn TelemetrySink>,
}

#[derive(Debug, Clone)]
struct PipelineSettings {
    namespace: String,
    version: String,
    default_language: String,
    ttl: Duration,
    negative_ttl: Duration,
    concurrency: usize,
}

/// Orchestrates cache, store, extraction and generative fallback
pub struct ExtractionPipeline {
    cache: Arc<dyn FastCache>,
    store: Arc<dyn MetadataStore>,
    source: Arc<dyn ContentSource>,
    orchestrator: Arc<ProviderOrchestrator>,
    policy: Arc<dyn PolicyGate>,
    telemetry: Arc<dyn TelemetrySink>,
    extractor: DeterministicExtractor,
    settings: PipelineSettings,
}

impl ExtractionPipeline {
    pub fn new(components: PipelineComponents, config: &Config) -> Self {
        Self {
            cache: components.cache,
            store: components.store,
            source: components.source,
            orchestrator: components.orchestrator,
            policy: components.policy,
            telemetry: components.telemetry,
            extractor: DeterministicExtractor::new(),
            settings: PipelineSettings {
                namespace: config.cache.namespace.clone(),
                version: config.pipeline.version.clone(),
                default_language: config.pipeline.default_language.clone(),
                ttl: Duration::from_secs(config.cache.ttl_secs),
                negative_ttl: Duration::from_secs(config.cache.negative_ttl_secs),
                concurrency: config.pipeline.concurrency.max(1),
            },
        }
    }

    /// Pipeline backed by one database for cache, store and content, with
    /// providers and policy taken from configuration
    pub fn from_database(
        db: Arc<Database>,
        config: &Config,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Result<Self> {
        let orchestrator = ProviderOrchestrator::from_config(config)?;
        let components = PipelineComponents {
            cache: db.clone(),
            store: db.clone(),
            source: db,
            orchestrator: Arc::new(orchestrator),
            policy: Arc::new(PhasePolicyGate::new(config.policy.clone())),
            telemetry,
        };
        Ok(Self::new(components, config))
    }

    pub fn orchestrator(&self) -> &ProviderOrchestrator {
        &self.orchestrator
    }

    /// Primary cache key of a request.
    ///
    /// Only the scope kind enters the key, so partitions of one kind (two
    /// families, say) share a fast-cache entry. The store stays partitioned.
    pub fn cache_key(&self, request: &ResolveRequest) -> String {
        build_cache_key(
            &request.locator,
            CacheKeyParts {
                namespace: &self.settings.namespace,
                education_level: request.context.education_level.as_deref(),
                language: request.context.language.as_deref(),
                scope: request.scope.kind,
                version: &self.settings.version,
            },
        )
    }

    fn ttl_for(&self, result: &ExtractionResult) -> Duration {
        if result.needs_enrichment() {
            self.settings.negative_ttl
        } else {
            self.settings.ttl
        }
    }

    /// Resolve transfer metadata for one locator and scope
    pub async fn resolve(&self, request: &ResolveRequest) -> Result<Resolution> {
        let key = self.cache_key(request);
        let locator = &request.locator;

        match self.cache.get::<ExtractionResult>(&key).await {
            Ok(Some(result)) => {
                tracing::debug!(%locator, "Fast cache hit");
                return Ok(Resolution {
                    result,
                    channel: Channel::CachedLlm,
                    used_llm_count: 0,
                    cache_hit_count: 1,
                });
            }
            Ok(None) => tracing::debug!(%locator, "Fast cache miss"),
            Err(e) => tracing::warn!(%locator, "Fast cache read failed, bypassing: {}", e),
        }

        match self.store.find_by_locator(locator, &request.scope).await {
            Ok(Some(stored)) if stored.version == self.settings.version => {
                tracing::debug!(%locator, "Metadata store hit");
                self.cache_result(&key, &stored.result).await;
                return Ok(Resolution {
                    result: stored.result,
                    channel: Channel::Deterministic,
                    used_llm_count: 0,
                    cache_hit_count: 0,
                });
            }
            Ok(Some(stored)) => tracing::debug!(
                %locator,
                stored_version = %stored.version,
                "Stored metadata is stale, extracting again"
            ),
            Ok(None) => {}
            Err(e) => tracing::warn!(%locator, "Metadata store read failed, bypassing: {}", e),
        }

        let (snapshot, persist) = match self.source.snapshot(locator).await {
            Ok(Some(snapshot)) => (snapshot, true),
            Ok(None) => return Err(TransferError::ContentNotFound(locator.content_id.clone())),
            Err(e) => {
                tracing::warn!(%locator, "Content source failed, extracting from nothing: {}", e);
                let empty = ContentSnapshot {
                    content_id: locator.content_id.clone(),
                    ..Default::default()
                };
                (empty, false)
            }
        };

        let mut result = self.extractor.extract(&snapshot);
        let mut channel = Channel::Deterministic;
        let mut used_llm_count = 0;
        let mut cache_hit_count = 0;

        if result.needs_enrichment() {
            let decision = self
                .policy
                .evaluate(&PolicyRequest {
                    caller_id: request.context.caller_id.as_deref(),
                    session_phase: request.context.session_phase.as_deref(),
                    locator,
                })
                .await;

            if decision.allowed {
                let llm_key = llm_cache_key(&key);
                let cached = match self.cache.get::<Enrichment>(&llm_key).await {
                    Ok(cached) => cached,
                    Err(e) => {
                        tracing::warn!(%locator, "LLM cache read failed, bypassing: {}", e);
                        None
                    }
                };

                if let Some(enrichment) = cached {
                    result.merge_enrichment(&enrichment);
                    channel = Channel::CachedLlm;
                    cache_hit_count = 1;
                    self.telemetry.emit(TelemetryEvent::fallback_triggered(
                        &locator.content_id,
                        locator.section_ref(),
                        true,
                        None,
                    ));
                } else {
                    match self
                        .generate_enrichment(&result, request, &snapshot, decision.caps.as_ref())
                        .await
                    {
                        Ok(Some((enrichment, tokens))) => {
                            result.merge_enrichment(&enrichment);
                            channel = Channel::Llm;
                            used_llm_count = 1;
                            let ttl = if enrichment.is_empty() {
                                self.settings.negative_ttl
                            } else {
                                self.settings.ttl
                            };
                            if let Err(e) = self.cache.set(&llm_key, &enrichment, ttl).await {
                                tracing::warn!(%locator, "LLM cache write failed: {}", e);
                            }
                            self.telemetry.emit(TelemetryEvent::fallback_triggered(
                                &locator.content_id,
                                locator.section_ref(),
                                false,
                                Some(tokens),
                            ));
                        }
                        Ok(None) => {}
                        Err(e) => tracing::warn!(
                            %locator,
                            "Generative fallback failed, keeping deterministic result: {}",
                            e
                        ),
                    }
                }
            } else {
                tracing::info!(
                    %locator,
                    reason = decision.reason.as_deref().unwrap_or(""),
                    "Generative fallback denied"
                );
                self.telemetry.emit(TelemetryEvent::fallback_denied(
                    &locator.content_id,
                    locator.section_ref(),
                    decision.reason,
                ));
            }
        }

        if persist {
            self.cache_result(&key, &result).await;
            let record = StoredMetadata::new(
                result.clone(),
                locator.clone(),
                request.scope.clone(),
                self.settings.version.clone(),
                request.context.caller_id.clone(),
            );
            if let Err(e) = self.store.upsert(record).await {
                tracing::warn!(%locator, "Metadata store write failed: {}", e);
            }
        }

        Ok(Resolution {
            result,
            channel,
            used_llm_count,
            cache_hit_count,
        })
    }

    async fn cache_result(&self, key: &str, result: &ExtractionResult) {
        if let Err(e) = self.cache.set(key, result, self.ttl_for(result)).await {
            tracing::warn!(key, "Fast cache write failed: {}", e);
        }
    }

    /// Ask the providers for analogies and domains.
    ///
    /// `Ok(None)` means only the degraded adapter answered; its placeholder is
    /// never merged or cached.
    async fn generate_enrichment(
        &self,
        result: &ExtractionResult,
        request: &ResolveRequest,
        snapshot: &ContentSnapshot,
        caps: Option<&PolicyCaps>,
    ) -> Result<Option<(Enrichment, u32)>> {
        let language = request
            .context
            .language
            .as_deref()
            .filter(|l| !l.is_empty())
            .unwrap_or(&self.settings.default_language);
        let prompt = build_enrichment_prompt(result, &request.locator, snapshot, language);

        let mut options = GenerationOptions::new().with_temperature(ENRICHMENT_TEMPERATURE);
        if let Some(caps) = caps {
            options = options
                .with_max_tokens(caps.max_tokens)
                .with_model_tier(caps.model_tier.clone());
        }

        let response = self.orchestrator.generate_text(&prompt, &options).await?;
        if response.degraded {
            tracing::warn!(
                locator = %request.locator,
                "Only degraded output available, keeping deterministic result"
            );
            return Ok(None);
        }

        let tokens = response.total_tokens();
        let enrichment = parse_enrichment(&response.text)?;
        Ok(Some((enrichment, tokens)))
    }

    /// Resolve every chunk of a content item with bounded concurrency,
    /// returning outcomes in reading order
    pub async fn resolve_content(
        &self,
        content_id: &str,
        scope: &ExtractionScope,
        context: &RequestContext,
    ) -> Result<Vec<LocatorResolution>> {
        let locators = self.source.list_locators(content_id).await?;
        if locators.is_empty() {
            return Err(TransferError::ContentNotFound(content_id.to_string()));
        }

        let mut outcomes: Vec<(usize, LocatorResolution)> =
            stream::iter(locators.into_iter().enumerate())
                .map(|(idx, locator)| async move {
                    let request = ResolveRequest::new(locator.clone(), scope.clone())
                        .with_context(context.clone());
                    let outcome = self.resolve(&request).await;
                    (idx, LocatorResolution { locator, outcome })
                })
                .buffer_unordered(self.settings.concurrency)
                .collect()
                .await;

        outcomes.sort_by_key(|(idx, _)| *idx);
        Ok(outcomes.into_iter().map(|(_, r)| r).collect())
    }

    /// Stored rows of a content item in one scope
    pub async fn stored(
        &self,
        content_id: &str,
        scope: &ExtractionScope,
    ) -> Result<Vec<StoredMetadata>> {
        self.store.find_all_for_content(content_id, scope).await
    }
}
