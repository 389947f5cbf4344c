//! Transferkit Core Library
//!
//! Resilient transfer-metadata extraction for educational content.
//!
//! # Features
//! - Tiered resolution: fast cache, authoritative SQLite store, deterministic
//!   heuristics, then generative fallback
//! - Ordered provider fallback with retries, rate-limit escalation and an
//!   always-available degraded adapter
//! - Per-call policy gating and fire-and-forget telemetry

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod llm;
pub mod model;
pub mod pipeline;
pub mod policy;
pub mod store;
pub mod telemetry;

pub use cache::{build_cache_key, llm_cache_key, CacheKeyParts, FastCache, MemoryCache};
pub use config::{
    CacheConfig, Config, OrchestratorConfig, PipelineConfig, PolicyConfig, ProviderConfig,
    ProviderKind,
};
pub use db::{ContentDocument, ContentInfo, Database};
pub use error::{Error, Result, TransferError};
pub use extract::DeterministicExtractor;
pub use llm::{
    classify, DegradedProvider, GenerationOptions, OllamaProvider, OpenAiCompatibleProvider,
    ProviderAdapter, ProviderError, ProviderOrchestrator, ProviderResponse, RetryDecision,
    TokenUsage,
};
pub use model::{
    Channel, Concept, ContentLocator, Enrichment, ExtractionResult, ExtractionScope, Locator,
    ScopeKind, StoredMetadata,
};
pub use pipeline::{
    ExtractionPipeline, LocatorResolution, PipelineComponents, RequestContext, Resolution,
    ResolveRequest,
};
pub use policy::{PhasePolicyGate, PolicyCaps, PolicyDecision, PolicyGate, StaticPolicyGate};
pub use store::{Annotation, AnnotationKind, ContentSnapshot, ContentSource, GlossaryTerm, MetadataStore};
pub use telemetry::{
    NullTelemetrySink, RecordingTelemetrySink, TelemetryEvent, TelemetryEventType, TelemetrySink,
    TracingTelemetrySink,
};

/// Default cache directory name
pub const CACHE_DIR_NAME: &str = "transferkit";

/// Default config directory name
pub const CONFIG_DIR_NAME: &str = "transferkit";
