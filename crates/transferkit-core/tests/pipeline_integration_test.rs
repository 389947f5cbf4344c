//! End-to-end resolution through cache, store, extraction and providers
//!
//! Uses in-memory SQLite for the store and content, and a counting adapter in
//! place of a real provider.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use transferkit_core::{
    Channel, Concept, Config, ContentDocument, ContentLocator, Database, ExtractionPipeline,
    ExtractionScope, FastCache, GenerationOptions, GlossaryTerm, MemoryCache, MetadataStore,
    OrchestratorConfig, PipelineComponents, PolicyGate, ProviderAdapter, ProviderError,
    ProviderOrchestrator, ProviderResponse, RecordingTelemetrySink, RequestContext,
    ResolveRequest, Result, StaticPolicyGate, StoredMetadata, TelemetryEventType, TokenUsage,
    TransferError,
};

const ENRICHMENT_JSON: &str =
    r#"{"analogies": ["like a power plant"], "domains": ["engineering", "economics"]}"#;

struct CountingProvider {
    name: &'static str,
    reply: std::result::Result<String, ProviderError>,
    calls: AtomicU32,
}

impl CountingProvider {
    fn replying(text: &str) -> Arc<Self> {
        Self::named("counting", text)
    }

    fn named(name: &'static str, text: &str) -> Arc<Self> {
        Arc::new(Self {
            name,
            reply: Ok(text.to_string()),
            calls: AtomicU32::new(0),
        })
    }

    fn failing(err: ProviderError) -> Arc<Self> {
        Arc::new(Self {
            name: "counting",
            reply: Err(err),
            calls: AtomicU32::new(0),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderAdapter for CountingProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn model_name(&self) -> &str {
        "counting-model"
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn generate_text(
        &self,
        _prompt: &str,
        _options: &GenerationOptions,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone().map(|text| ProviderResponse {
            text,
            usage: Some(TokenUsage {
                prompt_tokens: 30,
                completion_tokens: 12,
                total_tokens: 42,
            }),
            provider_name: self.name.to_string(),
            model_name: "counting-model".to_string(),
            degraded: false,
        })
    }

    async fn embed(&self, _text: &str) -> std::result::Result<Vec<f32>, ProviderError> {
        Ok(vec![0.0; 4])
    }
}

/// Store whose every operation fails
struct UnavailableStore;

#[async_trait]
impl MetadataStore for UnavailableStore {
    async fn upsert(&self, _record: StoredMetadata) -> Result<StoredMetadata> {
        Err(TransferError::StoreUnavailable("down".into()))
    }

    async fn find_by_locator(
        &self,
        _locator: &ContentLocator,
        _scope: &ExtractionScope,
    ) -> Result<Option<StoredMetadata>> {
        Err(TransferError::StoreUnavailable("down".into()))
    }

    async fn find_all_for_content(
        &self,
        _content_id: &str,
        _scope: &ExtractionScope,
    ) -> Result<Vec<StoredMetadata>> {
        Err(TransferError::StoreUnavailable("down".into()))
    }
}

/// Cache whose every operation fails
struct UnavailableCache;

#[async_trait]
impl FastCache for UnavailableCache {
    async fn get_raw(&self, _key: &str) -> Result<Option<String>> {
        Err(TransferError::Cache("down".into()))
    }

    async fn set_raw(&self, _key: &str, _value: String, _ttl: std::time::Duration) -> Result<()> {
        Err(TransferError::Cache("down".into()))
    }
}

struct Harness {
    db: Arc<Database>,
    cache: MemoryCache,
    provider: Arc<CountingProvider>,
    telemetry: Arc<RecordingTelemetrySink>,
    pipeline: ExtractionPipeline,
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.orchestrator = OrchestratorConfig {
        retry_delay_ms: 1,
        ..OrchestratorConfig::default()
    };
    config
}

fn new_db() -> Arc<Database> {
    let db = Arc::new(Database::open_in_memory().unwrap());
    db.initialize().unwrap();
    db
}

fn harness_with(
    db: Arc<Database>,
    cache: MemoryCache,
    provider: Arc<CountingProvider>,
    policy: Arc<dyn PolicyGate>,
) -> Harness {
    let config = test_config();
    let telemetry = Arc::new(RecordingTelemetrySink::new());
    let orchestrator =
        ProviderOrchestrator::new(vec![provider.clone() as Arc<dyn ProviderAdapter>], &config.orchestrator);
    let components = PipelineComponents {
        cache: Arc::new(cache.clone()),
        store: db.clone(),
        source: db.clone(),
        orchestrator: Arc::new(orchestrator),
        policy,
        telemetry: telemetry.clone(),
    };
    Harness {
        db,
        cache,
        provider,
        telemetry,
        pipeline: ExtractionPipeline::new(components, &config),
    }
}

fn harness(provider: Arc<CountingProvider>, policy: Arc<dyn PolicyGate>) -> Harness {
    harness_with(new_db(), MemoryCache::new(), provider, policy)
}

/// Content whose text has no comparison language and no subject metadata
fn plain_content() -> ContentDocument {
    serde_json::from_value(serde_json::json!({
        "id": "bio-7",
        "title": "Cell Energy",
        "chunks": [
            {"id": "k1", "text": "Mitochondria produce ATP for the Eukaryotic Cell. Energy is stored."},
            {"id": "k2", "text": "Ribosomes assemble proteins."}
        ]
    }))
    .unwrap()
}

fn request(chunk: &str) -> ResolveRequest {
    ResolveRequest::new(ContentLocator::chunk_id("bio-7", chunk), ExtractionScope::user())
        .with_caller("student-1")
}

#[tokio::test]
async fn test_second_resolve_is_served_from_cache() {
    let h = harness(
        CountingProvider::replying(ENRICHMENT_JSON),
        Arc::new(StaticPolicyGate::allow_all()),
    );
    h.db.import_content(&plain_content()).unwrap();

    let first = h.pipeline.resolve(&request("k1")).await.unwrap();
    assert_eq!(first.channel, Channel::Llm);
    assert_eq!(first.used_llm_count, 1);
    assert_eq!(first.cache_hit_count, 0);
    assert_eq!(first.result.analogies, vec!["like a power plant"]);
    assert_eq!(first.result.domains, vec!["engineering", "economics"]);
    assert_eq!(
        first.result.concept.principle,
        "Mitochondria produce ATP for the Eukaryotic Cell."
    );
    assert_eq!(first.result.concept.keywords, vec!["Eukaryotic Cell"]);

    let second = h.pipeline.resolve(&request("k1")).await.unwrap();
    assert_eq!(second.channel, Channel::CachedLlm);
    assert_eq!(second.cache_hit_count, 1);
    assert_eq!(second.used_llm_count, 0);
    assert_eq!(second.result, first.result);
    assert_eq!(h.provider.calls(), 1);

    let events = h.telemetry.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, TelemetryEventType::FallbackTriggered);
    assert_eq!(events[0].cache_hit, Some(false));
    assert_eq!(events[0].tokens_used, Some(42));
    assert_eq!(events[0].section_ref, "k1");

    let stored = h
        .db
        .get_metadata(&ContentLocator::chunk_id("bio-7", "k1"), &ExtractionScope::user())
        .unwrap()
        .unwrap();
    assert_eq!(stored.created_by.as_deref(), Some("student-1"));
}

#[tokio::test]
async fn test_complete_heuristics_never_reach_provider() {
    let h = harness(
        CountingProvider::replying(ENRICHMENT_JSON),
        Arc::new(StaticPolicyGate::allow_all()),
    );
    h.db.import_content(
        &serde_json::from_value(serde_json::json!({
            "id": "phys-1",
            "subject": "Physics",
            "chunks": [{"text": "Current flows like water in a pipe."}]
        }))
        .unwrap(),
    )
    .unwrap();

    let resolution = h
        .pipeline
        .resolve(&ResolveRequest::new(
            ContentLocator::chunk_index("phys-1", 0),
            ExtractionScope::global(),
        ))
        .await
        .unwrap();

    assert_eq!(resolution.channel, Channel::Deterministic);
    assert_eq!(resolution.result.analogies, vec!["like water in a pipe"]);
    assert_eq!(resolution.result.domains, vec!["Physics"]);
    assert_eq!(h.provider.calls(), 0);
    assert!(h.telemetry.events().is_empty());
}

#[tokio::test]
async fn test_denied_policy_emits_one_event_and_no_call() {
    let h = harness(
        CountingProvider::replying(ENRICHMENT_JSON),
        Arc::new(StaticPolicyGate::deny_all("assessment in progress")),
    );
    h.db.import_content(&plain_content()).unwrap();

    let resolution = h.pipeline.resolve(&request("k2")).await.unwrap();
    assert_eq!(resolution.channel, Channel::Deterministic);
    assert!(resolution.result.analogies.is_empty());
    assert_eq!(h.provider.calls(), 0);

    let events = h.telemetry.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, TelemetryEventType::FallbackDenied);
    assert_eq!(events[0].reason.as_deref(), Some("assessment in progress"));
    assert_eq!(events[0].content_id, "bio-7");
}

#[tokio::test]
async fn test_glossary_only_content_resolves_deterministically() {
    let h = harness(
        CountingProvider::replying(ENRICHMENT_JSON),
        Arc::new(StaticPolicyGate::deny_all("not permitted")),
    );
    h.db.import_content(&ContentDocument {
        id: "img-1".into(),
        glossary: vec![GlossaryTerm {
            term: "mitochondria".into(),
            definition: None,
        }],
        ..Default::default()
    })
    .unwrap();

    let resolution = h
        .pipeline
        .resolve(&ResolveRequest::new(
            ContentLocator::page("img-1", 1),
            ExtractionScope::user(),
        ))
        .await
        .unwrap();

    assert_eq!(resolution.result.tier2, vec!["mitochondria"]);
    assert_eq!(resolution.result.concept, Concept::default());
    assert!(resolution.result.analogies.is_empty());
    assert!(resolution.result.domains.is_empty());
    assert_eq!(resolution.channel, Channel::Deterministic);
    assert_eq!(h.telemetry.count(TelemetryEventType::FallbackDenied), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_resolves_leave_one_row() {
    let db = new_db();
    db.import_content(&plain_content()).unwrap();
    let provider = CountingProvider::replying(ENRICHMENT_JSON);

    // Separate fast caches so both resolutions miss
    let a = Arc::new(harness_with(
        db.clone(),
        MemoryCache::new(),
        provider.clone(),
        Arc::new(StaticPolicyGate::allow_all()),
    ));
    let b = Arc::new(harness_with(
        db.clone(),
        MemoryCache::new(),
        provider.clone(),
        Arc::new(StaticPolicyGate::allow_all()),
    ));

    let ta = tokio::spawn({
        let a = a.clone();
        async move { a.pipeline.resolve(&request("k1")).await }
    });
    let tb = tokio::spawn({
        let b = b.clone();
        async move { b.pipeline.resolve(&request("k1")).await }
    });
    let ra = ta.await.unwrap().unwrap();
    let rb = tb.await.unwrap().unwrap();

    assert_eq!(ra.result, rb.result);
    assert!(provider.calls() >= 1 && provider.calls() <= 2);
    assert_eq!(
        db.count_metadata(&ContentLocator::chunk_id("bio-7", "k1")).unwrap(),
        1
    );
}

#[tokio::test]
async fn test_llm_tier_survives_primary_invalidation() {
    let cache = MemoryCache::new();
    let first = harness_with(
        new_db(),
        cache.clone(),
        CountingProvider::replying(ENRICHMENT_JSON),
        Arc::new(StaticPolicyGate::allow_all()),
    );
    first.db.import_content(&plain_content()).unwrap();
    first.pipeline.resolve(&request("k1")).await.unwrap();

    // Fresh store and dropped primary entry; only the ":llm" tier remains
    let primary_key = first.pipeline.cache_key(&request("k1"));
    cache.invalidate(&primary_key);
    let second = harness_with(
        new_db(),
        cache.clone(),
        CountingProvider::replying(ENRICHMENT_JSON),
        Arc::new(StaticPolicyGate::allow_all()),
    );
    second.db.import_content(&plain_content()).unwrap();

    let resolution = second.pipeline.resolve(&request("k1")).await.unwrap();
    assert_eq!(resolution.channel, Channel::CachedLlm);
    assert_eq!(resolution.cache_hit_count, 1);
    assert_eq!(resolution.result.analogies, vec!["like a power plant"]);
    assert_eq!(second.provider.calls(), 0);

    let events = second.telemetry.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].cache_hit, Some(true));
}

#[tokio::test]
async fn test_store_hit_repopulates_fast_cache() {
    let db = new_db();
    db.import_content(&plain_content()).unwrap();
    let warm = harness_with(
        db.clone(),
        MemoryCache::new(),
        CountingProvider::replying(ENRICHMENT_JSON),
        Arc::new(StaticPolicyGate::allow_all()),
    );
    warm.pipeline.resolve(&request("k1")).await.unwrap();

    let cold = harness_with(
        db,
        MemoryCache::new(),
        CountingProvider::replying(ENRICHMENT_JSON),
        Arc::new(StaticPolicyGate::allow_all()),
    );
    let from_store = cold.pipeline.resolve(&request("k1")).await.unwrap();
    assert_eq!(from_store.channel, Channel::Deterministic);
    assert_eq!(from_store.result.analogies, vec!["like a power plant"]);
    assert_eq!(cold.provider.calls(), 0);

    let key = cold.pipeline.cache_key(&request("k1"));
    assert!(cold.cache.get(&key).is_some());

    let from_cache = cold.pipeline.resolve(&request("k1")).await.unwrap();
    assert_eq!(from_cache.channel, Channel::CachedLlm);
}

#[tokio::test]
async fn test_rate_limited_provider_degrades_to_deterministic() {
    let h = harness(
        CountingProvider::failing(ProviderError::RateLimited("quota exceeded".into())),
        Arc::new(StaticPolicyGate::allow_all()),
    );
    h.db.import_content(&plain_content()).unwrap();

    let resolution = h.pipeline.resolve(&request("k1")).await.unwrap();
    assert_eq!(resolution.channel, Channel::Deterministic);
    assert_eq!(resolution.used_llm_count, 0);
    assert!(resolution.result.analogies.is_empty());
    assert_eq!(h.provider.calls(), 1);
    assert!(h.telemetry.events().is_empty());

    // Degraded placeholder must not land in the LLM tier
    let llm_key = transferkit_core::llm_cache_key(&h.pipeline.cache_key(&request("k1")));
    assert!(h.cache.get(&llm_key).is_none());
}

#[tokio::test]
async fn test_real_provider_named_degraded_is_merged() {
    let h = harness(
        CountingProvider::named("degraded", ENRICHMENT_JSON),
        Arc::new(StaticPolicyGate::allow_all()),
    );
    h.db.import_content(&plain_content()).unwrap();

    let resolution = h.pipeline.resolve(&request("k1")).await.unwrap();
    assert_eq!(resolution.channel, Channel::Llm);
    assert_eq!(resolution.result.analogies, vec!["like a power plant"]);
    assert_eq!(h.provider.calls(), 1);
}

#[tokio::test]
async fn test_family_partitions_share_fast_cache_entry() {
    let h = harness(
        CountingProvider::replying(ENRICHMENT_JSON),
        Arc::new(StaticPolicyGate::allow_all()),
    );
    h.db.import_content(&plain_content()).unwrap();
    let locator = ContentLocator::chunk_id("bio-7", "k1");
    let family = |id: &str| ResolveRequest::new(locator.clone(), ExtractionScope::family(id));

    let f1 = h.pipeline.resolve(&family("f1")).await.unwrap();
    assert_eq!(f1.channel, Channel::Llm);
    assert_eq!(h.pipeline.cache_key(&family("f1")), h.pipeline.cache_key(&family("f2")));

    // Same key, so the second family is served the first family's entry
    let f2 = h.pipeline.resolve(&family("f2")).await.unwrap();
    assert_eq!(f2.channel, Channel::CachedLlm);
    assert_eq!(f2.result, f1.result);
    assert_eq!(h.provider.calls(), 1);
    assert!(h
        .db
        .get_metadata(&locator, &ExtractionScope::family("f2"))
        .unwrap()
        .is_none());
    assert!(h
        .db
        .get_metadata(&locator, &ExtractionScope::family("f1"))
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_unparseable_reply_keeps_deterministic_result() {
    let h = harness(
        CountingProvider::replying("I cannot help with that."),
        Arc::new(StaticPolicyGate::allow_all()),
    );
    h.db.import_content(&plain_content()).unwrap();

    let resolution = h.pipeline.resolve(&request("k2")).await.unwrap();
    assert_eq!(resolution.channel, Channel::Deterministic);
    assert_eq!(resolution.result.concept.principle, "Ribosomes assemble proteins.");
    assert_eq!(h.provider.calls(), 1);
}

#[tokio::test]
async fn test_failing_cache_and_store_are_bypassed() {
    let db = new_db();
    db.import_content(&plain_content()).unwrap();
    let provider = CountingProvider::replying(ENRICHMENT_JSON);
    let config = test_config();
    let components = PipelineComponents {
        cache: Arc::new(UnavailableCache),
        store: Arc::new(UnavailableStore),
        source: db.clone(),
        orchestrator: Arc::new(ProviderOrchestrator::new(
            vec![provider.clone() as Arc<dyn ProviderAdapter>],
            &config.orchestrator,
        )),
        policy: Arc::new(StaticPolicyGate::allow_all()),
        telemetry: Arc::new(RecordingTelemetrySink::new()),
    };
    let pipeline = ExtractionPipeline::new(components, &config);

    let resolution = pipeline.resolve(&request("k1")).await.unwrap();
    assert_eq!(resolution.channel, Channel::Llm);
    assert_eq!(resolution.result.domains, vec!["engineering", "economics"]);
}

#[tokio::test]
async fn test_resolve_content_in_reading_order() {
    let h = harness(
        CountingProvider::replying(ENRICHMENT_JSON),
        Arc::new(StaticPolicyGate::deny_all("batch")),
    );
    h.db.import_content(&plain_content()).unwrap();

    let outcomes = h
        .pipeline
        .resolve_content("bio-7", &ExtractionScope::family("f1"), &RequestContext::default())
        .await
        .unwrap();

    let locators: Vec<_> = outcomes.iter().map(|o| o.locator.clone()).collect();
    assert_eq!(
        locators,
        vec![
            ContentLocator::chunk_id("bio-7", "k1"),
            ContentLocator::chunk_id("bio-7", "k2"),
        ]
    );
    assert!(outcomes.iter().all(|o| o.outcome.is_ok()));

    let stored = h
        .pipeline
        .stored("bio-7", &ExtractionScope::family("f1"))
        .await
        .unwrap();
    assert_eq!(stored.len(), 2);
    assert!(h
        .pipeline
        .stored("bio-7", &ExtractionScope::family("f2"))
        .await
        .unwrap()
        .is_empty());
}
