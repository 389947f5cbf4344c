//! Core data model: locators, scopes, extraction results and stored rows

use crate::error::{Result, TransferError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sub-content position that metadata is attached to.
///
/// The variants are mutually exclusive, so a locator can never carry both a
/// chunk id and a page number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Locator {
    ChunkId(String),
    ChunkIndex(u32),
    Page(u32),
    Whole,
}

impl Locator {
    /// Discriminator segment used in cache keys and store rows
    pub fn discriminator(&self) -> String {
        match self {
            Locator::ChunkId(id) => id.clone(),
            Locator::ChunkIndex(idx) => format!("idx_{}", idx),
            Locator::Page(page) => format!("page_{}", page),
            Locator::Whole => "default".to_string(),
        }
    }
}

/// Identifies a unit of content to extract from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentLocator {
    pub content_id: String,
    pub locator: Locator,
}

impl ContentLocator {
    pub fn chunk_id(content_id: impl Into<String>, chunk_id: impl Into<String>) -> Self {
        Self {
            content_id: content_id.into(),
            locator: Locator::ChunkId(chunk_id.into()),
        }
    }

    pub fn chunk_index(content_id: impl Into<String>, index: u32) -> Self {
        Self {
            content_id: content_id.into(),
            locator: Locator::ChunkIndex(index),
        }
    }

    pub fn page(content_id: impl Into<String>, page: u32) -> Self {
        Self {
            content_id: content_id.into(),
            locator: Locator::Page(page),
        }
    }

    pub fn whole(content_id: impl Into<String>) -> Self {
        Self {
            content_id: content_id.into(),
            locator: Locator::Whole,
        }
    }

    /// Build a locator from optional discriminators, rejecting more than one
    pub fn from_parts(
        content_id: impl Into<String>,
        chunk_id: Option<String>,
        chunk_index: Option<u32>,
        page: Option<u32>,
    ) -> Result<Self> {
        let content_id = content_id.into();
        if content_id.trim().is_empty() {
            return Err(TransferError::InvalidInput(
                "content id must not be empty".to_string(),
            ));
        }

        let locator = match (chunk_id, chunk_index, page) {
            (Some(id), None, None) => Locator::ChunkId(id),
            (None, Some(idx), None) => Locator::ChunkIndex(idx),
            (None, None, Some(p)) => Locator::Page(p),
            (None, None, None) => Locator::Whole,
            _ => {
                return Err(TransferError::InvalidInput(
                    "chunk id, chunk index and page number are mutually exclusive".to_string(),
                ))
            }
        };

        Ok(Self {
            content_id,
            locator,
        })
    }

    /// Reference used in telemetry events
    pub fn section_ref(&self) -> String {
        self.locator.discriminator()
    }
}

impl fmt::Display for ContentLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.content_id, self.locator.discriminator())
    }
}

/// Audience partition kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScopeKind {
    User,
    Family,
    Institution,
    Global,
}

impl ScopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeKind::User => "USER",
            ScopeKind::Family => "FAMILY",
            ScopeKind::Institution => "INSTITUTION",
            ScopeKind::Global => "GLOBAL",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_uppercase().as_str() {
            "USER" => Ok(ScopeKind::User),
            "FAMILY" => Ok(ScopeKind::Family),
            "INSTITUTION" => Ok(ScopeKind::Institution),
            "GLOBAL" => Ok(ScopeKind::Global),
            other => Err(TransferError::InvalidInput(format!(
                "Unknown scope '{}'. Must be one of: USER, FAMILY, INSTITUTION, GLOBAL",
                other
            ))),
        }
    }
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audience partition for stored metadata
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtractionScope {
    pub kind: ScopeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution_id: Option<String>,
}

impl ExtractionScope {
    /// Create a scope, requiring the partition id that FAMILY and INSTITUTION need
    pub fn new(
        kind: ScopeKind,
        family_id: Option<String>,
        institution_id: Option<String>,
    ) -> Result<Self> {
        match kind {
            ScopeKind::Family if family_id.is_none() => Err(TransferError::InvalidInput(
                "FAMILY scope requires a family id".to_string(),
            )),
            ScopeKind::Institution if institution_id.is_none() => {
                Err(TransferError::InvalidInput(
                    "INSTITUTION scope requires an institution id".to_string(),
                ))
            }
            _ => Ok(Self {
                kind,
                family_id,
                institution_id,
            }),
        }
    }

    pub fn user() -> Self {
        Self {
            kind: ScopeKind::User,
            family_id: None,
            institution_id: None,
        }
    }

    pub fn global() -> Self {
        Self {
            kind: ScopeKind::Global,
            family_id: None,
            institution_id: None,
        }
    }

    pub fn family(family_id: impl Into<String>) -> Self {
        Self {
            kind: ScopeKind::Family,
            family_id: Some(family_id.into()),
            institution_id: None,
        }
    }

    pub fn institution(institution_id: impl Into<String>) -> Self {
        Self {
            kind: ScopeKind::Institution,
            family_id: None,
            institution_id: Some(institution_id.into()),
        }
    }

    /// Partition key used by the metadata store (kind plus partition id)
    pub fn partition_key(&self) -> String {
        match self.kind {
            ScopeKind::Family => format!(
                "FAMILY:{}",
                self.family_id.as_deref().unwrap_or_default()
            ),
            ScopeKind::Institution => format!(
                "INSTITUTION:{}",
                self.institution_id.as_deref().unwrap_or_default()
            ),
            kind => kind.as_str().to_string(),
        }
    }
}

/// Core concept of a section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Concept {
    pub principle: String,
    pub keywords: Vec<String>,
}

/// Derived transfer metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub concept: Concept,
    pub tier2: Vec<String>,
    pub analogies: Vec<String>,
    pub domains: Vec<String>,
}

impl ExtractionResult {
    /// Whether generative fallback should be considered
    pub fn needs_enrichment(&self) -> bool {
        self.analogies.is_empty() || self.domains.is_empty()
    }

    /// Fill missing analogies/domains from an enrichment, never overwriting
    /// fields the heuristics already produced
    pub fn merge_enrichment(&mut self, enrichment: &Enrichment) {
        if self.analogies.is_empty() {
            self.analogies = enrichment.analogies.clone();
        }
        if self.domains.is_empty() {
            self.domains = enrichment.domains.clone();
        }
    }
}

/// Analogies and domains produced by a generative provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrichment {
    #[serde(default)]
    pub analogies: Vec<String>,
    #[serde(default)]
    pub domains: Vec<String>,
}

impl Enrichment {
    pub fn is_empty(&self) -> bool {
        self.analogies.is_empty() && self.domains.is_empty()
    }
}

/// Persisted metadata row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMetadata {
    pub id: String,
    pub locator: ContentLocator,
    pub scope: ExtractionScope,
    pub result: ExtractionResult,
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

impl StoredMetadata {
    /// New row with a fresh id; the store keeps an existing row's id on upsert
    pub fn new(
        result: ExtractionResult,
        locator: ContentLocator,
        scope: ExtractionScope,
        version: impl Into<String>,
        created_by: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            locator,
            scope,
            result,
            version: version.into(),
            created_at: now,
            updated_at: now,
            created_by,
        }
    }
}

/// Provenance of a resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Channel {
    Deterministic,
    CachedLlm,
    Llm,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Channel::Deterministic => "DETERMINISTIC",
            Channel::CachedLlm => "CACHED_LLM",
            Channel::Llm => "LLM",
        };
        f.write_str(s)
    }
}
