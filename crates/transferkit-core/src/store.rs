//! Storage seams used by the pipeline
//!
//! `MetadataStore` is the authoritative record of extracted metadata.
//! `ContentSource` supplies the raw inputs the deterministic extractor reads.
//! Both are implemented by [`crate::db::Database`].

use crate::error::Result;
use crate::model::{ContentLocator, ExtractionScope, StoredMetadata};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Durable metadata rows keyed by (content, locator, scope)
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert or update the row for the record's locator and scope.
    ///
    /// An existing row keeps its id and `created_at`; the returned record is
    /// the row as persisted.
    async fn upsert(&self, record: StoredMetadata) -> Result<StoredMetadata>;

    async fn find_by_locator(
        &self,
        locator: &ContentLocator,
        scope: &ExtractionScope,
    ) -> Result<Option<StoredMetadata>>;

    async fn find_all_for_content(
        &self,
        content_id: &str,
        scope: &ExtractionScope,
    ) -> Result<Vec<StoredMetadata>>;
}

/// Read access to content, chunks, glossaries and annotations
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Everything known about the content at a locator, `None` if the
    /// content does not exist
    async fn snapshot(&self, locator: &ContentLocator) -> Result<Option<ContentSnapshot>>;

    /// Locators of every chunk of a content item, in reading order
    async fn list_locators(&self, content_id: &str) -> Result<Vec<ContentLocator>>;
}

/// Extractor input for one locator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentSnapshot {
    pub content_id: String,
    pub title: Option<String>,
    pub content_type: Option<String>,
    pub subject: Option<String>,
    pub topic: Option<String>,
    pub tags: Vec<String>,
    /// Glossary attached to the content
    pub glossary: Vec<GlossaryTerm>,
    /// Glossary from an auxiliary source, consulted when the primary is empty
    pub secondary_glossary: Vec<GlossaryTerm>,
    /// Raw text at the locator; `None` for image-only pages
    pub text: Option<String>,
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlossaryTerm {
    pub term: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationKind {
    Highlight,
    StructuredNotes,
}

impl AnnotationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnnotationKind::Highlight => "highlight",
            AnnotationKind::StructuredNotes => "structured_notes",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "highlight" => Some(AnnotationKind::Highlight),
            "structured_notes" => Some(AnnotationKind::StructuredNotes),
            _ => None,
        }
    }
}

/// Reader annotation on a content item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub kind: AnnotationKind,
    /// Highlight tag such as "main idea"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default)]
    pub cue_terms: Vec<String>,
}
