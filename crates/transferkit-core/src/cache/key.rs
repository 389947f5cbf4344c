//! Cache key construction
//!
//! Keys must stay bit-exact with entries persisted by earlier deployments:
//! `<namespace>:<contentId>:<discriminator>:<level|default>:<lang|pt>:<SCOPE>:<version>`.

use crate::model::{ContentLocator, ScopeKind};

/// Suffix appended to a primary key for the LLM-only tier
pub const LLM_KEY_SUFFIX: &str = ":llm";

const DEFAULT_LEVEL: &str = "default";
const DEFAULT_LANGUAGE: &str = "pt";

/// Non-locator inputs of a cache key
#[derive(Debug, Clone, Copy)]
pub struct CacheKeyParts<'a> {
    pub namespace: &'a str,
    pub education_level: Option<&'a str>,
    pub language: Option<&'a str>,
    pub scope: ScopeKind,
    pub version: &'a str,
}

/// Build the primary cache key for a locator
pub fn build_cache_key(locator: &ContentLocator, parts: CacheKeyParts<'_>) -> String {
    let level = non_empty(parts.education_level).unwrap_or(DEFAULT_LEVEL);
    let language = non_empty(parts.language).unwrap_or(DEFAULT_LANGUAGE);

    format!(
        "{}:{}:{}:{}:{}:{}:{}",
        parts.namespace,
        locator.content_id,
        locator.locator.discriminator(),
        level,
        language,
        parts.scope.as_str(),
        parts.version
    )
}

/// Key of the LLM-only tier; independent of the primary entry's lifetime
pub fn llm_cache_key(primary: &str) -> String {
    format!("{}{}", primary, LLM_KEY_SUFFIX)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
