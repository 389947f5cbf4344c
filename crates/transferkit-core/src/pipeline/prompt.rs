//! Enrichment prompt and response parsing

use crate::error::{Result, TransferError};
use crate::extract::{ANALOGY_LIMIT, DOMAIN_LIMIT};
use crate::model::{ContentLocator, Enrichment, ExtractionResult};
use crate::store::ContentSnapshot;

const MAX_EXCERPT_CHARS: usize = 4000;

/// Build the prompt asking a provider for analogies and domains
pub fn build_enrichment_prompt(
    result: &ExtractionResult,
    locator: &ContentLocator,
    snapshot: &ContentSnapshot,
    language: &str,
) -> String {
    let excerpt = snapshot
        .text
        .as_deref()
        .map(|t| truncate_chars(t.trim(), MAX_EXCERPT_CHARS))
        .unwrap_or_default();

    format!(
        r#"You help students transfer knowledge between subjects. Output ONLY valid JSON.

Section: {locator}
Title: {title}
Language: {language}
Core principle: {principle}
Keywords: {keywords}
Vocabulary: {vocabulary}

Excerpt:
{excerpt}

Output JSON with these exact fields:
{{
  "analogies": ["everyday comparison that explains the principle"],
  "domains": ["other subject or real-world field where the principle applies"]
}}

Give at most {analogies} analogies and {domains} domains, written in the section's language.

JSON:"#,
        locator = locator,
        title = snapshot.title.as_deref().unwrap_or("untitled"),
        language = language,
        principle = display_or_none(&result.concept.principle),
        keywords = display_list(&result.concept.keywords),
        vocabulary = display_list(&result.tier2),
        excerpt = if excerpt.is_empty() { "(no text)".to_string() } else { excerpt },
        analogies = ANALOGY_LIMIT,
        domains = DOMAIN_LIMIT,
    )
}

/// Parse a provider response into an enrichment, tolerating surrounding
/// prose and code fences
pub fn parse_enrichment(response: &str) -> Result<Enrichment> {
    let json_str = match (response.find('{'), response.rfind('}')) {
        (Some(start), Some(end)) if start < end => &response[start..=end],
        _ => {
            return Err(TransferError::Parse(
                "No JSON found in provider response".to_string(),
            ))
        }
    };

    let raw: Enrichment = serde_json::from_str(json_str)
        .map_err(|e| TransferError::Parse(format!("Failed to parse enrichment JSON: {}", e)))?;

    Ok(Enrichment {
        analogies: clean(raw.analogies, ANALOGY_LIMIT),
        domains: clean(raw.domains, DOMAIN_LIMIT),
    })
}

fn clean(values: Vec<String>, limit: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in values {
        let value = value.trim();
        if value.is_empty() || out.iter().any(|v| v.eq_ignore_ascii_case(value)) {
            continue;
        }
        out.push(value.to_string());
        if out.len() >= limit {
            break;
        }
    }
    out
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

fn display_or_none(value: &str) -> &str {
    if value.is_empty() {
        "(none)"
    } else {
        value
    }
}

fn display_list(values: &[String]) -> String {
    if values.is_empty() {
        "(none)".to_string()
    } else {
        values.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_fences_and_prose() {
        let response = "Sure!\n```json\n{\"analogies\": [\"like a battery\", \" \", \"Like a battery\"], \"domains\": [\"physics\"]}\n```";
        let enrichment = parse_enrichment(response).unwrap();
        assert_eq!(enrichment.analogies, vec!["like a battery"]);
        assert_eq!(enrichment.domains, vec!["physics"]);
    }

    #[test]
    fn test_parse_caps_and_missing_fields() {
        let response = r#"{"analogies": ["a", "b", "c", "d"]}"#;
        let enrichment = parse_enrichment(response).unwrap();
        assert_eq!(enrichment.analogies.len(), ANALOGY_LIMIT);
        assert!(enrichment.domains.is_empty());
    }

    #[test]
    fn test_parse_rejects_non_json() {
        assert!(parse_enrichment("no json here").is_err());
        assert!(parse_enrichment("} backwards {").is_err());
        assert!(parse_enrichment("{not json}").is_err());
    }

    #[test]
    fn test_prompt_mentions_inputs() {
        let mut result = ExtractionResult::default();
        result.concept.principle = "Cells make energy.".into();
        result.tier2 = vec!["mitochondria".into()];
        let snapshot = ContentSnapshot {
            title: Some("Cells".into()),
            text: Some("é".repeat(MAX_EXCERPT_CHARS + 10)),
            ..Default::default()
        };

        let prompt = build_enrichment_prompt(
            &result,
            &ContentLocator::chunk_index("bio", 2),
            &snapshot,
            "pt",
        );
        assert!(prompt.contains("bio#idx_2"));
        assert!(prompt.contains("Cells make energy."));
        assert!(prompt.contains("mitochondria"));
        assert!(prompt.contains("Keywords: (none)"));
        assert!(prompt.contains("..."));
    }
}
