//! Deterministic transfer-metadata extraction
//!
//! Derives concept, tier-2 vocabulary, analogies and domains from a
//! [`ContentSnapshot`] without any network call. Missing inputs yield empty
//! fields; an empty `analogies` or `domains` is what triggers generative
//! fallback upstream.

mod text;

pub use text::{comparison_phrases, first_sentence, proper_terms};

use crate::model::{Concept, ExtractionResult};
use crate::store::{Annotation, AnnotationKind, ContentSnapshot, GlossaryTerm};
use text::push_unique;

pub const TIER2_LIMIT: usize = 20;
pub const KEYWORD_LIMIT: usize = 5;
pub const ANALOGY_LIMIT: usize = 3;
pub const DOMAIN_LIMIT: usize = 3;

const MAIN_IDEA_TAG: &str = "main idea";

/// Heuristic extractor
#[derive(Debug, Clone, Copy, Default)]
pub struct DeterministicExtractor;

impl DeterministicExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Best-effort extraction; never fails
    pub fn extract(&self, snapshot: &ContentSnapshot) -> ExtractionResult {
        let text = snapshot
            .text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());

        let concept = match text {
            Some(text) => concept_from_text(text),
            None => concept_from_annotations(&snapshot.annotations),
        };

        let analogies = text
            .map(|t| comparison_phrases(t, ANALOGY_LIMIT))
            .unwrap_or_default();

        ExtractionResult {
            concept,
            tier2: tier2_vocabulary(&snapshot.glossary, &snapshot.secondary_glossary),
            analogies,
            domains: domains(snapshot),
        }
    }
}

/// Primary glossary, else the secondary one; capped and de-duplicated
fn tier2_vocabulary(primary: &[GlossaryTerm], secondary: &[GlossaryTerm]) -> Vec<String> {
    let collect = |terms: &[GlossaryTerm]| {
        let mut out = Vec::new();
        for term in terms {
            push_unique(&mut out, term.term.clone());
            if out.len() >= TIER2_LIMIT {
                break;
            }
        }
        out
    };

    let vocabulary = collect(primary);
    if vocabulary.is_empty() {
        collect(secondary)
    } else {
        vocabulary
    }
}

fn concept_from_text(text: &str) -> Concept {
    Concept {
        principle: first_sentence(text),
        keywords: proper_terms(text, KEYWORD_LIMIT),
    }
}

fn is_main_idea(annotation: &Annotation) -> bool {
    annotation.kind == AnnotationKind::Highlight
        && annotation
            .tag
            .as_deref()
            .map(|tag| tag.trim().to_lowercase().replace(['_', '-'], " ") == MAIN_IDEA_TAG)
            .unwrap_or(false)
}

/// Main-idea highlights first, then structured notes
fn concept_from_annotations(annotations: &[Annotation]) -> Concept {
    let main_ideas: Vec<&Annotation> = annotations.iter().filter(|a| is_main_idea(a)).collect();
    let selected: Vec<&Annotation> = if main_ideas.is_empty() {
        annotations
            .iter()
            .filter(|a| a.kind == AnnotationKind::StructuredNotes)
            .collect()
    } else {
        main_ideas
    };

    let principle = selected
        .iter()
        .map(|a| a.text.trim())
        .find(|t| !t.is_empty())
        .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
        .unwrap_or_default();

    let mut keywords = Vec::new();
    for term in selected.iter().flat_map(|a| a.cue_terms.iter()) {
        if keywords.len() >= KEYWORD_LIMIT {
            break;
        }
        push_unique(&mut keywords, term.clone());
    }

    Concept {
        principle,
        keywords,
    }
}

/// Subject, topic and tags, then content type
fn domains(snapshot: &ContentSnapshot) -> Vec<String> {
    let candidates = snapshot
        .subject
        .iter()
        .chain(snapshot.topic.iter())
        .chain(snapshot.tags.iter())
        .chain(snapshot.content_type.iter());

    let mut domains = Vec::new();
    for candidate in candidates {
        if domains.len() >= DOMAIN_LIMIT {
            break;
        }
        push_unique(&mut domains, candidate.clone());
    }
    domains
}
