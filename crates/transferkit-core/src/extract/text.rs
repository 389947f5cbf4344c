//! Text heuristics: sentences, proper-noun terms and comparison phrases

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SENTENCE_END_RE: Regex = Regex::new(r"[.!?](?:\s|$)").unwrap();
    static ref PARAGRAPH_BREAK_RE: Regex = Regex::new(r"\n[ \t]*\n").unwrap();
    static ref PROPER_TERM_RE: Regex =
        Regex::new(r"\b\p{Lu}[\p{L}'-]*(?:\s+\p{Lu}[\p{L}'-]*)+").unwrap();
    static ref COMPARISON_RE: Regex = Regex::new(
        r"(?i)\b(?:similar\s+to|compared\s+to|just\s+as|resembles?|like)\s+[\p{L}\p{N}'-]+(?:[ \t]+[\p{L}\p{N}'-]+){0,5}"
    )
    .unwrap();
    static ref AS_AS_RE: Regex = Regex::new(
        r"(?i)\bas\s+[\p{L}'-]+\s+as\s+[\p{L}\p{N}'-]+(?:[ \t]+[\p{L}\p{N}'-]+){0,3}"
    )
    .unwrap();
}

/// Leading words dropped from proper-noun runs ("The Golgi Apparatus")
const LEADING_ARTICLES: &[&str] = &[
    "the", "a", "an", "this", "these", "those", "that", "o", "os", "as", "um", "uma",
];

/// First sentence of a text, bounded by its first paragraph
pub fn first_sentence(text: &str) -> String {
    let trimmed = text.trim_start();
    let paragraph_end = PARAGRAPH_BREAK_RE
        .find(trimmed)
        .map(|m| m.start())
        .unwrap_or(trimmed.len());
    let paragraph = &trimmed[..paragraph_end];

    let sentence = match SENTENCE_END_RE.find(paragraph) {
        Some(m) => &paragraph[..m.start() + 1],
        None => paragraph,
    };

    sentence.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Capitalised multi-word terms in order of appearance, de-duplicated
pub fn proper_terms(text: &str, limit: usize) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();

    for m in PROPER_TERM_RE.find_iter(text) {
        let mut words: Vec<&str> = m.as_str().split_whitespace().collect();
        while words
            .first()
            .map(|w| LEADING_ARTICLES.contains(&w.to_lowercase().as_str()))
            .unwrap_or(false)
        {
            words.remove(0);
        }
        if words.len() < 2 {
            continue;
        }

        let term = words.join(" ");
        push_unique(&mut terms, term);
        if terms.len() >= limit {
            break;
        }
    }

    terms
}

/// Comparison phrases ("like a pump", "as light as air") in text order
pub fn comparison_phrases(text: &str, limit: usize) -> Vec<String> {
    let mut spans: Vec<(usize, usize)> = COMPARISON_RE
        .find_iter(text)
        .chain(AS_AS_RE.find_iter(text))
        .map(|m| (m.start(), m.end()))
        .collect();
    spans.sort();

    let mut phrases: Vec<String> = Vec::new();
    let mut covered_until = 0;
    for (start, end) in spans {
        // Overlapping matches ("just as strong as") keep the earliest
        if start < covered_until {
            continue;
        }
        covered_until = end;

        let phrase = text[start..end].split_whitespace().collect::<Vec<_>>().join(" ");
        push_unique(&mut phrases, phrase);
        if phrases.len() >= limit {
            break;
        }
    }

    phrases
}

/// Append a trimmed value unless empty or already present (case-insensitive)
pub fn push_unique(values: &mut Vec<String>, value: String) {
    let value = value.trim();
    if value.is_empty() {
        return;
    }
    let lower = value.to_lowercase();
    if values.iter().any(|v| v.to_lowercase() == lower) {
        return;
    }
    values.push(value.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sentence() {
        assert_eq!(
            first_sentence("  Cells are small. They divide."),
            "Cells are small."
        );
        assert_eq!(first_sentence("No terminator here"), "No terminator here");
        assert_eq!(
            first_sentence("Cells are\nsmall. Next."),
            "Cells are small."
        );
        assert_eq!(
            first_sentence("Heading without stop\n\nBody text. More."),
            "Heading without stop"
        );
        assert_eq!(first_sentence("Version 2.5 is out. Next."), "Version 2.5 is out.");
        assert_eq!(first_sentence(""), "");
    }

    #[test]
    fn test_proper_terms() {
        let text = "The Golgi Apparatus works with the Endoplasmic Reticulum. \
                    Robert Hooke saw cells. Cells divide. The Golgi Apparatus again.";
        assert_eq!(
            proper_terms(text, 5),
            vec!["Golgi Apparatus", "Endoplasmic Reticulum", "Robert Hooke"]
        );
        assert_eq!(proper_terms(text, 1).len(), 1);
        assert!(proper_terms("all lower case words", 5).is_empty());
    }

    #[test]
    fn test_comparison_phrases() {
        let text = "The heart works like a pump. A cell is similar to a factory, \
                    and the membrane is as thin as paper.";
        assert_eq!(
            comparison_phrases(text, 3),
            vec!["like a pump", "similar to a factory", "as thin as paper"]
        );
    }

    #[test]
    fn test_comparison_phrases_cap_and_overlap() {
        let text = "Just as strong as an ox. Like rain. Like snow. Like wind. Like fire.";
        let phrases = comparison_phrases(text, 3);
        assert_eq!(phrases.len(), 3);
        assert_eq!(phrases[0], "Just as strong as an ox");
        assert_eq!(phrases[1], "Like rain");
    }
}
