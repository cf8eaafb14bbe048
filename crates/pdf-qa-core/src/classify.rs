//! Heuristic query classifier.
//!
//! Decides whether a question asks for an overview of a document
//! ([`QueryKind::Generic`]) or for a specific fact ([`QueryKind::Specific`]).
//! Generic questions ("summarize this") are answered from the most recent
//! upload even when no chunk scores highly against the literal query text.
//!
//! # Algorithm
//!
//! 1. Lowercase the query and replace every non-alphanumeric character
//!    with a space.
//! 2. Collapse runs of whitespace and trim.
//! 3. The query is generic if any normalized generic-intent phrase occurs
//!    in it as a substring.

use crate::models::QueryKind;

/// Phrases that signal a request for a whole-document overview.
pub const GENERIC_PHRASES: &[&str] = &[
    "summary",
    "summarize",
    "summarise",
    "overview",
    "main points",
    "key points",
    "bullet points",
    "key takeaways",
    "main ideas",
    "what is this document about",
    "what is the document about",
    "tell me about this document",
    "explain this document",
    "describe this document",
    "topics",
    "content",
];

/// Lowercase, strip punctuation, and collapse whitespace.
///
/// ```rust
/// use pdf_qa_core::classify::normalize_query;
///
/// assert_eq!(normalize_query("  Can I get a   SUMMARY?! "), "can i get a summary");
/// ```
pub fn normalize_query(query: &str) -> String {
    let replaced: String = query
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .to_lowercase();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Phrase-containment classifier.
///
/// The default instance uses [`GENERIC_PHRASES`]; deployments can extend the
/// list through configuration.
#[derive(Debug, Clone)]
pub struct QueryClassifier {
    phrases: Vec<String>,
}

impl QueryClassifier {
    pub fn new() -> Self {
        Self::with_phrases(GENERIC_PHRASES.iter().copied())
    }

    /// Build a classifier from an explicit phrase list. Phrases are
    /// normalized the same way queries are; empty phrases are ignored.
    pub fn with_phrases<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = phrases
            .into_iter()
            .map(|p| normalize_query(p.as_ref()))
            .filter(|p| !p.is_empty())
            .collect();
        normalized.dedup();
        Self { phrases: normalized }
    }

    /// Add phrases on top of the current set.
    pub fn extend<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for phrase in extra {
            let p = normalize_query(phrase.as_ref());
            if !p.is_empty() && !self.phrases.contains(&p) {
                self.phrases.push(p);
            }
        }
        self
    }

    pub fn classify(&self, query: &str) -> QueryKind {
        let normalized = normalize_query(query);
        if self
            .phrases
            .iter()
            .any(|phrase| normalized.contains(phrase.as_str()))
        {
            QueryKind::Generic
        } else {
            QueryKind::Specific
        }
    }
}

impl Default for QueryClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Classify with the default phrase list.
pub fn classify(query: &str) -> QueryKind {
    QueryClassifier::new().classify(query)
}
