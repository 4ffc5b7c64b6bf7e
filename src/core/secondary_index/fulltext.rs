//! Fulltext tokenizer pipeline: lower-case, split on non-alphanumerics,
//! optional umlaut/ß normalization, optional stop-word removal, optional
//! stemming. Produces a sorted, deduped token set per document, mirroring
//! the per-token postings this index flavor writes one `ftx:` entry for.

use crate::core::kv::config::FulltextConfig;
use std::collections::BTreeSet;

fn normalize_umlauts(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'ä' => 'a',
            'ö' => 'o',
            'ü' => 'u',
            'Ä' => 'a',
            'Ö' => 'o',
            'Ü' => 'u',
            _ => c,
        })
        .collect::<String>()
        .replace('ß', "ss")
}

fn english_stopwords() -> &'static [&'static str] {
    &[
        "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is",
        "it", "its", "of", "on", "that", "the", "to", "was", "were", "will", "with",
    ]
}

/// A deliberately simple suffix-stripping stemmer (not a full Porter
/// implementation) sufficient for test fixtures and small corpora; good
/// enough to fold "learning"/"learn" together without an external crate.
fn stem(word: &str) -> String {
    for suffix in ["ing", "edly", "ed", "ly", "es", "s"] {
        if word.len() > suffix.len() + 2 && word.ends_with(suffix) {
            return word[..word.len() - suffix.len()].to_string();
        }
    }
    word.to_string()
}

/// Splits `text` into a lower-cased token stream on non-alphanumeric
/// boundaries, applying the configured normalization steps, and returns a
/// sorted deduped set.
pub fn tokenize(text: &str, config: &FulltextConfig) -> BTreeSet<String> {
    let lowered = text.to_lowercase();
    let normalized = if config.normalize_umlauts { normalize_umlauts(&lowered) } else { lowered };

    let raw_tokens: Vec<String> =
        normalized.split(|c: char| !c.is_alphanumeric()).filter(|s| !s.is_empty()).map(str::to_string).collect();

    let stopwords: BTreeSet<&str> = if config.stopwords_enabled && config.language == "en" {
        english_stopwords().iter().copied().collect()
    } else {
        BTreeSet::new()
    };

    raw_tokens
        .into_iter()
        .filter(|t| !stopwords.contains(t.as_str()))
        .map(|t| if config.stemming_enabled { stem(&t) } else { t })
        .collect()
}

/// Splits a query string into either an AND-list of terms, or (if the
/// whole query is wrapped in double quotes) a single contiguous phrase
/// whose tokens must appear adjacent in the source document.
pub enum ParsedQuery {
    And(Vec<String>),
    Phrase(Vec<String>),
}

pub fn parse_query(query: &str, config: &FulltextConfig) -> ParsedQuery {
    let trimmed = query.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        let inner = &trimmed[1..trimmed.len() - 1];
        ParsedQuery::Phrase(tokenize(inner, config).into_iter().collect())
    } else {
        ParsedQuery::And(tokenize(trimmed, config).into_iter().collect())
    }
}

/// Ordered token sequence of a document, used to verify phrase adjacency
/// without re-tokenizing the stored text at query time.
pub fn tokenize_ordered(text: &str, config: &FulltextConfig) -> Vec<String> {
    let lowered = text.to_lowercase();
    let normalized = if config.normalize_umlauts { normalize_umlauts(&lowered) } else { lowered };
    let raw_tokens: Vec<String> =
        normalized.split(|c: char| !c.is_alphanumeric()).filter(|s| !s.is_empty()).map(str::to_string).collect();
    raw_tokens.into_iter().map(|t| if config.stemming_enabled { stem(&t) } else { t }).collect()
}

/// True if `phrase` appears as a contiguous subsequence of `document_tokens`.
pub fn contains_phrase(document_tokens: &[String], phrase: &[String]) -> bool {
    if phrase.is_empty() || document_tokens.len() < phrase.len() {
        return false;
    }
    document_tokens.windows(phrase.len()).any(|w| w == phrase)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> FulltextConfig {
        FulltextConfig::default()
    }

    #[test]
    fn tokenize_is_idempotent() {
        let c = cfg();
        let once: BTreeSet<String> = tokenize("Machine Learning is fun!", &c);
        let twice: BTreeSet<String> = once.iter().flat_map(|t| tokenize(t, &c)).collect();
        assert_eq!(once, twice);
    }

    #[test]
    fn stopwords_are_removed_when_enabled() {
        let c = cfg();
        let tokens = tokenize("the machine is fun", &c);
        assert!(!tokens.contains("the"));
        assert!(!tokens.contains("is"));
        assert!(tokens.contains("machine"));
    }

    #[test]
    fn umlaut_normalization_folds_diacritics() {
        let c = cfg();
        let tokens = tokenize("schön", &c);
        assert!(tokens.contains("schon"));
    }

    #[test]
    fn quoted_query_parses_as_phrase() {
        match parse_query("\"machine learning\"", &cfg()) {
            ParsedQuery::Phrase(tokens) => assert_eq!(tokens, vec!["machine".to_string(), "learning".to_string()]),
            ParsedQuery::And(_) => panic!("expected phrase"),
        }
    }

    #[test]
    fn phrase_containment_requires_adjacency() {
        let doc = tokenize_ordered("learning about machine components", &cfg());
        let phrase = vec!["machine".to_string(), "learning".to_string()];
        assert!(!contains_phrase(&doc, &phrase));

        let doc2 = tokenize_ordered("machine learning is fun", &cfg());
        assert!(contains_phrase(&doc2, &phrase));
    }
}
