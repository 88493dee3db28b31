//! Keyword/Jaccard fallback strategy
//!
//! Self-contained text matching for stores without embeddings: extract the
//! query's keywords, fetch rows containing any of them, rescore with Jaccard
//! over stop-word-stripped word sets. Never calls the embedding provider.

use std::collections::BTreeSet;

use crate::error::Result;

use super::{finalize, CandidateSource, ScoredId, SearchScope};

/// Fixed English stop-word list applied to both queries and documents
pub const STOP_WORDS: &[&str] = &[
    "a", "about", "after", "all", "also", "an", "and", "any", "are", "as", "at", "be", "because",
    "been", "but", "by", "can", "could", "did", "do", "does", "for", "from", "had", "has", "have",
    "he", "her", "his", "how", "i", "if", "in", "into", "is", "it", "its", "just", "me", "my",
    "no", "not", "of", "on", "or", "our", "she", "so", "some", "than", "that", "the", "their",
    "them", "then", "there", "these", "they", "this", "to", "up", "was", "we", "were", "what",
    "when", "which", "who", "will", "with", "would", "you", "your",
];

/// Maximum keywords taken from a query
const MAX_KEYWORDS: usize = 5;

fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.binary_search(&word).is_ok()
}

/// Strip punctuation from word edges and lowercase
fn normalize_word(word: &str) -> String {
    word.trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

/// Extract query keywords: lowercase, split on whitespace, drop stop words,
/// dedupe, take the first five by first occurrence.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut keywords = Vec::new();
    for raw in text.split_whitespace() {
        let word = normalize_word(raw);
        if word.is_empty() || is_stop_word(&word) {
            continue;
        }
        if seen.insert(word.clone()) {
            keywords.push(word);
            if keywords.len() >= MAX_KEYWORDS {
                break;
            }
        }
    }
    keywords
}

/// Word set of a text with stop words removed
fn word_set(text: &str) -> BTreeSet<String> {
    text.split_whitespace()
        .map(normalize_word)
        .filter(|w| !w.is_empty() && !is_stop_word(w))
        .collect()
}

/// Jaccard similarity of the stop-word-stripped word sets of two texts
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let set_a = word_set(a);
    let set_b = word_set(b);
    if set_a.is_empty() && set_b.is_empty() {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f64 / union as f64
}

/// The keyword/Jaccard strategy
pub struct KeywordStrategy;

impl KeywordStrategy {
    /// Rank rows containing query keywords by Jaccard similarity.
    ///
    /// Ties break by candidate confidence descending, then creation time
    /// ascending.
    pub fn search(
        &self,
        source: &dyn CandidateSource,
        query_text: &str,
        scope: &SearchScope,
        threshold: f64,
        limit: usize,
    ) -> Result<Vec<ScoredId>> {
        let keywords = extract_keywords(query_text);
        if keywords.is_empty() {
            return Ok(vec![]);
        }

        let mut candidates = source.keyword_candidates(&keywords, scope)?;
        candidates.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.created_at.cmp(&b.created_at))
        });

        let hits = candidates
            .into_iter()
            .map(|candidate| ScoredId {
                score: jaccard_similarity(query_text, &candidate.content),
                id: candidate.id,
            })
            .collect();

        // finalize's sort is stable, so the confidence/created_at tie-break
        // order above survives among equal scores
        Ok(finalize(hits, threshold, limit))
    }
}

// ============================================================================
// TESTS
// ============================================================================
