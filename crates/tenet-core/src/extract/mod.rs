//! Belief extraction
//!
//! Pluggable `(text, category, agent) -> proposals` contract. The pattern
//! extractor is the deterministic floor: it splits declarative sentences,
//! detects negation for polarity, and scores by sentence shape. A chat-model
//! extractor replaces it behind the same trait.

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{BeliefProposal, CategoryLabel, Polarity};

/// Pluggable belief extractor
#[async_trait]
pub trait BeliefExtractor: Send + Sync {
    /// Extract candidate beliefs from the text. An empty list is a valid
    /// answer; hard failures map to
    /// [`crate::error::MemoryError::ExtractionUnavailable`].
    async fn extract(
        &self,
        text: &str,
        category: &CategoryLabel,
        agent_id: &str,
    ) -> Result<Vec<BeliefProposal>>;
}

// ============================================================================
// PATTERN EXTRACTOR
// ============================================================================

/// Negation markers that flip a sentence's polarity
const NEGATION_MARKERS: &[&str] = &[
    " not ", " never ", " no longer ", "isn't", "aren't", "wasn't", "weren't", "doesn't",
    "don't", "didn't", "cannot", "can't", "won't",
];

/// Deterministic sentence-pattern extractor
pub struct PatternExtractor;

impl PatternExtractor {
    /// Split text into candidate sentences on terminal punctuation
    fn sentences(text: &str) -> Vec<&str> {
        text.split(['.', '!', '\n'])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// A declarative sentence: has a copula or common verb, is not a
    /// question, and is long enough to carry a claim
    fn is_declarative(sentence: &str) -> bool {
        if sentence.contains('?') {
            return false;
        }
        let words = sentence.split_whitespace().count();
        if words < 3 {
            return false;
        }
        let lowered = format!(" {} ", sentence.to_lowercase());
        [" is ", " are ", " was ", " were ", " has ", " have ", " can ", " will "]
            .iter()
            .any(|verb| lowered.contains(verb))
            || NEGATION_MARKERS.iter().any(|marker| lowered.contains(marker))
    }

    /// Polarity of a sentence: negated sentences read as denials
    fn polarity_of(sentence: &str) -> Polarity {
        let lowered = format!(" {} ", sentence.to_lowercase());
        if NEGATION_MARKERS.iter().any(|marker| lowered.contains(marker)) {
            Polarity::Negative
        } else {
            Polarity::Positive
        }
    }

    /// Normalize a sentence into a statement: collapse whitespace, drop a
    /// leading filler clause marker
    fn normalize(sentence: &str) -> String {
        sentence.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Confidence from sentence shape: longer, specific sentences score
    /// higher, capped well below certainty
    fn confidence_of(sentence: &str, category: &CategoryLabel) -> f64 {
        let words = sentence.split_whitespace().count();
        let length_score = (words as f64 / 20.0).min(0.3);
        (0.5 + length_score + category.confidence * 0.2).min(0.9)
    }

    /// Synchronous core, shared with the async trait impl
    pub fn extract_sync(&self, text: &str, category: &CategoryLabel) -> Vec<BeliefProposal> {
        Self::sentences(text)
            .into_iter()
            .filter(|s| Self::is_declarative(s))
            .map(|sentence| {
                let statement = Self::normalize(sentence);
                let confidence = Self::confidence_of(sentence, category);
                BeliefProposal::new(statement, confidence, category.clone())
                    .with_polarity(Self::polarity_of(sentence))
            })
            .collect()
    }
}

#[async_trait]
impl BeliefExtractor for PatternExtractor {
    async fn extract(
        &self,
        text: &str,
        category: &CategoryLabel,
        _agent_id: &str,
    ) -> Result<Vec<BeliefProposal>> {
        Ok(self.extract_sync(text, category))
    }
}

// ============================================================================
// TESTS
// ============================================================================
