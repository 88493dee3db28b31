//! Contextual categorization
//!
//! Pluggable `text -> CategoryLabel` contract. The pattern matcher below is
//! the floor implementation; an LLM-backed engine replaces it behind the
//! same trait. Categorization never aborts ingestion: total failure maps to
//! the fallback label at the call site.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::CategoryLabel;

/// Optional hints passed alongside the text (caller tags, source, ...)
pub type CategoryHints = BTreeMap<String, String>;

/// Pluggable categorization engine
#[async_trait]
pub trait Categorizer: Send + Sync {
    /// Assign a category to the text.
    ///
    /// Implementations should always produce a label; a hard failure maps
    /// to [`crate::error::MemoryError::CategorizationUnavailable`] and the
    /// caller substitutes [`CategoryLabel::fallback`].
    async fn categorize(&self, text: &str, hints: Option<&CategoryHints>)
        -> Result<CategoryLabel>;
}

// ============================================================================
// PATTERN CATEGORIZER
// ============================================================================

/// One keyword bucket with its fixed confidence
struct Bucket {
    primary: &'static str,
    secondary: &'static str,
    confidence: f64,
    keywords: &'static [&'static str],
}

/// Buckets checked in order; first hit wins
const BUCKETS: &[Bucket] = &[
    Bucket {
        primary: "question",
        secondary: "inquiry",
        confidence: 0.85,
        keywords: &["?", "how do", "how can", "what is", "what are", "why does", "where is"],
    },
    Bucket {
        primary: "issue",
        secondary: "problem-report",
        confidence: 0.8,
        keywords: &["error", "bug", "broken", "crash", "fail", "exception", "not working"],
    },
    Bucket {
        primary: "education",
        secondary: "learning",
        confidence: 0.75,
        keywords: &["learn", "tutorial", "course", "study", "teach", "lesson"],
    },
    Bucket {
        primary: "technical",
        secondary: "engineering",
        confidence: 0.75,
        keywords: &[
            "code", "api", "database", "server", "deploy", "function", "compile", "rust",
            "python", "config",
        ],
    },
];

/// Case-insensitive keyword matcher with a fixed confidence table
///
/// The floor implementation: cheap, deterministic, always answers.
pub struct PatternCategorizer;

impl PatternCategorizer {
    /// Synchronous core, shared with the async trait impl
    pub fn categorize_sync(&self, text: &str) -> CategoryLabel {
        let lowered = text.to_lowercase();
        for bucket in BUCKETS {
            if bucket.keywords.iter().any(|kw| lowered.contains(kw)) {
                return CategoryLabel::new(bucket.primary, bucket.confidence)
                    .with_secondary(bucket.secondary);
            }
        }
        CategoryLabel::new("general", 0.6).with_secondary("information")
    }
}

#[async_trait]
impl Categorizer for PatternCategorizer {
    async fn categorize(
        &self,
        text: &str,
        _hints: Option<&CategoryHints>,
    ) -> Result<CategoryLabel> {
        Ok(self.categorize_sync(text))
    }
}

// ============================================================================
// TESTS
// ============================================================================
