//! Scripted plug-ins
//!
//! Deterministic stand-ins for the chat-model-backed extractor and
//! categorizer: rule tables instead of inference, plus failing and sleeping
//! variants for the degradation paths.

use std::time::Duration;

use async_trait::async_trait;
use tenet_core::{
    BeliefExtractor, BeliefProposal, CategoryHints, CategoryLabel, Categorizer, MemoryError,
    Polarity, Result,
};

// ============================================================================
// SCRIPTED EXTRACTOR
// ============================================================================

/// One extraction rule: when the memory text contains `trigger`, emit a
/// canonical statement with the given polarity and confidence
pub struct ExtractionRule {
    /// Substring matched against the memory content (case-insensitive)
    pub trigger: &'static str,
    /// Canonical statement emitted
    pub statement: &'static str,
    /// Proposal confidence
    pub confidence: f64,
    /// Proposal polarity
    pub polarity: Polarity,
}

/// Rule-table extractor emulating a canonicalizing model: different
/// surface forms of the same claim map to one statement, negations flip
/// polarity instead of changing the statement
pub struct ScriptedExtractor {
    rules: Vec<ExtractionRule>,
}

impl ScriptedExtractor {
    /// Build from a rule table
    pub fn new(rules: Vec<ExtractionRule>) -> Self {
        Self { rules }
    }
}

#[async_trait]
impl BeliefExtractor for ScriptedExtractor {
    async fn extract(
        &self,
        text: &str,
        category: &CategoryLabel,
        _agent_id: &str,
    ) -> Result<Vec<BeliefProposal>> {
        let lowered = text.to_lowercase();
        Ok(self
            .rules
            .iter()
            .filter(|rule| lowered.contains(&rule.trigger.to_lowercase()))
            .map(|rule| {
                BeliefProposal::new(rule.statement, rule.confidence, category.clone())
                    .with_polarity(rule.polarity)
            })
            .collect())
    }
}

/// The extractor used by the sky-color journeys: asserting and denying
/// forms both canonicalize to "Sky is blue"
pub fn canonical_sky_extractor() -> ScriptedExtractor {
    ScriptedExtractor::new(vec![
        ExtractionRule {
            trigger: "sky is not blue",
            statement: "Sky is blue",
            confidence: 0.9,
            polarity: Polarity::Negative,
        },
        ExtractionRule {
            trigger: "sky is blue",
            statement: "Sky is blue",
            confidence: 0.9,
            polarity: Polarity::Positive,
        },
    ])
}

// ============================================================================
// FAILING / SLEEPING VARIANTS
// ============================================================================

/// Extractor that always reports itself unavailable
pub struct FailingExtractor;

#[async_trait]
impl BeliefExtractor for FailingExtractor {
    async fn extract(
        &self,
        _text: &str,
        _category: &CategoryLabel,
        _agent_id: &str,
    ) -> Result<Vec<BeliefProposal>> {
        Err(MemoryError::ExtractionUnavailable(
            "extractor backend offline".into(),
        ))
    }
}

/// Extractor that sleeps past any reasonable deadline before answering
pub struct SleepyExtractor {
    /// How long to sleep before returning
    pub delay: Duration,
}

#[async_trait]
impl BeliefExtractor for SleepyExtractor {
    async fn extract(
        &self,
        _text: &str,
        _category: &CategoryLabel,
        _agent_id: &str,
    ) -> Result<Vec<BeliefProposal>> {
        tokio::time::sleep(self.delay).await;
        Ok(vec![])
    }
}

/// Categorizer that always fails outright
pub struct FailingCategorizer;

#[async_trait]
impl Categorizer for FailingCategorizer {
    async fn categorize(
        &self,
        _text: &str,
        _hints: Option<&CategoryHints>,
    ) -> Result<CategoryLabel> {
        Err(MemoryError::CategorizationUnavailable(
            "categorizer backend offline".into(),
        ))
    }
}
