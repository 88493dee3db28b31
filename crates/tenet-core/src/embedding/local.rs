//! Local model-backed embeddings (fastembed)
//!
//! ONNX inference through fastembed v5. The model loads lazily on first use
//! and is shared process-wide; the trait surface truncates or pads nothing,
//! so the configured engine dimension must match the model's output.

use std::sync::{Mutex, OnceLock};

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use crate::error::{MemoryError, Result};

use super::{Embedding, EmbeddingProvider};

/// Output dimension of the default model (BGE small EN v1.5)
pub const MODEL_DIMENSIONS: usize = 384;

/// Maximum text length passed to the model; longer inputs are truncated
const MAX_TEXT_LENGTH: usize = 8192;

static MODEL: OnceLock<std::result::Result<Mutex<TextEmbedding>, String>> = OnceLock::new();

/// Truncate to at most `max_bytes`, backing off to the nearest char
/// boundary so multi-byte UTF-8 content never splits mid-character
fn truncate_at_boundary(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut cut = max_bytes;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    &text[..cut]
}

fn get_model() -> Result<std::sync::MutexGuard<'static, TextEmbedding>> {
    let result = MODEL.get_or_init(|| {
        let options = InitOptions::new(EmbeddingModel::BGESmallENV15)
            .with_show_download_progress(false);
        TextEmbedding::try_new(options)
            .map(Mutex::new)
            .map_err(|e| format!("failed to initialize embedding model: {e}"))
    });
    match result {
        Ok(model) => model
            .lock()
            .map_err(|_| MemoryError::EmbeddingUnavailable("model lock poisoned".into())),
        Err(err) => Err(MemoryError::EmbeddingUnavailable(err.clone())),
    }
}

/// fastembed-backed provider
pub struct FastembedProvider {
    _unused: (),
}

impl Default for FastembedProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl FastembedProvider {
    /// Create the provider; the model itself loads on first `embed`
    pub fn new() -> Self {
        Self { _unused: () }
    }

    /// Whether the model loaded (or can load) successfully
    pub fn is_ready(&self) -> bool {
        get_model().is_ok()
    }
}

#[async_trait]
impl EmbeddingProvider for FastembedProvider {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        if text.trim().is_empty() {
            return Err(MemoryError::EmbeddingUnavailable(
                "cannot embed empty text".into(),
            ));
        }
        let text = truncate_at_boundary(text, MAX_TEXT_LENGTH);

        let mut model = get_model()?;
        let mut vectors = model
            .embed(vec![text], None)
            .map_err(|e| MemoryError::EmbeddingUnavailable(e.to_string()))?;
        let vector = vectors
            .pop()
            .ok_or_else(|| MemoryError::EmbeddingUnavailable("model returned no vector".into()))?;
        Ok(Embedding::unit(vector))
    }

    fn dimensions(&self) -> usize {
        MODEL_DIMENSIONS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_respects_char_boundaries() {
        // 'é' is two bytes; a cut at byte 3 lands mid-character
        let text = "aéé";
        assert_eq!(truncate_at_boundary(text, 3), "aé");
        assert_eq!(truncate_at_boundary(text, 2), "a");
        assert_eq!(truncate_at_boundary(text, 5), text);
    }

    #[test]
    fn short_text_passes_through() {
        assert_eq!(truncate_at_boundary("short", MAX_TEXT_LENGTH), "short");
    }

    #[test]
    fn ascii_cuts_exactly() {
        let text = "x".repeat(MAX_TEXT_LENGTH + 10);
        assert_eq!(truncate_at_boundary(&text, MAX_TEXT_LENGTH).len(), MAX_TEXT_LENGTH);
    }
}
