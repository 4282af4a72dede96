//! Token counting
//!
//! Context assembly and prompting must count tokens the same way the
//! embedding/completion models do, so everything goes through one
//! cl100k_base encoder. If the encoder cannot be constructed, a grapheme
//! heuristic keeps counts roughly proportional instead of crashing the
//! pipeline.

use once_cell::sync::Lazy;
use tiktoken_rs::{cl100k_base, CoreBPE};
use unicode_segmentation::UnicodeSegmentation;

static ENCODER: Lazy<Option<CoreBPE>> = Lazy::new(|| match cl100k_base() {
    Ok(bpe) => Some(bpe),
    Err(e) => {
        tracing::error!(error = %e, "cl100k_base init failed, using grapheme estimate");
        None
    }
});

/// Shared cl100k_base token counter.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenCounter;

impl TokenCounter {
    pub fn new() -> Self {
        Self
    }

    /// Count tokens in `text` with cl100k_base.
    pub fn count(&self, text: &str) -> usize {
        match ENCODER.as_ref() {
            Some(bpe) => bpe.encode_ordinary(text).len(),
            None => estimate(text),
        }
    }

    /// Sum of token counts over several texts.
    pub fn count_all<'a>(&self, texts: impl IntoIterator<Item = &'a str>) -> usize {
        texts.into_iter().map(|t| self.count(t)).sum()
    }
}

/// Grapheme-based estimate: Korean averages about 2 graphemes per token,
/// Latin text about 4 characters per token.
fn estimate(text: &str) -> usize {
    let graphemes = text.graphemes(true).count();
    let korean = text.chars().filter(|c| ('가'..='힣').contains(c)).count();
    if korean > graphemes / 3 {
        graphemes.max(1) / 2
    } else {
        graphemes.max(1) / 4
    }
}
