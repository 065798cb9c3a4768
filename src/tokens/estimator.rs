//! Token estimation using tiktoken

use super::budget::{window_bounds, BudgetError};
use once_cell::sync::Lazy;
use std::sync::Arc;
use tiktoken_rs::{cl100k_base, CoreBPE};
use tracing::warn;

/// cl100k_base is loaded once per process; `None` when the encoder data could not be built.
static CL100K: Lazy<Option<Arc<CoreBPE>>> = Lazy::new(|| match cl100k_base() {
    Ok(bpe) => Some(Arc::new(bpe)),
    Err(e) => {
        warn!(error = %e, "Failed to load cl100k_base encoding");
        None
    }
});

/// Token estimator trait for different tokenization strategies
///
/// Implementations must be monotonic: appending text never lowers the count.
/// Truncation relies on this to binary-search cut points.
pub trait TokenEstimator: Send + Sync {
    /// Estimate the number of tokens in the given text
    fn estimate(&self, text: &str) -> usize;

    /// Estimate tokens for multiple texts
    fn estimate_batch(&self, texts: &[&str]) -> Vec<usize> {
        texts.iter().map(|t| self.estimate(t)).collect()
    }

    /// Split text into windows of `size` tokens overlapping by `overlap` tokens
    ///
    /// Callers guarantee `size > 0` and `overlap < size`.
    fn windows(&self, text: &str, size: usize, overlap: usize) -> Vec<String>;

    /// Short name used in logs
    fn name(&self) -> &'static str;
}

/// Tiktoken-based token estimator using cl100k_base
pub struct TiktokenEstimator {
    bpe: Arc<CoreBPE>,
}

impl TiktokenEstimator {
    /// Create a tiktoken estimator backed by the shared cl100k_base encoder
    pub fn new() -> Result<Self, BudgetError> {
        let bpe = CL100K
            .clone()
            .ok_or_else(|| BudgetError::EstimationFailed("cl100k_base unavailable".to_string()))?;
        Ok(Self { bpe })
    }

    /// Decode a token window, widening it by up to three tokens on either side
    /// when the cut lands inside a multi-byte character.
    fn decode_window(&self, tokens: &[usize], start: usize, end: usize) -> Option<String> {
        for widen_end in 0..4 {
            let end = (end + widen_end).min(tokens.len());
            for widen_start in 0..4 {
                let start = start.saturating_sub(widen_start);
                if let Ok(text) = self.bpe.decode(tokens[start..end].to_vec()) {
                    return Some(text);
                }
            }
        }
        None
    }
}

impl TokenEstimator for TiktokenEstimator {
    fn estimate(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        self.bpe.encode_with_special_tokens(text).len()
    }

    fn windows(&self, text: &str, size: usize, overlap: usize) -> Vec<String> {
        let tokens = self.bpe.encode_with_special_tokens(text);
        let mut windows = Vec::new();
        for (start, end) in window_bounds(tokens.len(), size, overlap) {
            match self.decode_window(&tokens, start, end) {
                Some(window) => windows.push(window),
                None => warn!(start, end, "Skipping token window that does not decode to UTF-8"),
            }
        }
        windows
    }

    fn name(&self) -> &'static str {
        "cl100k_base"
    }
}

/// Character-ratio estimator (fallback, ~4 characters per token)
pub struct CharRatioEstimator {
    chars_per_token: usize,
}

impl CharRatioEstimator {
    pub fn new(chars_per_token: usize) -> Self {
        Self {
            chars_per_token: chars_per_token.max(1),
        }
    }
}

impl Default for CharRatioEstimator {
    fn default() -> Self {
        Self::new(4)
    }
}

impl TokenEstimator for CharRatioEstimator {
    fn estimate(&self, text: &str) -> usize {
        text.chars().count() / self.chars_per_token
    }

    fn windows(&self, text: &str, size: usize, overlap: usize) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        window_bounds(
            chars.len(),
            size * self.chars_per_token,
            overlap * self.chars_per_token,
        )
        .into_iter()
        .map(|(start, end)| chars[start..end].iter().collect())
        .collect()
    }

    fn name(&self) -> &'static str {
        "char_ratio"
    }
}

/// Best available estimator: cl100k_base, or the character-ratio fallback
pub fn default_estimator() -> Arc<dyn TokenEstimator> {
    match TiktokenEstimator::new() {
        Ok(estimator) => Arc::new(estimator),
        Err(e) => {
            warn!(error = %e, "Tokenizer unavailable, estimating tokens as characters / 4");
            Arc::new(CharRatioEstimator::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tiktoken_estimator() {
        let estimator = TiktokenEstimator::new().unwrap();
        let text = "Hello, world! This is a test.";
        let tokens = estimator.estimate(text);
        assert!(tokens > 0);
        assert!(tokens < 20);
    }

    #[test]
    fn test_char_ratio_estimator() {
        let estimator = CharRatioEstimator::default();
        assert_eq!(estimator.estimate("abcdefghij"), 2);
        assert_eq!(estimator.estimate(""), 0);
    }

    #[test]
    fn test_batch_estimation() {
        let estimator = TiktokenEstimator::new().unwrap();
        let texts = vec!["Hello", "world", "test"];
        let tokens = estimator.estimate_batch(&texts);
        assert_eq!(tokens.len(), 3);
        assert!(tokens.iter().all(|&t| t > 0));
    }

    #[test]
    fn test_tiktoken_windows_cover_text() {
        let estimator = TiktokenEstimator::new().unwrap();
        let text = "Test sentence. ".repeat(200);
        let windows = estimator.windows(&text, 100, 10);
        assert!(windows.len() > 1);
        assert!(windows.iter().all(|w| estimator.estimate(w) <= 110));
        assert!(text.starts_with(&windows[0]));
    }

    #[test]
    fn test_tiktoken_windows_multibyte() {
        let estimator = TiktokenEstimator::new().unwrap();
        let text = "日本語のテキストです。".repeat(50);
        let windows = estimator.windows(&text, 7, 2);
        assert!(!windows.is_empty());
        assert!(windows.iter().all(|w| !w.is_empty()));
    }

    #[test]
    fn test_char_ratio_windows() {
        let estimator = CharRatioEstimator::default();
        let text = "x".repeat(100);
        let windows = estimator.windows(&text, 10, 2);
        assert_eq!(windows[0].len(), 40);
        assert_eq!(windows.last().unwrap().chars().last(), Some('x'));
    }
}
