//! Token budget management for generation-model input limits
//!
//! Counts tokens, truncates text to a hard ceiling with a monotonic binary
//! search over character boundaries, and cuts text into token windows:
//! - Model limit: 200,000 tokens
//! - Safe limit: 90% of the model limit (headroom for prompt scaffolding)
//! - Token windowing refuses texts over 200,000 characters

use super::estimator::{default_estimator, TokenEstimator};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Marker appended (or prepended) to truncated text
pub const TRUNCATION_MARKER: &str = "[... text truncated ...]";

/// Token budget configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBudgetConfig {
    /// Hard input limit of the generation model
    #[serde(default = "default_model_token_limit")]
    pub model_token_limit: usize,

    /// Fraction of the hard limit usable for document text
    #[serde(default = "default_safety_margin")]
    pub safety_margin: f64,

    /// Largest text (in characters) accepted by token windowing
    #[serde(default = "default_token_chunk_char_ceiling")]
    pub token_chunk_char_ceiling: usize,
}

fn default_model_token_limit() -> usize {
    200_000
}

fn default_safety_margin() -> f64 {
    0.9
}

fn default_token_chunk_char_ceiling() -> usize {
    200_000
}

impl Default for TokenBudgetConfig {
    fn default() -> Self {
        Self {
            model_token_limit: default_model_token_limit(),
            safety_margin: default_safety_margin(),
            token_chunk_char_ceiling: default_token_chunk_char_ceiling(),
        }
    }
}

impl TokenBudgetConfig {
    /// Validate that the budget configuration is consistent
    pub fn validate(&self) -> Result<(), BudgetError> {
        if self.model_token_limit == 0 {
            return Err(BudgetError::ConfigurationInvalid(
                "model_token_limit must be positive".to_string(),
            ));
        }
        if !(self.safety_margin > 0.0 && self.safety_margin <= 1.0) {
            return Err(BudgetError::ConfigurationInvalid(format!(
                "safety_margin must be in (0, 1], got {}",
                self.safety_margin
            )));
        }
        Ok(())
    }

    /// Token ceiling left after the safety margin
    pub fn safe_max_tokens(&self) -> usize {
        (self.model_token_limit as f64 * self.safety_margin) as usize
    }
}

/// Derived token statistics for one text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub token_count: usize,
    pub character_count: usize,
    pub max_tokens: usize,
    pub safe_max_tokens: usize,
    /// Percentage of the safe limit used, two decimals
    pub usage_percentage: f64,
    pub needs_truncation: bool,
    pub within_limit: bool,
    /// Tokens per character, three decimals
    pub tokens_to_chars_ratio: f64,
}

/// Token budget errors
#[derive(Debug, Error)]
pub enum BudgetError {
    #[error("Budget exceeded: {used} tokens used, {max} tokens allowed")]
    BudgetExceeded { used: usize, max: usize },

    #[error("Configuration invalid: {0}")]
    ConfigurationInvalid(String),

    #[error("Token estimation failed: {0}")]
    EstimationFailed(String),

    #[error(
        "Text too large ({chars} chars) for token-based chunking, limit is {limit}; \
         use semantic chunking instead"
    )]
    ResourceLimitExceeded { chars: usize, limit: usize },

    #[error("Invalid token window: {0}")]
    InvalidWindow(String),
}

/// Window start/end pairs over `total` units
///
/// Termination is bounded by `total / (size - overlap) + 5` iterations.
pub(crate) fn window_bounds(total: usize, size: usize, overlap: usize) -> Vec<(usize, usize)> {
    if total == 0 || size == 0 {
        return Vec::new();
    }
    if total <= size {
        return vec![(0, total)];
    }

    let overlap = if overlap >= size { size / 2 } else { overlap };
    let step = size - overlap;
    let max_iterations = total / step + 5;

    let mut bounds = Vec::new();
    let mut start = 0;
    while start < total {
        if bounds.len() >= max_iterations {
            warn!(max_iterations, "Maximum window iterations reached");
            break;
        }
        let end = (start + size).min(total);
        bounds.push((start, end));
        if end >= total {
            break;
        }
        start = end - overlap;
    }
    bounds
}

/// Token budget manager
#[derive(Clone)]
pub struct TokenBudget {
    config: TokenBudgetConfig,
    estimator: Arc<dyn TokenEstimator>,
}

impl TokenBudget {
    /// Create a token budget backed by the best available tokenizer
    pub fn new(config: TokenBudgetConfig) -> Result<Self, BudgetError> {
        Self::with_estimator(config, default_estimator())
    }

    /// Create a token budget with a specific estimator
    pub fn with_estimator(
        config: TokenBudgetConfig,
        estimator: Arc<dyn TokenEstimator>,
    ) -> Result<Self, BudgetError> {
        config.validate()?;
        debug!(estimator = estimator.name(), "Token budget initialised");
        Ok(Self { config, estimator })
    }

    /// Count tokens in text
    pub fn count(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        self.estimator.estimate(text)
    }

    /// Get the hard model limit
    pub fn model_limit(&self) -> usize {
        self.config.model_token_limit
    }

    /// Get the limit after the safety margin
    pub fn safe_max_tokens(&self) -> usize {
        self.config.safe_max_tokens()
    }

    /// Get the configuration
    pub fn config(&self) -> &TokenBudgetConfig {
        &self.config
    }

    /// Compute all derived token statistics in one pass
    pub fn info(&self, text: &str) -> TokenInfo {
        let token_count = self.count(text);
        let character_count = text.chars().count();
        let safe_max_tokens = self.safe_max_tokens();

        let usage = token_count as f64 / safe_max_tokens.max(1) as f64 * 100.0;
        let ratio = if character_count > 0 {
            token_count as f64 / character_count as f64
        } else {
            0.0
        };

        TokenInfo {
            token_count,
            character_count,
            max_tokens: self.model_limit(),
            safe_max_tokens,
            usage_percentage: (usage * 100.0).round() / 100.0,
            needs_truncation: token_count > safe_max_tokens,
            within_limit: token_count <= safe_max_tokens,
            tokens_to_chars_ratio: (ratio * 1000.0).round() / 1000.0,
        }
    }

    /// Check a text against the safe limit
    pub fn validate_length(&self, text: &str) -> Result<(), BudgetError> {
        let used = self.count(text);
        let max = self.safe_max_tokens();
        if used > max {
            return Err(BudgetError::BudgetExceeded { used, max });
        }
        Ok(())
    }

    /// Truncate to the safe limit, keeping the beginning
    pub fn truncate_to_safe_limit(&self, text: &str) -> String {
        self.truncate(text, self.safe_max_tokens(), false)
    }

    /// Truncate text so that the result, marker included, fits in `max_tokens`
    ///
    /// Returns `text` unchanged when it already fits. Otherwise binary-searches
    /// character boundaries for the longest prefix (or suffix with
    /// `preserve_end`) that fits alongside the truncation marker. When the
    /// marker alone does not fit, the bare prefix/suffix is returned.
    pub fn truncate(&self, text: &str, max_tokens: usize, preserve_end: bool) -> String {
        if text.is_empty() || self.count(text) <= max_tokens {
            return text.to_string();
        }

        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();

        let truncated = if preserve_end {
            let marked = |k: usize| format!("{TRUNCATION_MARKER}\n\n{}", &text[boundaries[k]..]);
            let bare = |k: usize| text[boundaries[k]..].to_string();
            self.shortest_cut(&boundaries, max_tokens, &marked)
                .map(marked)
                .unwrap_or_else(|| {
                    let k = self
                        .shortest_cut(&boundaries, max_tokens, &bare)
                        .unwrap_or(boundaries.len() - 1);
                    bare(k)
                })
        } else {
            let marked = |k: usize| format!("{}\n\n{TRUNCATION_MARKER}", &text[..boundaries[k]]);
            let bare = |k: usize| text[..boundaries[k]].to_string();
            self.longest_cut(&boundaries, max_tokens, &marked)
                .map(marked)
                .unwrap_or_else(|| {
                    let k = self.longest_cut(&boundaries, max_tokens, &bare).unwrap_or(0);
                    bare(k)
                })
        };

        debug!(
            original_chars = boundaries.len() - 1,
            truncated_chars = truncated.chars().count(),
            max_tokens,
            preserve_end,
            "Truncated text"
        );
        truncated
    }

    /// Largest boundary index whose candidate fits, if any
    fn longest_cut(
        &self,
        boundaries: &[usize],
        max_tokens: usize,
        candidate: &dyn Fn(usize) -> String,
    ) -> Option<usize> {
        let fits = |k: usize| self.count(&candidate(k)) <= max_tokens;
        if !fits(0) {
            return None;
        }
        let (mut lo, mut hi) = (0, boundaries.len() - 1);
        while lo < hi {
            let mid = (lo + hi + 1) / 2;
            if fits(mid) {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }
        Some(lo)
    }

    /// Smallest boundary index whose candidate fits, if any
    fn shortest_cut(
        &self,
        boundaries: &[usize],
        max_tokens: usize,
        candidate: &dyn Fn(usize) -> String,
    ) -> Option<usize> {
        let last = boundaries.len() - 1;
        let fits = |k: usize| self.count(&candidate(k)) <= max_tokens;
        if !fits(last) {
            return None;
        }
        let (mut lo, mut hi) = (0, last);
        while lo < hi {
            let mid = (lo + hi) / 2;
            if fits(mid) {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        Some(lo)
    }

    /// Split text on token boundaries
    ///
    /// Materializes the whole token sequence, so texts above the configured
    /// character ceiling are refused. Overlap at or above `chunk_size` is
    /// clamped to `chunk_size / 2`.
    pub fn chunk_by_tokens(
        &self,
        text: &str,
        chunk_size: usize,
        overlap: usize,
    ) -> Result<Vec<String>, BudgetError> {
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let chars = text.chars().count();
        let limit = self.config.token_chunk_char_ceiling;
        if chars > limit {
            return Err(BudgetError::ResourceLimitExceeded { chars, limit });
        }

        if chunk_size == 0 {
            return Err(BudgetError::InvalidWindow(
                "chunk_size must be positive".to_string(),
            ));
        }

        let overlap = if overlap >= chunk_size {
            warn!(overlap, chunk_size, "Overlap reduced to half the chunk size");
            chunk_size / 2
        } else {
            overlap
        };

        Ok(self.estimator.windows(text, chunk_size, overlap))
    }
}

impl std::fmt::Debug for TokenBudget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBudget")
            .field("config", &self.config)
            .field("estimator", &self.estimator.name())
            .finish()
    }
}
