//! Request, event and outcome types for summarization runs

use crate::config::LimitsConfig;
use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Summarization strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Strategy {
    /// Direct summarization of the (windowed) document
    Simple,
    /// Relevance-gated map-reduce over semantic chunks
    #[default]
    Hierarchical,
    /// Extractive map over every chunk, abstractive reduce
    Detailed,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Simple => "simple",
            Strategy::Hierarchical => "hierarchical",
            Strategy::Detailed => "detailed",
        }
    }
}

impl From<&str> for Strategy {
    /// Unknown names select the hierarchical strategy
    fn from(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "simple" => Strategy::Simple,
            "detailed" => Strategy::Detailed,
            _ => Strategy::Hierarchical,
        }
    }
}

impl From<String> for Strategy {
    fn from(name: String) -> Self {
        Strategy::from(name.as_str())
    }
}

impl From<Strategy> for String {
    fn from(strategy: Strategy) -> Self {
        strategy.as_str().to_string()
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One streamed event
///
/// A stream carries content fragments followed by exactly one `Complete`,
/// or by one `Error` in its place. A cancelled stream simply ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum PartialResult {
    Content(String),
    Complete,
    Error(String),
}

/// A summarization request as received from a caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryRequest {
    pub text: String,
    #[serde(default)]
    pub strategy: Strategy,
    #[serde(default = "default_compression_ratio")]
    pub compression_ratio: f64,
}

fn default_compression_ratio() -> f64 {
    0.20
}

impl SummaryRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            strategy: Strategy::default(),
            compression_ratio: default_compression_ratio(),
        }
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_compression_ratio(mut self, ratio: f64) -> Self {
        self.compression_ratio = ratio;
        self
    }

    /// Request-layer validation: text length bounds, blank text and ratio bounds
    pub fn validate(&self, limits: &LimitsConfig) -> Result<()> {
        if self.text.trim().is_empty() {
            return Err(PipelineError::Validation("text must not be blank".to_string()));
        }
        let length = self.text.chars().count();
        if length < limits.min_text_length {
            return Err(PipelineError::Validation(format!(
                "text is {length} characters, minimum is {}",
                limits.min_text_length
            )));
        }
        if length > limits.max_text_length {
            return Err(PipelineError::Validation(format!(
                "text is {length} characters, maximum is {}",
                limits.max_text_length
            )));
        }
        limits.check_ratio(self.compression_ratio)
    }
}

/// Result of a non-streaming summarization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryOutcome {
    pub summary: String,
    /// Input length in characters
    pub original_length: usize,
    /// Summary length in characters
    pub summary_length: usize,
    /// `summary_length / original_length`
    pub compression_ratio: f64,
    /// Strategy actually executed
    pub strategy_used: Strategy,
    pub processing_time_secs: f64,
}
