//! Data models for relevance ranking

use crate::chunking::Chunk;
use serde::{Deserialize, Serialize};

/// A chunk with its importance score
///
/// Scores are only comparable within one ranking batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub importance_score: f64,
    pub original_index: usize,
}

/// Per-chunk report in document order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkAnnotation {
    pub original_index: usize,
    pub priority_score: f64,
    /// Size in characters
    pub size: usize,
    /// Scored above the batch mean
    pub is_essential: bool,
}

/// Relevance configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelevanceConfig {
    /// Rank and filter chunks before map generation
    #[serde(default = "default_filtering_enabled")]
    pub filtering_enabled: bool,

    /// Normalized score cut for threshold filtering
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Fraction of ranked chunks kept as high priority
    #[serde(default = "default_priority_ratio")]
    pub priority_ratio: f64,

    /// Sentences an essential-parts extraction should reach before retrying wider
    #[serde(default = "default_min_sentences")]
    pub min_sentences: usize,
}

fn default_filtering_enabled() -> bool {
    true
}

fn default_threshold() -> f64 {
    0.5
}

fn default_priority_ratio() -> f64 {
    0.7
}

fn default_min_sentences() -> usize {
    10
}

impl Default for RelevanceConfig {
    fn default() -> Self {
        Self {
            filtering_enabled: default_filtering_enabled(),
            threshold: default_threshold(),
            priority_ratio: default_priority_ratio(),
            min_sentences: default_min_sentences(),
        }
    }
}
