//! Semantic-boundary-aware chunking
//!
//! Splits documents on the strongest structural boundary available (section
//! headers, then paragraphs, lines, sentences, words) and reassembles the
//! pieces greedily into chunks with a short overlap of trailing context.
//! Never tokenizes, so it is the default path for large documents.

mod splitter;

pub use splitter::Chunk;

use crate::pipeline::Strategy;
use serde::{Deserialize, Serialize};
use splitter::{merge_ranges, overlap_start, split_ranges};
use tracing::debug;

/// Chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Generic chunk size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Chunk size for the hierarchical strategy; also the simple-strategy threshold
    #[serde(default = "default_chunk_size")]
    pub hierarchical_chunk_size: usize,

    /// Chunk size for the detailed strategy
    #[serde(default = "default_chunk_size")]
    pub detailed_chunk_size: usize,

    /// Overlap between consecutive chunks in characters
    #[serde(default = "default_overlap")]
    pub overlap: usize,

    /// Separators, strongest boundary first
    #[serde(default = "default_separators")]
    pub separators: Vec<String>,
}

fn default_chunk_size() -> usize {
    100_000
}

fn default_overlap() -> usize {
    1_000
}

fn default_separators() -> Vec<String> {
    ["\n## ", "\n### ", "\n#### ", "\n\n", "\n", ". ", " "]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            hierarchical_chunk_size: default_chunk_size(),
            detailed_chunk_size: default_chunk_size(),
            overlap: default_overlap(),
            separators: default_separators(),
        }
    }
}

impl ChunkingConfig {
    /// Chunk size used by a strategy
    pub fn size_for(&self, strategy: Strategy) -> usize {
        match strategy {
            Strategy::Detailed => self.detailed_chunk_size,
            Strategy::Hierarchical => self.hierarchical_chunk_size,
            Strategy::Simple => self.chunk_size,
        }
    }
}

/// Semantic chunker
#[derive(Debug, Clone, Default)]
pub struct SemanticChunker {
    config: ChunkingConfig,
}

impl SemanticChunker {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Split with the configured separators, sized for a strategy
    pub fn split_default(&self, text: &str, strategy: Strategy) -> Vec<Chunk> {
        self.split(
            text,
            self.config.size_for(strategy),
            self.config.overlap,
            &self.config.separators,
        )
    }

    /// Split `text` into ordered chunks of at most `max_size` characters
    ///
    /// Overlap is clamped to `max_size / 2`. Concatenating every chunk's
    /// [`Chunk::fresh_text`] in index order reproduces `text` exactly.
    pub fn split(
        &self,
        text: &str,
        max_size: usize,
        overlap: usize,
        separators: &[String],
    ) -> Vec<Chunk> {
        if text.is_empty() {
            return Vec::new();
        }

        let max_size = max_size.max(1);
        let overlap = overlap.min(max_size / 2);
        let limit = max_size - overlap;

        let mut pieces = Vec::new();
        split_ranges(text, 0, text.len(), separators, limit, &mut pieces);
        let regions = merge_ranges(text, &pieces, limit);

        let mut chunks = Vec::with_capacity(regions.len());
        let mut previous_start = 0;
        for (index, &(start, end)) in regions.iter().enumerate() {
            let chunk_start = if index == 0 {
                start
            } else {
                overlap_start(text, previous_start, start, overlap)
            };
            let chunk_text = &text[chunk_start..end];
            chunks.push(Chunk {
                index,
                text: chunk_text.to_string(),
                size: chunk_text.chars().count(),
                start: chunk_start,
                overlap: start - chunk_start,
            });
            previous_start = start;
        }

        let avg_size = chunks.iter().map(|c| c.size).sum::<usize>() / chunks.len().max(1);
        debug!(chunks = chunks.len(), avg_size, max_size, overlap, "Chunking completed");
        chunks
    }
}

/// Count whitespace-delimited words
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Reading time in whole minutes, at least one
pub fn estimate_reading_minutes(text: &str, words_per_minute: usize) -> usize {
    (count_words(text) / words_per_minute.max(1)).max(1)
}
