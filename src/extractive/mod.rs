//! Extractive sentence selection
//!
//! One compressor fronts four interchangeable scoring algorithms. Scoring
//! either ranks the document's sentences or reports why it cannot; callers
//! resolve the second case with a deterministic length/position heuristic,
//! so extraction never fails outright.

mod algorithms;
mod fallback;
mod graph;
mod sentences;

pub use sentences::normalize_whitespace;

use crate::metrics::METRICS;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Sentence scoring algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ExtractiveAlgorithm {
    /// Word-overlap similarity graph with PageRank
    TextRank,
    /// Thresholded tf-idf cosine graph with PageRank
    LexRank,
    /// Latent semantic analysis over the term/sentence matrix
    Lsa,
    /// Luhn's significant-word clusters
    Luhn,
}

impl ExtractiveAlgorithm {
    pub const ALL: [ExtractiveAlgorithm; 4] = [
        ExtractiveAlgorithm::TextRank,
        ExtractiveAlgorithm::LexRank,
        ExtractiveAlgorithm::Lsa,
        ExtractiveAlgorithm::Luhn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractiveAlgorithm::TextRank => "textrank",
            ExtractiveAlgorithm::LexRank => "lexrank",
            ExtractiveAlgorithm::Lsa => "lsa",
            ExtractiveAlgorithm::Luhn => "luhn",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ExtractiveAlgorithm::TextRank => {
                "Graph-based ranking using sentence word overlap. Fast, works well for most texts."
            }
            ExtractiveAlgorithm::LexRank => {
                "Graph-based ranking using tf-idf cosine similarity. Good for formal documents."
            }
            ExtractiveAlgorithm::Lsa => {
                "Latent semantic analysis over the term/sentence matrix. Good for topical content."
            }
            ExtractiveAlgorithm::Luhn => {
                "Statistical scoring by clusters of frequent words. \
                 Very fast, good for simple texts."
            }
        }
    }
}

impl From<&str> for ExtractiveAlgorithm {
    /// Unknown names select TextRank
    fn from(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "lexrank" => ExtractiveAlgorithm::LexRank,
            "lsa" => ExtractiveAlgorithm::Lsa,
            "luhn" => ExtractiveAlgorithm::Luhn,
            _ => ExtractiveAlgorithm::TextRank,
        }
    }
}

impl From<String> for ExtractiveAlgorithm {
    fn from(name: String) -> Self {
        ExtractiveAlgorithm::from(name.as_str())
    }
}

impl From<ExtractiveAlgorithm> for String {
    fn from(algorithm: ExtractiveAlgorithm) -> Self {
        algorithm.as_str().to_string()
    }
}

impl fmt::Display for ExtractiveAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extractive configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractiveConfig {
    #[serde(default = "default_algorithm")]
    pub algorithm: ExtractiveAlgorithm,

    /// Language of the stopword list
    #[serde(default = "default_language")]
    pub language: String,

    /// Key sentences pulled from each chunk by the detailed strategy
    #[serde(default = "default_sentences_per_chunk")]
    pub sentences_per_chunk: usize,

    /// Default ratio for extract-and-compress
    #[serde(default = "default_compression_ratio")]
    pub compression_ratio: f64,

    /// Largest sentence count ranked by the graph and matrix scorers
    #[serde(default = "default_max_sentences")]
    pub max_sentences: usize,
}

fn default_algorithm() -> ExtractiveAlgorithm {
    ExtractiveAlgorithm::TextRank
}

fn default_language() -> String {
    "english".to_string()
}

fn default_sentences_per_chunk() -> usize {
    10
}

fn default_compression_ratio() -> f64 {
    0.3
}

fn default_max_sentences() -> usize {
    2_000
}

impl Default for ExtractiveConfig {
    fn default() -> Self {
        Self {
            algorithm: default_algorithm(),
            language: default_language(),
            sentences_per_chunk: default_sentences_per_chunk(),
            compression_ratio: default_compression_ratio(),
            max_sentences: default_max_sentences(),
        }
    }
}

/// How many sentences to extract
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SentenceCount {
    Count(usize),
    /// Fraction of the document's sentences, at least one
    Ratio(f64),
}

impl SentenceCount {
    fn resolve(self, total: usize) -> usize {
        match self {
            SentenceCount::Count(count) => count,
            SentenceCount::Ratio(ratio) => ((total as f64 * ratio) as usize).max(1),
        }
    }
}

/// A sentence with its score and position in the document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatedSentence {
    pub text: String,
    pub position: usize,
    pub score: f64,
}

/// A sentence in importance order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedSentence {
    pub sentence: String,
    pub score: f64,
    /// 1-based rank
    pub rank: usize,
}

/// Outcome of primary scoring
#[derive(Debug, Clone, PartialEq)]
pub enum Scoring {
    /// Every sentence scored, in document order
    Ranked(Vec<RatedSentence>),
    /// The primary algorithm cannot rank this document
    Unavailable(String),
}

/// Extractive compressor
#[derive(Debug, Clone)]
pub struct ExtractiveCompressor {
    config: ExtractiveConfig,
    stopwords: Option<Arc<FxHashSet<String>>>,
}

impl Default for ExtractiveCompressor {
    fn default() -> Self {
        Self::new(ExtractiveConfig::default())
    }
}

impl ExtractiveCompressor {
    pub fn new(config: ExtractiveConfig) -> Self {
        let stopwords = sentences::load_stopwords(&config.language).map(Arc::new);
        if stopwords.is_none() {
            warn!(
                language = %config.language,
                "No stopword list for language, extraction will use heuristic scoring"
            );
        }
        Self { config, stopwords }
    }

    pub fn algorithm(&self) -> ExtractiveAlgorithm {
        self.config.algorithm
    }

    pub fn config(&self) -> &ExtractiveConfig {
        &self.config
    }

    /// Algorithms this compressor can be built with
    pub fn available_algorithms() -> &'static [ExtractiveAlgorithm] {
        &ExtractiveAlgorithm::ALL
    }

    /// Score every sentence with the configured algorithm
    pub fn score(&self, text: &str) -> Scoring {
        let normalized = normalize_whitespace(text);
        self.score_normalized(&normalized)
    }

    fn score_normalized(&self, normalized: &str) -> Scoring {
        let Some(stopwords) = &self.stopwords else {
            return Scoring::Unavailable(format!(
                "no stopword list for language '{}'",
                self.config.language
            ));
        };

        let sentences = sentences::segment(normalized, stopwords);
        if sentences.len() > self.config.max_sentences {
            return Scoring::Unavailable(format!(
                "{} sentences exceed the ranking limit of {}",
                sentences.len(),
                self.config.max_sentences
            ));
        }
        match algorithms::score(self.config.algorithm, &sentences) {
            Ok(scores) => Scoring::Ranked(
                sentences
                    .into_iter()
                    .zip(scores)
                    .map(|(s, score)| RatedSentence {
                        text: s.text,
                        position: s.position,
                        score,
                    })
                    .collect(),
            ),
            Err(reason) => Scoring::Unavailable(reason.to_string()),
        }
    }

    /// Scored sentences in document order, from the primary algorithm or the heuristic
    pub fn rate(&self, text: &str) -> Vec<RatedSentence> {
        let normalized = normalize_whitespace(text);
        if normalized.is_empty() {
            return Vec::new();
        }
        match self.score_normalized(&normalized) {
            Scoring::Ranked(rated) => rated,
            Scoring::Unavailable(reason) => {
                METRICS.extraction_fallbacks.inc();
                warn!(
                    algorithm = %self.config.algorithm,
                    %reason,
                    "Extractive scoring unavailable, using heuristic fallback"
                );
                let sentences = sentences::split_on_terminators(&normalized);
                let scores = fallback::heuristic_scores(&sentences);
                sentences
                    .into_iter()
                    .zip(scores)
                    .enumerate()
                    .map(|(position, (text, score))| RatedSentence { text, position, score })
                    .collect()
            }
        }
    }

    /// Top sentences, returned in original document order
    pub fn extract_sentences(&self, text: &str, count: SentenceCount) -> Vec<String> {
        let rated = self.rate(text);
        let count = count.resolve(rated.len());
        if rated.len() <= count {
            return rated.into_iter().map(|s| s.text).collect();
        }

        let scores: Vec<f64> = rated.iter().map(|s| s.score).collect();
        let mut keep = fallback::top_indices(&scores, count);
        keep.sort_unstable();

        debug!(total = rated.len(), kept = keep.len(), "Extracted sentences");
        keep.into_iter().map(|i| rated[i].text.clone()).collect()
    }

    /// Extract at `ratio` and join the sentences with single spaces
    pub fn extract_and_compress(&self, text: &str, ratio: f64) -> String {
        self.extract_sentences(text, SentenceCount::Ratio(ratio)).join(" ")
    }

    /// Compress text to at most `max_length` characters
    pub fn essential_content(&self, text: &str, max_length: usize) -> String {
        let length = text.chars().count();
        if length <= max_length {
            return text.to_string();
        }

        let ratio = max_length as f64 / length as f64;
        let compressed = self.extract_and_compress(text, ratio);
        if compressed.chars().count() > max_length {
            compressed.chars().take(max_length).collect()
        } else {
            compressed
        }
    }

    /// Key sentences from each chunk, concatenated in chunk order
    pub fn extract_from_chunks<S: AsRef<str>>(
        &self,
        chunks: &[S],
        per_chunk: usize,
    ) -> Vec<String> {
        chunks
            .iter()
            .flat_map(|chunk| {
                self.extract_sentences(chunk.as_ref(), SentenceCount::Count(per_chunk))
            })
            .collect()
    }

    /// The `top_n` most important sentences in rank order
    ///
    /// When the primary algorithm is unavailable, heuristic picks get the
    /// descending placeholder scores `1.0, 0.9, 0.8, ...`.
    pub fn analyze_importance(&self, text: &str, top_n: usize) -> Vec<RankedSentence> {
        let normalized = normalize_whitespace(text);
        if normalized.is_empty() {
            return Vec::new();
        }

        match self.score_normalized(&normalized) {
            Scoring::Ranked(rated) => {
                let scores: Vec<f64> = rated.iter().map(|s| s.score).collect();
                fallback::top_indices(&scores, top_n)
                    .into_iter()
                    .enumerate()
                    .map(|(i, idx)| RankedSentence {
                        sentence: rated[idx].text.clone(),
                        score: rated[idx].score,
                        rank: i + 1,
                    })
                    .collect()
            }
            Scoring::Unavailable(reason) => {
                METRICS.extraction_fallbacks.inc();
                debug!(%reason, "Importance analysis using heuristic fallback");
                let sentences = sentences::split_on_terminators(&normalized);
                let scores = fallback::heuristic_scores(&sentences);
                fallback::top_indices(&scores, top_n)
                    .into_iter()
                    .enumerate()
                    .map(|(i, idx)| RankedSentence {
                        sentence: sentences[idx].clone(),
                        score: 1.0 - i as f64 * 0.1,
                        rank: i + 1,
                    })
                    .collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTICLE: &str = "Rust is a systems programming language focused on safety. \
        The Rust compiler enforces memory safety through ownership and borrowing. \
        Ownership rules let the Rust compiler free memory without a garbage collector. \
        My neighbour grows tomatoes in the garden every summer. \
        Borrowing in Rust allows references without taking ownership of memory. \
        The weather was pleasant yesterday afternoon.";

    fn compressor(algorithm: ExtractiveAlgorithm) -> ExtractiveCompressor {
        ExtractiveCompressor::new(ExtractiveConfig {
            algorithm,
            ..Default::default()
        })
    }

    #[test]
    fn test_algorithm_from_name() {
        assert_eq!(ExtractiveAlgorithm::from("LexRank"), ExtractiveAlgorithm::LexRank);
        assert_eq!(ExtractiveAlgorithm::from("lsa"), ExtractiveAlgorithm::Lsa);
        assert_eq!(ExtractiveAlgorithm::from("unknown"), ExtractiveAlgorithm::TextRank);
        assert_eq!(ExtractiveCompressor::available_algorithms().len(), 4);
    }

    #[test]
    fn test_extract_preserves_document_order() {
        for algorithm in ExtractiveAlgorithm::ALL {
            let extracted =
                compressor(algorithm).extract_sentences(ARTICLE, SentenceCount::Count(3));
            assert_eq!(extracted.len(), 3, "{algorithm}");
            let positions: Vec<usize> = extracted
                .iter()
                .map(|s| ARTICLE.find(s.as_str()).unwrap())
                .collect();
            assert!(positions.windows(2).all(|w| w[0] < w[1]), "{algorithm}");
        }
    }

    #[test]
    fn test_textrank_prefers_central_sentences() {
        let extracted = compressor(ExtractiveAlgorithm::TextRank)
            .extract_sentences(ARTICLE, SentenceCount::Count(2));
        assert!(extracted.iter().all(|s| s.contains("Rust") || s.contains("ownership")));
    }

    #[test]
    fn test_ratio_extracts_at_least_one() {
        let extracted = ExtractiveCompressor::default()
            .extract_sentences(ARTICLE, SentenceCount::Ratio(0.01));
        assert_eq!(extracted.len(), 1);
    }

    #[test]
    fn test_fewer_sentences_than_requested() {
        let extracted = ExtractiveCompressor::default()
            .extract_sentences("One sentence. Two sentences.", SentenceCount::Count(10));
        assert_eq!(extracted.len(), 2);
        assert!(ExtractiveCompressor::default()
            .extract_sentences("   ", SentenceCount::Count(3))
            .is_empty());
    }

    #[test]
    fn test_unsupported_language_uses_fallback() {
        let compressor = ExtractiveCompressor::new(ExtractiveConfig {
            language: "klingon".to_string(),
            ..Default::default()
        });
        assert!(matches!(compressor.score(ARTICLE), Scoring::Unavailable(_)));

        let extracted = compressor.extract_sentences(ARTICLE, SentenceCount::Count(4));
        assert_eq!(extracted.len(), 4);

        let ranked = compressor.analyze_importance(ARTICLE, 3);
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].score, 1.0);
        assert!((ranked[2].score - 0.8).abs() < 1e-9);
        assert_eq!(ranked[2].rank, 3);
    }

    #[test]
    fn test_sentence_limit_uses_fallback() {
        let compressor = ExtractiveCompressor::new(ExtractiveConfig {
            max_sentences: 50,
            ..Default::default()
        });
        let long = "Alpha beta gamma. ".repeat(5_000);

        let reason = match compressor.score(&long) {
            Scoring::Unavailable(reason) => reason,
            Scoring::Ranked(_) => panic!("ranked past the sentence limit"),
        };
        assert!(reason.contains("5000 sentences"), "{reason}");

        let extracted = compressor.extract_sentences(&long, SentenceCount::Count(3));
        assert_eq!(extracted.len(), 3);
        assert!(matches!(compressor.score(ARTICLE), Scoring::Ranked(_)));

        let many = "Alpha beta. ".repeat(25_000);
        let default = ExtractiveCompressor::default();
        assert!(matches!(default.score(&many), Scoring::Unavailable(_)));
        assert_eq!(default.extract_sentences(&many, SentenceCount::Count(5)).len(), 5);
    }

    #[test]
    fn test_extract_and_compress_joins_with_space() {
        let compressed = ExtractiveCompressor::default().extract_and_compress(ARTICLE, 0.5);
        assert!(compressed.len() < ARTICLE.len());
        assert!(!compressed.contains("  "));
    }

    #[test]
    fn test_essential_content_bounds() {
        let compressor = ExtractiveCompressor::default();
        assert_eq!(compressor.essential_content("short", 100), "short");
        let essential = compressor.essential_content(ARTICLE, 120);
        assert!(essential.chars().count() <= 120);
        assert!(!essential.is_empty());
    }

    #[test]
    fn test_extract_from_chunks() {
        let chunks = vec![ARTICLE.to_string(), ARTICLE.to_string()];
        let sentences = ExtractiveCompressor::default().extract_from_chunks(&chunks, 2);
        assert_eq!(sentences.len(), 4);
    }

    #[test]
    fn test_analyze_importance_rank_order() {
        let ranked = ExtractiveCompressor::default().analyze_importance(ARTICLE, 4);
        assert_eq!(ranked.len(), 4);
        assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(ranked[0].rank, 1);
    }
}
