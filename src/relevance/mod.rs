//! Chunk relevance ranking built on extractive sentence scores
//!
//! A chunk's importance is the mean score of its five best sentences. Ranking,
//! priority splitting and threshold filtering all work on that number, which
//! is only meaningful relative to the other chunks in the same batch.

pub mod models;

pub use models::{ChunkAnnotation, RelevanceConfig, ScoredChunk};

use crate::chunking::Chunk;
use crate::extractive::{ExtractiveCompressor, RankedSentence, SentenceCount};
use tracing::debug;

/// Sentences averaged into a chunk's score
const TOP_SENTENCES_PER_CHUNK: usize = 5;

/// Relevance ranker
#[derive(Debug, Clone, Default)]
pub struct RelevanceRanker {
    compressor: ExtractiveCompressor,
}

impl RelevanceRanker {
    pub fn new(compressor: ExtractiveCompressor) -> Self {
        Self { compressor }
    }

    pub fn compressor(&self) -> &ExtractiveCompressor {
        &self.compressor
    }

    /// Mean score of the chunk's top sentences, zero when nothing is extracted
    pub fn chunk_score(&self, text: &str) -> f64 {
        let top = self.compressor.analyze_importance(text, TOP_SENTENCES_PER_CHUNK);
        if top.is_empty() {
            return 0.0;
        }
        top.iter().map(|s| s.score).sum::<f64>() / top.len() as f64
    }

    /// Score every chunk and sort by score, highest first
    ///
    /// Equal scores keep document order.
    pub fn rank_chunks_by_importance(&self, chunks: &[Chunk]) -> Vec<ScoredChunk> {
        let mut ranked: Vec<ScoredChunk> = chunks
            .iter()
            .enumerate()
            .map(|(original_index, chunk)| ScoredChunk {
                importance_score: self.chunk_score(&chunk.text),
                chunk: chunk.clone(),
                original_index,
            })
            .collect();
        ranked.sort_by(|a, b| b.importance_score.total_cmp(&a.importance_score));

        debug!(
            chunks = ranked.len(),
            best = ranked.first().map(|c| c.original_index),
            "Ranked chunks by importance"
        );
        ranked
    }

    /// Split ranked chunks into high and low priority at `max(1, floor(len * ratio))`
    pub fn prioritize(
        &self,
        chunks: &[Chunk],
        priority_ratio: f64,
    ) -> (Vec<ScoredChunk>, Vec<ScoredChunk>) {
        let mut high = self.rank_chunks_by_importance(chunks);
        let split = ((high.len() as f64 * priority_ratio) as usize)
            .max(1)
            .min(high.len());
        let low = high.split_off(split);
        (high, low)
    }

    /// Keep chunks whose max-normalized score reaches `threshold`
    ///
    /// At least one chunk always survives. When every score is zero the
    /// chunks cannot be ranked and are returned unchanged.
    pub fn filter_by_threshold(&self, chunks: &[Chunk], threshold: f64) -> Vec<Chunk> {
        let ranked = self.rank_chunks_by_importance(chunks);
        let max_score = ranked.first().map_or(0.0, |c| c.importance_score);
        if max_score <= 0.0 {
            return chunks.to_vec();
        }

        let mut kept: Vec<Chunk> = ranked
            .iter()
            .filter(|c| c.importance_score / max_score >= threshold)
            .map(|c| c.chunk.clone())
            .collect();
        if kept.is_empty() {
            kept.extend(ranked.into_iter().take(1).map(|c| c.chunk));
        }
        kept
    }

    /// Extract essential sentences, widening the ratio once if too few come back
    pub fn essential_parts(&self, text: &str, target_ratio: f64, min_sentences: usize) -> String {
        if text.trim().is_empty() {
            return text.to_string();
        }

        let mut sentences = self
            .compressor
            .extract_sentences(text, SentenceCount::Ratio(target_ratio));
        if sentences.len() < min_sentences {
            let widened = (target_ratio * 1.5).min(1.0);
            debug!(
                found = sentences.len(),
                min_sentences,
                widened,
                "Widening essential extraction"
            );
            sentences = self
                .compressor
                .extract_sentences(text, SentenceCount::Ratio(widened));
        }
        sentences.join(" ")
    }

    /// Most important sentences of a text in rank order
    pub fn importance_map(&self, text: &str, top_n: usize) -> Vec<RankedSentence> {
        self.compressor.analyze_importance(text, top_n)
    }

    /// Score every chunk and report it in document order
    pub fn annotate_chunks(&self, chunks: &[Chunk]) -> Vec<ChunkAnnotation> {
        let ranked = self.rank_chunks_by_importance(chunks);
        if ranked.is_empty() {
            return Vec::new();
        }
        let mean = ranked.iter().map(|c| c.importance_score).sum::<f64>() / ranked.len() as f64;

        let mut annotations: Vec<ChunkAnnotation> = ranked
            .into_iter()
            .map(|c| ChunkAnnotation {
                original_index: c.original_index,
                priority_score: c.importance_score,
                size: c.chunk.size,
                is_essential: c.importance_score > mean,
            })
            .collect();
        annotations.sort_by_key(|a| a.original_index);
        annotations
    }

    /// Extractive pre-compression of text to `max_length` characters
    ///
    /// With `preserve_structure`, the text is cut into sections at header-like
    /// lines (starting with `#` or shorter than 50 characters) and each section
    /// is compressed separately, slightly generously, before a final hard trim.
    pub fn preprocess_for_llm(
        &self,
        text: &str,
        max_length: usize,
        preserve_structure: bool,
    ) -> String {
        let length = text.chars().count();
        if length <= max_length {
            return text.to_string();
        }
        if !preserve_structure {
            return self.compressor.essential_content(text, max_length);
        }

        let ratio = (max_length as f64 / length as f64 * 1.2).min(1.0);
        let processed: Vec<String> = split_sections(text)
            .iter()
            .map(|section| self.compressor.extract_and_compress(section, ratio))
            .collect();

        let result = processed.join("\n\n");
        if result.chars().count() > max_length {
            result.chars().take(max_length).collect()
        } else {
            result
        }
    }

    /// Compression ratio suited to a text of `text_length` characters
    pub fn recommended_ratio(text_length: usize) -> f64 {
        match text_length {
            0..=9_999 => 1.0,
            10_000..=49_999 => 0.7,
            50_000..=99_999 => 0.5,
            100_000..=199_999 => 0.3,
            _ => 0.2,
        }
    }
}

fn split_sections(text: &str) -> Vec<String> {
    let mut sections = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.split('\n') {
        let trimmed = line.trim();
        let is_header = trimmed.starts_with('#') || trimmed.chars().count() < 50;
        if is_header && !current.is_empty() {
            sections.push(current.join("\n"));
            current.clear();
        }
        current.push(line);
    }
    if !current.is_empty() {
        sections.push(current.join("\n"));
    }
    sections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::SemanticChunker;
    use crate::extractive::ExtractiveConfig;

    const RUST: &str = "Rust guarantees memory safety through ownership. \
        The borrow checker validates references at compile time. \
        Ownership and borrowing make memory safety possible without garbage collection. \
        The Rust compiler rejects programs that violate ownership rules.";

    const MIXED: &str = "Tomatoes need sunlight. Cats sleep often. \
        Trains run late sometimes. Bread tastes good.";

    fn chunks(texts: &[&str]) -> Vec<Chunk> {
        texts
            .iter()
            .enumerate()
            .map(|(index, t)| Chunk {
                index,
                text: t.to_string(),
                size: t.chars().count(),
                start: 0,
                overlap: 0,
            })
            .collect()
    }

    fn heuristic_ranker() -> RelevanceRanker {
        RelevanceRanker::new(ExtractiveCompressor::new(ExtractiveConfig {
            language: "none".to_string(),
            ..Default::default()
        }))
    }

    #[test]
    fn test_rank_is_score_descending() {
        let ranker = RelevanceRanker::default();
        let ranked = ranker.rank_chunks_by_importance(&chunks(&[MIXED, RUST, MIXED]));
        assert_eq!(ranked.len(), 3);
        assert!(ranked.windows(2).all(|w| w[0].importance_score >= w[1].importance_score));
        let mut indices: Vec<usize> = ranked.iter().map(|c| c.original_index).collect();
        indices.sort_unstable();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_empty_chunk_scores_zero() {
        let ranker = RelevanceRanker::default();
        assert_eq!(ranker.chunk_score(""), 0.0);
    }

    #[test]
    fn test_prioritize_split_point() {
        let ranker = RelevanceRanker::default();
        let input = chunks(&[RUST, MIXED, RUST, MIXED, RUST]);
        let (high, low) = ranker.prioritize(&input, 0.7);
        assert_eq!(high.len(), 3);
        assert_eq!(low.len(), 2);

        let (high, low) = ranker.prioritize(&input[..1], 0.1);
        assert_eq!(high.len(), 1);
        assert!(low.is_empty());
    }

    #[test]
    fn test_filter_threshold_zero_keeps_all() {
        let ranker = RelevanceRanker::default();
        let input = chunks(&[RUST, MIXED, RUST]);
        assert_eq!(ranker.filter_by_threshold(&input, 0.0).len(), 3);
    }

    #[test]
    fn test_filter_threshold_above_one_keeps_best() {
        let ranker = heuristic_ranker();
        let input = chunks(&[MIXED, RUST, "Short. Tiny."]);
        let kept = ranker.filter_by_threshold(&input, 1.01);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_filter_all_zero_returns_input() {
        let ranker = RelevanceRanker::default();
        let input = chunks(&["", "   "]);
        let kept = ranker.filter_by_threshold(&input, 0.9);
        assert_eq!(kept, input);
    }

    #[test]
    fn test_essential_parts_widens_once() {
        let ranker = heuristic_ranker();
        let text = "This is one sentence of the text. ".repeat(10);
        let narrow = ranker.compressor().extract_sentences(&text, SentenceCount::Ratio(0.2));
        assert_eq!(narrow.len(), 2);
        let essential = ranker.essential_parts(&text, 0.2, 5);
        // 0.3 of 10 sentences after one widening
        assert_eq!(essential.matches("sentence").count(), 3);
    }

    #[test]
    fn test_annotate_chunks_in_original_order() {
        let ranker = RelevanceRanker::default();
        let annotations = ranker.annotate_chunks(&chunks(&[MIXED, RUST, MIXED]));
        let order: Vec<usize> = annotations.iter().map(|a| a.original_index).collect();
        assert_eq!(order, vec![0, 1, 2]);
        assert_eq!(annotations[1].size, RUST.chars().count());
        // identical chunks share a score, so both sit on the same side of the mean
        assert_eq!(annotations[0].is_essential, annotations[2].is_essential);
    }

    #[test]
    fn test_preprocess_for_llm() {
        let ranker = RelevanceRanker::default();
        let text = format!("# Intro\n{}\n# Details\n{}", RUST.repeat(5), MIXED.repeat(5));
        let structured = ranker.preprocess_for_llm(&text, 400, true);
        assert!(structured.chars().count() <= 400);
        let plain = ranker.preprocess_for_llm(&text, 400, false);
        assert!(plain.chars().count() <= 400);
        assert_eq!(ranker.preprocess_for_llm("short", 400, true), "short");
    }

    #[test]
    fn test_recommended_ratio() {
        assert_eq!(RelevanceRanker::recommended_ratio(5_000), 1.0);
        assert_eq!(RelevanceRanker::recommended_ratio(10_000), 0.7);
        assert_eq!(RelevanceRanker::recommended_ratio(75_000), 0.5);
        assert_eq!(RelevanceRanker::recommended_ratio(150_000), 0.3);
        assert_eq!(RelevanceRanker::recommended_ratio(300_000), 0.2);
    }

    #[test]
    fn test_ranks_semantic_chunks() {
        let text = format!("{}\n\n{}", RUST.repeat(4), MIXED.repeat(4));
        let separators = ["\n\n".to_string(), " ".to_string()];
        let split = SemanticChunker::default().split(&text, 400, 0, &separators);
        let ranked = RelevanceRanker::default().rank_chunks_by_importance(&split);
        assert_eq!(ranked.len(), split.len());
    }
}
