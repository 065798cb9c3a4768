//! The three summarization strategies
//!
//! Each strategy runs its CPU-bound work on the blocking pool and its map
//! calls through [`run_batches`], then hands back the final generation step
//! for the orchestrator to stream.

use super::batch::{run_batches, MapRequest};
use super::models::Strategy;
use super::run::{PipelineRun, PipelineState};
use super::SummaryPipeline;
use crate::error::{PipelineError, Result};
use crate::extractive::SentenceCount;
use crate::generation::prompts;
use crate::generation::GenerationRequest;
use crate::metrics::METRICS;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Chunk count above which relevance gating applies
const RANKING_MIN_CHUNKS: usize = 3;

/// Chunks always kept by relevance gating
const MIN_RETAINED_CHUNKS: usize = 2;

/// Floor of the per-chunk word target
const MIN_WORDS_PER_CHUNK: usize = 50;

/// What remains once a strategy has done its map work
#[derive(Debug)]
pub(crate) enum Reduction {
    /// The answer is already known
    Final(String),
    /// One streamed call produces the answer
    Generate {
        request: GenerationRequest,
        phase: &'static str,
    },
}

/// Run CPU-bound work on the blocking pool, abandoning it on cancellation
pub(crate) async fn blocking<T, F>(cancel: &CancellationToken, work: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let handle = tokio::task::spawn_blocking(work);
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PipelineError::Cancelled),
        joined = handle => Ok(joined?),
    }
}

/// Number of chunks kept after ranking `total` chunks
pub(crate) fn retained_count(total: usize, priority_ratio: f64) -> usize {
    ((total as f64 * priority_ratio) as usize)
        .max(MIN_RETAINED_CHUNKS)
        .min(total)
}

/// Per-chunk word target: `max(50, target / chunks)`
pub(crate) fn words_per_chunk(target_words: usize, chunks: usize) -> usize {
    (target_words / chunks.max(1)).max(MIN_WORDS_PER_CHUNK)
}

/// Label each chunk's sentences with its 1-based section number
///
/// Chunks that yielded no sentences get no header; numbering still follows
/// chunk position.
pub(crate) fn label_sections(extracted: &[Vec<String>]) -> String {
    let mut lines = Vec::new();
    for (index, sentences) in extracted.iter().enumerate() {
        if sentences.is_empty() {
            continue;
        }
        lines.push(format!("Section {}:", index + 1));
        lines.extend(sentences.iter().cloned());
        lines.push(String::new());
    }
    lines.join("\n")
}

impl SummaryPipeline {
    /// Summarize a leading window of the text in one call
    pub(super) fn simple(&self, run: &mut PipelineRun, text: &str) -> Reduction {
        run.transition_to(PipelineState::Generating);
        let window: String = text
            .chars()
            .take(self.config.generation.simple_window_chars)
            .collect();
        debug!(run_id = %run.id, window_chars = window.chars().count(), "Simple summarization");

        Reduction::Generate {
            request: GenerationRequest::new(prompts::simple_prompt(&window))
                .with_system(prompts::system_message(run.target_words)),
            phase: "simple",
        }
    }

    /// Relevance-gated map-reduce over semantic chunks
    pub(super) async fn hierarchical(
        &self,
        run: &mut PipelineRun,
        text: String,
        cancel: &CancellationToken,
    ) -> Result<Reduction> {
        run.transition_to(PipelineState::Chunking);
        let chunker = Arc::clone(&self.chunker);
        let chunks = blocking(cancel, move || {
            chunker.split_default(&text, Strategy::Hierarchical)
        })
        .await?;
        let produced = chunks.len();

        let retained: Vec<(usize, String)> =
            if produced > RANKING_MIN_CHUNKS && self.config.relevance.filtering_enabled {
                run.transition_to(PipelineState::Ranking);
                let ranker = self.ranker.clone();
                let keep = retained_count(produced, self.config.relevance.priority_ratio);
                blocking(cancel, move || {
                    let mut ranked = ranker.rank_chunks_by_importance(&chunks);
                    ranked.truncate(keep);
                    ranked.sort_by_key(|c| c.original_index);
                    ranked
                        .into_iter()
                        .map(|c| (c.original_index, c.chunk.text))
                        .collect()
                })
                .await?
            } else {
                chunks.into_iter().map(|c| (c.index, c.text)).collect()
            };

        METRICS.record_chunks(produced, produced - retained.len());
        let per_chunk = words_per_chunk(run.target_words, retained.len());
        info!(
            run_id = %run.id,
            chunks = produced,
            retained = retained.len(),
            words_per_chunk = per_chunk,
            "Hierarchical map phase"
        );

        run.transition_to(PipelineState::Generating);
        let system = prompts::system_message(per_chunk);
        let requests = retained
            .iter()
            .map(|(original_index, text)| MapRequest {
                original_index: *original_index,
                request: GenerationRequest::new(prompts::chunk_prompt(original_index + 1, text))
                    .with_system(system.clone()),
            })
            .collect();
        let completions = run_batches(
            Arc::clone(&self.generator),
            requests,
            self.config.generation.max_parallel,
            cancel,
        )
        .await?;

        let mut summaries: Vec<String> = completions.into_iter().map(|(_, s)| s).collect();
        if summaries.len() <= 1 {
            return Ok(Reduction::Final(summaries.pop().unwrap_or_default()));
        }

        run.transition_to(PipelineState::Reducing);
        Ok(Reduction::Generate {
            request: GenerationRequest::new(prompts::combine_prompt(&summaries))
                .with_system(prompts::system_message(run.target_words)),
            phase: "reduce",
        })
    }

    /// Extract key sentences from every chunk, then synthesize them in one call
    pub(super) async fn detailed(
        &self,
        run: &mut PipelineRun,
        text: String,
        cancel: &CancellationToken,
    ) -> Result<Reduction> {
        run.transition_to(PipelineState::Chunking);
        let chunker = Arc::clone(&self.chunker);
        let chunks = blocking(cancel, move || {
            chunker.split_default(&text, Strategy::Detailed)
        })
        .await?;
        METRICS.record_chunks(chunks.len(), 0);

        run.transition_to(PipelineState::Ranking);
        let compressor = self.compressor.clone();
        let per_chunk = self.config.extractive.sentences_per_chunk;
        let extracted = blocking(cancel, move || {
            let sections: Vec<Vec<String>> = chunks
                .iter()
                .map(|chunk| {
                    compressor.extract_sentences(&chunk.text, SentenceCount::Count(per_chunk))
                })
                .collect();
            label_sections(&sections)
        })
        .await?;
        info!(
            run_id = %run.id,
            extracted_chars = extracted.chars().count(),
            "Detailed extraction finished"
        );

        run.transition_to(PipelineState::Reducing);
        Ok(Reduction::Generate {
            request: GenerationRequest::new(prompts::detailed_prompt(&extracted))
                .with_system(prompts::system_message(run.target_words)),
            phase: "reduce",
        })
    }
}
