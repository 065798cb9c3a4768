//! Adaptive chunking and map-reduce summarization
//!
//! Long documents are measured against a token budget, split on semantic
//! boundaries, ranked by sentence centrality and summarized through a
//! bounded-parallel map-reduce over a pluggable text generation backend,
//! with output streamed as it is produced.

pub mod chunking;
pub mod config;
pub mod error;
pub mod extractive;
pub mod generation;
pub mod metrics;
pub mod pipeline;
pub mod relevance;
pub mod telemetry;
pub mod tokens;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use generation::{GenerationRequest, OpenAiCompatibleGenerator, TextGenerator};
pub use pipeline::{PartialResult, Strategy, SummaryOutcome, SummaryPipeline, SummaryRequest};
