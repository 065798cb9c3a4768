//! Error taxonomy for the summarization pipeline

use crate::generation::GenerationError;
use crate::tokens::BudgetError;
use thiserror::Error;

/// Pipeline result type
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors surfaced by a summarization run
///
/// Extraction problems never appear here: the extractive layer repairs them
/// locally with its heuristic scorer.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Resource limit exceeded: {what} is {size} characters, limit is {limit}")]
    ResourceLimitExceeded {
        what: &'static str,
        size: usize,
        limit: usize,
    },

    #[error("Generation failed: {0}")]
    Generation(GenerationError),

    #[error("Summarization cancelled")]
    Cancelled,

    #[error("Configuration invalid: {0}")]
    Configuration(String),

    #[error("Worker task failed: {0}")]
    Worker(String),
}

impl PipelineError {
    /// Whether this error is the cancellation outcome rather than a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PipelineError::Cancelled)
    }
}

impl From<BudgetError> for PipelineError {
    fn from(err: BudgetError) -> Self {
        match err {
            BudgetError::ResourceLimitExceeded { chars, limit } => {
                PipelineError::ResourceLimitExceeded {
                    what: "text for token chunking",
                    size: chars,
                    limit,
                }
            }
            other => PipelineError::Validation(other.to_string()),
        }
    }
}

impl From<GenerationError> for PipelineError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::Cancelled => PipelineError::Cancelled,
            other => PipelineError::Generation(other),
        }
    }
}

impl From<tokio::task::JoinError> for PipelineError {
    fn from(err: tokio::task::JoinError) -> Self {
        PipelineError::Worker(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_limit_maps_to_resource_limit() {
        let err: PipelineError = BudgetError::ResourceLimitExceeded {
            chars: 250_001,
            limit: 200_000,
        }
        .into();
        match err {
            PipelineError::ResourceLimitExceeded { size, limit, .. } => {
                assert_eq!(size, 250_001);
                assert_eq!(limit, 200_000);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_generation_cancel_maps_to_cancelled() {
        let err: PipelineError = GenerationError::Cancelled.into();
        assert!(err.is_cancelled());
        let err: PipelineError = GenerationError::Network("reset".into()).into();
        assert!(matches!(err, PipelineError::Generation(_)));
    }

    #[test]
    fn test_cancelled_is_not_a_failure() {
        assert!(PipelineError::Cancelled.is_cancelled());
        assert!(!PipelineError::Validation("x".into()).is_cancelled());
    }
}
