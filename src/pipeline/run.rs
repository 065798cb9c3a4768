//! Per-request run state

use super::models::Strategy;
use crate::metrics::METRICS;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use uuid::Uuid;

/// Pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Validating,
    Chunking,
    Ranking,
    Generating,
    Reducing,
    Streaming,
    Done,
    Error,
    Cancelled,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::Done | PipelineState::Error | PipelineState::Cancelled
        )
    }

    fn outcome_label(&self) -> &'static str {
        match self {
            PipelineState::Done => "completed",
            PipelineState::Cancelled => "cancelled",
            _ => "failed",
        }
    }
}

/// Ephemeral state of one summarization run
///
/// Owned by the task coordinating the run and dropped when it ends.
#[derive(Debug)]
pub struct PipelineRun {
    pub id: Uuid,
    pub requested_strategy: Strategy,
    /// Strategy actually executed
    pub strategy: Strategy,
    pub input_words: usize,
    pub target_words: usize,
    state: PipelineState,
    output: String,
    started: Instant,
}

impl PipelineRun {
    pub fn new(requested_strategy: Strategy) -> Self {
        Self {
            id: Uuid::new_v4(),
            requested_strategy,
            strategy: requested_strategy,
            input_words: 0,
            target_words: 0,
            state: PipelineState::Validating,
            output: String::new(),
            started: Instant::now(),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Move to a new state; terminal states are final and record run metrics
    pub fn transition_to(&mut self, new_state: PipelineState) {
        if self.state.is_terminal() {
            return;
        }
        debug!(run_id = %self.id, from = ?self.state, to = ?new_state, "Pipeline transition");
        self.state = new_state;

        if new_state.is_terminal() {
            let elapsed = self.elapsed();
            METRICS.record_run(
                self.strategy.as_str(),
                new_state.outcome_label(),
                elapsed.as_secs_f64(),
            );
            info!(
                run_id = %self.id,
                strategy = %self.strategy,
                outcome = new_state.outcome_label(),
                output_chars = self.output.chars().count(),
                elapsed_secs = elapsed.as_secs_f64(),
                "Summarization finished"
            );
        }
    }

    /// Append a fragment already streamed to the caller
    pub fn record_fragment(&mut self, fragment: &str) {
        self.output.push_str(fragment);
    }

    /// Everything streamed so far
    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_state_is_final() {
        let mut run = PipelineRun::new(Strategy::Hierarchical);
        run.transition_to(PipelineState::Chunking);
        run.transition_to(PipelineState::Cancelled);
        run.transition_to(PipelineState::Done);
        assert_eq!(run.state(), PipelineState::Cancelled);
    }

    #[test]
    fn test_records_output() {
        let mut run = PipelineRun::new(Strategy::Simple);
        run.record_fragment("Hello, ");
        run.record_fragment("world");
        assert_eq!(run.output(), "Hello, world");
    }
}
