//! Bounded-parallel map calls
//!
//! Requests run in consecutive batches of at most `max_parallel`, each call
//! holding a semaphore permit. Batch N+1 starts only after every call of
//! batch N has finished, so at most `max_parallel` calls are ever in flight.

use crate::error::{PipelineError, Result};
use crate::generation::{GenerationRequest, TextGenerator};
use crate::metrics::METRICS;
use futures::future::try_join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// A map request tagged with the original index of its chunk
#[derive(Debug, Clone)]
pub struct MapRequest {
    pub original_index: usize,
    pub request: GenerationRequest,
}

/// Run map requests batch by batch, returning completions ordered by original index
///
/// Cancellation drops every in-flight call of the current batch and starts no
/// further batches.
pub async fn run_batches(
    generator: Arc<dyn TextGenerator>,
    requests: Vec<MapRequest>,
    max_parallel: usize,
    cancel: &CancellationToken,
) -> Result<Vec<(usize, String)>> {
    let max_parallel = max_parallel.max(1);
    let total_batches = requests.len().div_ceil(max_parallel);
    let semaphore = Arc::new(Semaphore::new(max_parallel));
    let mut completions = Vec::with_capacity(requests.len());

    for (batch_index, batch) in requests.chunks(max_parallel).enumerate() {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        info!(
            batch = batch_index + 1,
            total_batches,
            calls = batch.len(),
            "Processing map batch"
        );

        let calls = batch.iter().cloned().map(|map| {
            let generator = Arc::clone(&generator);
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.child_token();
            async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| PipelineError::Worker(e.to_string()))?;
                let _in_flight = METRICS.track_in_flight();

                let result = generator.generate(map.request, cancel).await;
                METRICS.record_generation("map", result.is_ok());
                let summary = result?;
                debug!(
                    section = map.original_index + 1,
                    chars = summary.len(),
                    "Chunk summary received"
                );
                Ok::<_, PipelineError>((map.original_index, summary))
            }
        });

        let batch_results = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
            results = try_join_all(calls) => results?,
        };
        completions.extend(batch_results);
    }

    completions.sort_by_key(|(index, _)| *index);
    Ok(completions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::{FragmentStream, GenerationError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct Tracking {
        current: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TextGenerator for Tracking {
        async fn generate_stream(
            &self,
            _request: GenerationRequest,
            _cancel: CancellationToken,
        ) -> std::result::Result<FragmentStream, GenerationError> {
            Err(GenerationError::Malformed("streaming not scripted".into()))
        }

        async fn generate(
            &self,
            request: GenerationRequest,
            _cancel: CancellationToken,
        ) -> std::result::Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            // later prompts finish first
            let delay = 30 - request.prompt.len().min(25);
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            if request.prompt == "fail" {
                return Err(GenerationError::Api { status: 500, body: "boom".into() });
            }
            Ok(format!("summary of {}", request.prompt))
        }
    }

    fn requests(prompts: &[&str]) -> Vec<MapRequest> {
        prompts
            .iter()
            .enumerate()
            .map(|(original_index, p)| MapRequest {
                original_index,
                request: GenerationRequest::new(*p),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_results_ordered_and_bounded() {
        let generator = Arc::new(Tracking::default());
        let prompts = ["a", "bb", "ccc", "dddd", "eeeee", "ffffff", "g"];
        let cancel = CancellationToken::new();
        let results = run_batches(generator.clone(), requests(&prompts), 2, &cancel)
            .await
            .unwrap();

        let indices: Vec<usize> = results.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, (0..7).collect::<Vec<_>>());
        assert_eq!(results[3].1, "summary of dddd");
        assert!(generator.peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 7);
    }

    #[tokio::test]
    async fn test_failure_stops_later_batches() {
        let generator = Arc::new(Tracking::default());
        let result = run_batches(
            generator.clone(),
            requests(&["fail", "ok", "later", "later"]),
            2,
            &CancellationToken::new(),
        )
        .await;
        assert!(matches!(result, Err(PipelineError::Generation(_))));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let generator = Arc::new(Tracking::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = run_batches(generator.clone(), requests(&["a", "b"]), 2, &cancel).await;
        assert!(matches!(result, Err(PipelineError::Cancelled)));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }
}
