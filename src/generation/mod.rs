//! Text generation capability consumed by the pipeline
//!
//! The pipeline only needs two calls: a single completion and an ordered,
//! cancellable stream of fragments. Vendor details live behind
//! [`TextGenerator`]; retries belong to implementations, never to callers.

pub mod openai;
pub mod prompts;

pub use openai::{GenerationConfig, OpenAiCompatibleGenerator};

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

/// Ordered fragments of one completion
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, GenerationError>> + Send>>;

/// One generation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub system: Option<String>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// Text generation backend
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Stream a completion as it is produced
    ///
    /// The stream ends without error once `cancel` fires.
    async fn generate_stream(
        &self,
        request: GenerationRequest,
        cancel: CancellationToken,
    ) -> Result<FragmentStream, GenerationError>;

    /// Produce a whole completion
    ///
    /// Defaults to concatenating the stream; cancellation yields
    /// [`GenerationError::Cancelled`] rather than a partial completion.
    async fn generate(
        &self,
        request: GenerationRequest,
        cancel: CancellationToken,
    ) -> Result<String, GenerationError> {
        let mut stream = self.generate_stream(request, cancel.clone()).await?;
        let mut completion = String::new();
        while let Some(fragment) = stream.next().await {
            completion.push_str(&fragment?);
        }
        if cancel.is_cancelled() {
            return Err(GenerationError::Cancelled);
        }
        Ok(completion)
    }
}

/// Generation errors
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Initialization error: {0}")]
    Initialization(String),

    #[error("API error: HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Generation cancelled")]
    Cancelled,
}

impl GenerationError {
    /// Whether retrying the same call could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            GenerationError::Network(_) => true,
            GenerationError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
