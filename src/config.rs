//! Pipeline configuration
//!
//! Layered: serde defaults, then an optional TOML file, then
//! `SMART_SUMMARY__<SECTION>__<KEY>` environment variables. A `.env` file is
//! loaded first when present.

use crate::chunking::ChunkingConfig;
use crate::error::{PipelineError, Result};
use crate::extractive::ExtractiveConfig;
use crate::generation::GenerationConfig;
use crate::relevance::RelevanceConfig;
use crate::tokens::TokenBudgetConfig;
use config::{Config, Environment, File};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

const ENV_PREFIX: &str = "SMART_SUMMARY";

/// Complete pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub tokens: TokenBudgetConfig,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub generation: GenerationSettings,

    #[serde(default)]
    pub extractive: ExtractiveConfig,

    #[serde(default)]
    pub relevance: RelevanceConfig,

    #[serde(default)]
    pub limits: LimitsConfig,

    /// Generation backend client
    #[serde(default)]
    pub llm: GenerationConfig,
}

/// How the pipeline drives the generation backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSettings {
    /// Concurrent map calls, also the batch size
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    /// Characters of the document sent by the simple strategy
    #[serde(default = "default_simple_window_chars")]
    pub simple_window_chars: usize,
}

fn default_max_parallel() -> usize {
    5
}

fn default_simple_window_chars() -> usize {
    10_000
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_parallel: default_max_parallel(),
            simple_window_chars: default_simple_window_chars(),
        }
    }
}

/// Request bounds enforced by the request layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_min_text_length")]
    pub min_text_length: usize,

    #[serde(default = "default_max_text_length")]
    pub max_text_length: usize,

    #[serde(default = "default_min_compression_ratio")]
    pub min_compression_ratio: f64,

    #[serde(default = "default_max_compression_ratio")]
    pub max_compression_ratio: f64,

    #[serde(default = "default_compression_ratio")]
    pub default_compression_ratio: f64,
}

fn default_min_text_length() -> usize {
    100
}

fn default_max_text_length() -> usize {
    300_000
}

fn default_min_compression_ratio() -> f64 {
    0.05
}

fn default_max_compression_ratio() -> f64 {
    0.50
}

fn default_compression_ratio() -> f64 {
    0.20
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            min_text_length: default_min_text_length(),
            max_text_length: default_max_text_length(),
            min_compression_ratio: default_min_compression_ratio(),
            max_compression_ratio: default_max_compression_ratio(),
            default_compression_ratio: default_compression_ratio(),
        }
    }
}

impl LimitsConfig {
    /// Check a compression ratio against the configured bounds
    pub fn check_ratio(&self, ratio: f64) -> Result<()> {
        if !(self.min_compression_ratio..=self.max_compression_ratio).contains(&ratio) {
            return Err(PipelineError::Validation(format!(
                "compression ratio {ratio} outside [{}, {}]",
                self.min_compression_ratio, self.max_compression_ratio
            )));
        }
        Ok(())
    }
}

impl PipelineConfig {
    /// Load configuration from an optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Ok(env_file) = dotenvy::dotenv() {
            debug!(path = %env_file.display(), "Loaded .env file");
        }

        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: PipelineConfig = builder
            .build()
            .and_then(Config::try_deserialize)
            .map_err(|e| PipelineError::Configuration(e.to_string()))?;

        let config = config.from_env();
        config.validate()?;
        Ok(config)
    }

    /// Fill the API key from conventional environment variables when unset
    pub fn from_env(mut self) -> Self {
        if self.llm.api_key.is_none() {
            let key = std::env::var("OPENAI_API_KEY").or_else(|_| std::env::var("LLM_API_KEY"));
            if let Ok(key) = key {
                self.llm.api_key = Some(SecretString::new(key));
            }
        }
        if let Ok(endpoint) = std::env::var("LLM_ENDPOINT") {
            self.llm.endpoint = endpoint;
        }
        self
    }

    /// Reject inconsistent values
    pub fn validate(&self) -> Result<()> {
        self.tokens
            .validate()
            .map_err(|e| PipelineError::Configuration(e.to_string()))?;

        let chunking = &self.chunking;
        for (name, size) in [
            ("chunk_size", chunking.chunk_size),
            ("hierarchical_chunk_size", chunking.hierarchical_chunk_size),
            ("detailed_chunk_size", chunking.detailed_chunk_size),
        ] {
            if size == 0 {
                return Err(PipelineError::Configuration(format!(
                    "chunking.{name} must be positive"
                )));
            }
        }

        if self.generation.max_parallel == 0 {
            return Err(PipelineError::Configuration(
                "generation.max_parallel must be positive".to_string(),
            ));
        }
        if self.extractive.max_sentences == 0 {
            return Err(PipelineError::Configuration(
                "extractive.max_sentences must be positive".to_string(),
            ));
        }
        if self.generation.simple_window_chars == 0 {
            return Err(PipelineError::Configuration(
                "generation.simple_window_chars must be positive".to_string(),
            ));
        }

        for (name, ratio) in [
            ("relevance.priority_ratio", self.relevance.priority_ratio),
            ("extractive.compression_ratio", self.extractive.compression_ratio),
            ("limits.min_compression_ratio", self.limits.min_compression_ratio),
            ("limits.max_compression_ratio", self.limits.max_compression_ratio),
        ] {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(PipelineError::Configuration(format!(
                    "{name} must be in (0, 1], got {ratio}"
                )));
            }
        }

        let limits = &self.limits;
        if limits.min_text_length > limits.max_text_length {
            return Err(PipelineError::Configuration(
                "limits.min_text_length exceeds limits.max_text_length".to_string(),
            ));
        }
        if limits.min_compression_ratio > limits.max_compression_ratio {
            return Err(PipelineError::Configuration(
                "limits.min_compression_ratio exceeds limits.max_compression_ratio".to_string(),
            ));
        }
        limits
            .check_ratio(limits.default_compression_ratio)
            .map_err(|e| PipelineError::Configuration(e.to_string()))?;

        Ok(())
    }
}
