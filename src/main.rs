//! Command-line summarizer streaming to stdout

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use smart_summary::metrics::METRICS;
use smart_summary::{
    telemetry, OpenAiCompatibleGenerator, PartialResult, PipelineConfig, Strategy, SummaryPipeline,
    SummaryRequest,
};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "smart-summary", version, about = "Summarize a document with an LLM")]
struct Args {
    /// Strategy: simple, hierarchical or detailed
    #[arg(long, default_value = "hierarchical")]
    strategy: String,

    /// Target summary length as a fraction of the input word count
    #[arg(long)]
    ratio: Option<f64>,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Print Prometheus metrics to stderr on exit
    #[arg(long)]
    print_metrics: bool,

    /// Document to summarize; stdin when omitted
    file: Option<PathBuf>,
}

fn read_document(path: Option<&PathBuf>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("failed to read stdin")?;
            Ok(text)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    telemetry::init_tracing(args.json_logs);

    let config = PipelineConfig::load(args.config.as_deref())?;
    let request = SummaryRequest::new(read_document(args.file.as_ref())?)
        .with_strategy(Strategy::from(args.strategy.as_str()))
        .with_compression_ratio(args.ratio.unwrap_or(config.limits.default_compression_ratio));
    request.validate(&config.limits)?;

    let generator = Arc::new(OpenAiCompatibleGenerator::new(config.llm.clone())?);
    let pipeline = SummaryPipeline::new(config, generator)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            on_signal.cancel();
        }
    });

    let mut events = pipeline.summarize_stream(request, cancel.clone());
    let mut stdout = std::io::stdout().lock();
    let mut failure = None;
    while let Some(event) = events.next().await {
        match event {
            PartialResult::Content(fragment) => {
                stdout.write_all(fragment.as_bytes())?;
                stdout.flush()?;
            }
            PartialResult::Complete => writeln!(stdout)?,
            PartialResult::Error(message) => failure = Some(message),
        }
    }

    if args.print_metrics {
        eprint!("{}", METRICS.export_prometheus());
    }
    if let Some(message) = failure {
        anyhow::bail!(message);
    }
    if cancel.is_cancelled() {
        info!("Summarization cancelled");
    }
    Ok(())
}
