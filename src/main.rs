// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Set up logging (tracing, filtered by RUST_LOG, default "info")
// 2. Parse command-line arguments using clap
// 3. Create results.jsonl fresh and run the measurement pipeline into it
// 4. Exit with proper code (0 = success, 1 = fatal error)
//
// Individual URLs failing is normal and never changes the exit code. Only
// problems with our inputs or our output file do.
// =============================================================================

// Module declarations - tells Rust about our other source files
mod cli;        // src/cli.rs - command-line parsing
mod measure;    // src/measure/ - redirect-chain walker and workers
mod pipeline;   // src/pipeline/ - orchestrator and result collector
mod testlist;   // src/testlist/ - test-list parsing and source readers

use anyhow::{Context, Result};
use clap::Parser;
use cli::Cli;
use pipeline::{run_pipeline, PipelineConfig, PipelineSummary};
use tokio::fs::File;
use tokio::io::BufWriter;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Where measurements are written, relative to the working directory
const OUTPUT_FILE: &str = "results.jsonl";

#[tokio::main]
async fn main() {
    init_logging();

    let exit_code = match run().await {
        Ok(()) => 0,
        Err(e) => {
            // {:#} prints the whole context chain on one line
            error!("{:#}", e);
            1
        }
    };

    std::process::exit(exit_code);
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = PipelineConfig::default();

    // File::create truncates, so every run starts from an empty file
    let output = File::create(OUTPUT_FILE)
        .await
        .with_context(|| format!("cannot create {}", OUTPUT_FILE))?;

    let (_, summary) = run_pipeline(&config, &cli.files, BufWriter::new(output)).await?;

    log_summary(&summary);
    Ok(())
}

fn log_summary(summary: &PipelineSummary) {
    info!(
        sources = summary.sources,
        skipped = summary.skipped_files,
        urls = summary.urls,
        measurements = summary.measurements,
        failures = summary.failures,
        output = OUTPUT_FILE,
        "done"
    );
}
