// src/pipeline/orchestrator.rs
// =============================================================================
// This module wires the whole measurement pipeline together.
//
//   source readers --[URL channel]--> workers --[result channel]--> collector
//
// The start/stop order matters, and getting it wrong either deadlocks or
// loses results:
// 1. Create both channels
// 2. Start the workers and the collector
// 3. Start one source reader per input file (legend files are skipped)
// 4. Wait for every reader, then close the URL channel
// 5. Wait for every worker, then close the result channel
// 6. Wait for the collector to drain and flush
//
// "Closing" a tokio channel means dropping the last Sender. We keep one
// sender of each channel here, so nothing can close them behind our back.
//
// Both channels hold a single item. A reader waits until a worker takes its
// entry, a worker waits until the collector takes its measurement. That is
// the only backpressure we need.
// =============================================================================

use anyhow::{anyhow, bail, Context, Result};
use futures::future::try_join_all;
use futures::stream::{FuturesUnordered, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWrite;
use tokio::sync::{mpsc, Mutex};
use tokio::task::{JoinError, JoinHandle};
use tracing::{info, warn};

use super::collector::{spawn_collector, CollectorStats};
use crate::measure::{spawn_workers, Measurement, SharedUrls, Walker, WalkerConfig};
use crate::testlist::{base_name, is_legend, spawn_reader, UrlEntry};

// tokio channels need a capacity of at least one
const CHANNEL_CAPACITY: usize = 1;

/// Knobs of one pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Number of concurrent workers, which is also the connection limit
    pub workers: usize,
    /// Time budget for each URL's whole redirect chain
    pub timeout: Duration,
    /// Hops recorded before a chain is cut with "too many redirections"
    pub max_hops: usize,
    /// Input files whose name contains this are legends, not URL lists
    pub legend_marker: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let walker = WalkerConfig::default();
        Self {
            workers: 20,
            timeout: walker.timeout,
            max_hops: walker.max_hops,
            legend_marker: "00-LEGEND-".to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn walker_config(&self) -> WalkerConfig {
        WalkerConfig {
            timeout: self.timeout,
            max_hops: self.max_hops,
        }
    }
}

/// What a finished run did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineSummary {
    /// Input files that were read
    pub sources: usize,
    /// Input files skipped as legends
    pub skipped_files: usize,
    /// URL entries put on the URL channel
    pub urls: usize,
    /// Measurements written to the sink
    pub measurements: usize,
    /// Measurements that carry a failure
    pub failures: usize,
}

// Runs the full pipeline over `paths`, writing JSON lines to `sink`.
//
// Returns the sink (so callers and tests can inspect it) and a summary.
// Any reader or collector error ends the run right away.
pub async fn run_pipeline<W>(
    config: &PipelineConfig,
    paths: &[PathBuf],
    sink: W,
) -> Result<(W, PipelineSummary)>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    if config.workers == 0 {
        bail!("the pipeline needs at least one worker");
    }

    // Step 1: channels
    let (url_tx, url_rx) = mpsc::channel::<UrlEntry>(CHANNEL_CAPACITY);
    let (result_tx, result_rx) = mpsc::channel::<Measurement>(CHANNEL_CAPACITY);

    // Step 2: consumers before producers
    let walker = Walker::new(config.walker_config());
    let urls: SharedUrls = Arc::new(Mutex::new(url_rx));
    let workers = spawn_workers(config.workers, &walker, &urls, &result_tx);
    drop(urls);
    let mut collector = spawn_collector(sink, result_rx);
    info!(workers = config.workers, "worker pool started");

    // Step 3: one reader per input file
    let mut readers = Vec::new();
    let mut skipped_files = 0;
    for path in paths {
        if is_legend(path, &config.legend_marker) {
            warn!(file = %base_name(path), "skipping legend file");
            skipped_files += 1;
            continue;
        }
        readers.push(spawn_reader(path.clone(), url_tx.clone()));
    }
    let sources = readers.len();

    // Step 4: all readers done, then close the URL channel.
    // The collector can only finish early by failing, so we watch it too.
    let urls_sent = tokio::select! {
        sent = join_readers(readers) => sent?,
        early = &mut collector => return Err(collector_exited_early(early)),
    };
    drop(url_tx);
    info!(sources, urls = urls_sent, "all test lists read");

    // Step 5: all workers done, then close the result channel
    let measured: usize = try_join_all(workers)
        .await
        .context("worker task panicked")?
        .into_iter()
        .sum();
    drop(result_tx);
    info!(measured, "all workers finished");

    // Step 6: the collector drains what is left and flushes
    let (sink, stats) = collector.await.context("collector task panicked")??;

    let CollectorStats {
        measurements,
        failures,
    } = stats;
    Ok((
        sink,
        PipelineSummary {
            sources,
            skipped_files,
            urls: urls_sent,
            measurements,
            failures,
        },
    ))
}

// Waits for readers in completion order, so the first failure stops the run
async fn join_readers(readers: Vec<JoinHandle<Result<usize>>>) -> Result<usize> {
    let mut pending: FuturesUnordered<_> = readers.into_iter().collect();
    let mut sent = 0;
    while let Some(joined) = pending.next().await {
        sent += joined.context("source reader task panicked")??;
    }
    Ok(sent)
}

fn collector_exited_early<T>(result: Result<Result<T>, JoinError>) -> anyhow::Error {
    match result {
        Ok(Err(e)) => e.context("collector stopped before all test lists were read"),
        Err(e) => anyhow!(e).context("collector task panicked"),
        Ok(Ok(_)) => anyhow!("collector finished while the result channel was still open"),
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. How do you "close" a tokio channel?
//    - There is no close() on a Sender
//    - The channel closes when the last Sender is dropped
//    - recv() then returns None once the buffer is empty
//
// 2. What does tokio::select! do here?
//    - Waits on two futures at once and runs the branch of whichever wins
//    - `&mut collector` polls the JoinHandle without giving it away,
//      so we can still await it in step 6
// -----------------------------------------------------------------------------
