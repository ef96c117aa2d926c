// src/measure/worker.rs
// =============================================================================
// This module runs the measurement workers.
//
// A worker is a loop:
// 1. Take the next URL entry from the shared URL channel
// 2. Walk its redirect chain
// 3. Send the measurement to the result channel
// 4. Repeat until the URL channel is closed and empty
//
// tokio's mpsc receiver has a single owner, so the workers share it behind
// an async Mutex. The lock is held only while waiting for one entry, never
// during a measurement.
//
// Workers never close a channel. They just return, and the pipeline notices
// through their JoinHandles.
// =============================================================================

use std::sync::Arc;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::walker::{Measurement, Walker};
use crate::testlist::UrlEntry;

/// The URL channel receiver, shared by every worker of the pool
pub type SharedUrls = Arc<Mutex<Receiver<UrlEntry>>>;

/// Returns how many URLs this worker measured
pub async fn run_worker(
    id: usize,
    walker: Walker,
    urls: SharedUrls,
    results: Sender<Measurement>,
) -> usize {
    let mut measured = 0;

    loop {
        // The guard is dropped at the end of this statement
        let next = urls.lock().await.recv().await;
        let Some(entry) = next else {
            break;
        };

        debug!(worker = id, url = %entry.url, "measuring");
        let measurement = walker.measure(&entry).await;
        debug!(worker = id, url = %entry.url, ok = measurement.is_ok(), "measuring... done");

        if results.send(measurement).await.is_err() {
            warn!(worker = id, "result channel closed, stopping early");
            break;
        }
        measured += 1;
    }

    info!(worker = id, measured, "worker finished");
    measured
}

/// Spawns `count` workers sharing `urls`, each with its own result sender
pub fn spawn_workers(
    count: usize,
    walker: &Walker,
    urls: &SharedUrls,
    results: &Sender<Measurement>,
) -> Vec<JoinHandle<usize>> {
    (0..count)
        .map(|id| {
            tokio::spawn(run_worker(
                id,
                walker.clone(),
                Arc::clone(urls),
                results.clone(),
            ))
        })
        .collect()
}
