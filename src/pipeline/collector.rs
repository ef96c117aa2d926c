// src/pipeline/collector.rs
// =============================================================================
// This module writes measurements to the output sink.
//
// There is exactly one collector. It is the only reader of the result
// channel and the only writer of the sink, so lines can never interleave.
//
// Output format: JSON lines, one measurement per line, in the order the
// workers finished (not the order of the input files).
//
// Any serialization or write error is returned right away. A half-written
// output file is left as it is.
// =============================================================================

use anyhow::{Context, Result};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::Receiver;
use tokio::task::JoinHandle;
use tracing::info;

use crate::measure::Measurement;

/// Counters gathered while writing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectorStats {
    pub measurements: usize,
    pub failures: usize,
}

/// Drains `results` into `sink` and hands the sink back once the channel closes
pub async fn collect_results<W>(
    mut sink: W,
    mut results: Receiver<Measurement>,
) -> Result<(W, CollectorStats)>
where
    W: AsyncWrite + Unpin,
{
    let mut stats = CollectorStats::default();

    while let Some(measurement) = results.recv().await {
        let mut line = serde_json::to_vec(&measurement)
            .with_context(|| format!("cannot serialize measurement of {}", measurement.orig_url))?;
        line.push(b'\n');

        sink.write_all(&line)
            .await
            .context("cannot write to the output sink")?;

        stats.measurements += 1;
        if !measurement.is_ok() {
            stats.failures += 1;
        }
    }

    sink.flush().await.context("cannot flush the output sink")?;
    info!(
        measurements = stats.measurements,
        failures = stats.failures,
        "collector finished"
    );

    Ok((sink, stats))
}

pub fn spawn_collector<W>(
    sink: W,
    results: Receiver<Measurement>,
) -> JoinHandle<Result<(W, CollectorStats)>>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(collect_results(sink, results))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measure::{RequestInfo, Response};
    use std::io;
    use std::pin::Pin;
    use std::task::{Context as TaskContext, Poll};
    use tokio::sync::mpsc;

    fn measurement(url: &str, failure: Option<&str>) -> Measurement {
        Measurement {
            failure: failure.map(String::from),
            orig_url: url.to_string(),
            filename: "list.csv".to_string(),
            responses: vec![Response {
                code: 200,
                body_size: 3,
                idx: 0,
                request: RequestInfo {
                    url: url.to_string(),
                },
            }],
        }
    }

    // A sink that refuses every write
    #[derive(Debug)]
    struct BrokenSink;

    impl AsyncWrite for BrokenSink {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut TaskContext<'_>,
            _buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::Other, "disk full")))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut TaskContext<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut TaskContext<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_writes_one_line_per_measurement_in_arrival_order() {
        let (tx, rx) = mpsc::channel(1);
        let collector = spawn_collector(Vec::new(), rx);

        tx.send(measurement("http://x/b", None)).await.unwrap();
        tx.send(measurement("http://x/a", Some("boom"))).await.unwrap();
        drop(tx);

        let (sink, stats) = collector.await.unwrap().unwrap();
        assert_eq!(
            stats,
            CollectorStats {
                measurements: 2,
                failures: 1
            }
        );

        let text = String::from_utf8(sink).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(text.ends_with('\n'));

        let first: Measurement = serde_json::from_str(lines[0]).unwrap();
        let second: Measurement = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(first, measurement("http://x/b", None));
        assert_eq!(second.failure.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_empty_channel_writes_nothing() {
        let (tx, rx) = mpsc::channel::<Measurement>(1);
        drop(tx);

        let (sink, stats) = collect_results(Vec::new(), rx).await.unwrap();
        assert!(sink.is_empty());
        assert_eq!(stats.measurements, 0);
    }

    #[tokio::test]
    async fn test_write_failure_is_fatal() {
        let (tx, rx) = mpsc::channel(1);
        let collector = spawn_collector(BrokenSink, rx);

        tx.send(measurement("http://x/a", None)).await.unwrap();
        drop(tx);

        let err = collector.await.unwrap().unwrap_err();
        assert!(err.to_string().contains("output sink"));
    }
}
