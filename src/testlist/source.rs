// src/testlist/source.rs
// =============================================================================
// This module turns one test-list file into a stream of URL entries.
//
// One source reader runs per input file. All of them push onto the same
// URL channel, which the worker pool drains.
//
// Important: a reader never closes the URL channel. It only drops its own
// clone of the sender. The pipeline keeps one more sender alive and closes
// the channel itself once every reader is done.
//
// Rust concepts:
// - tokio::spawn: Run the reader as its own task
// - spawn_blocking: CSV parsing is plain blocking I/O, keep it off the
//   async worker threads
// - JoinHandle: Lets the pipeline wait for the reader to finish
// =============================================================================

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::reader::{read_test_list, TestListEntry};

// A URL to measure, tagged with the list it came from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UrlEntry {
    pub url: String,
    pub filename: String,
}

/// File name without its directories, used to tag measurements
pub fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// True for legend/manifest files that describe lists but hold no URLs
pub fn is_legend(path: &Path, marker: &str) -> bool {
    base_name(path).contains(marker)
}

// Sends one UrlEntry per test-list row.
//
// Each send waits until a worker has room, which is what keeps a huge list
// from being loaded into the channel all at once.
//
// Returns: how many entries were sent
pub async fn emit_entries(
    filename: &str,
    entries: Vec<TestListEntry>,
    urls: &Sender<UrlEntry>,
) -> Result<usize> {
    let mut sent = 0;
    for entry in entries {
        debug!(
            file = %filename,
            url = %entry.url,
            category = %entry.category_code,
            description = %entry.category_description,
            added = %entry.date_added,
            source = %entry.source,
            notes = %entry.notes,
            "queueing"
        );
        let url_entry = UrlEntry {
            url: entry.url,
            filename: filename.to_string(),
        };
        urls.send(url_entry)
            .await
            .map_err(|_| anyhow!("URL channel closed while sending entries of {}", filename))?;
        sent += 1;
    }
    debug!(file = %filename, sent, "source reader finished");
    Ok(sent)
}

// Starts a reader task for one input file.
//
// The task parses the file, then emits its entries. Any error (missing file,
// malformed row, closed channel) comes back through the JoinHandle.
pub fn spawn_reader(path: PathBuf, urls: Sender<UrlEntry>) -> JoinHandle<Result<usize>> {
    tokio::spawn(async move {
        let filename = base_name(&path);

        let parse_path = path.clone();
        let entries = tokio::task::spawn_blocking(move || read_test_list(&parse_path))
            .await
            .with_context(|| format!("parser task for {} did not complete", path.display()))??;

        info!(file = %filename, entries = entries.len(), "read test list");
        emit_entries(&filename, entries, &urls).await
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tokio::sync::mpsc;

    fn row(url: &str) -> TestListEntry {
        TestListEntry {
            url: url.to_string(),
            category_code: "CAT".to_string(),
            category_description: "desc".to_string(),
            date_added: "2020-01-01".to_string(),
            source: "tester".to_string(),
            notes: String::new(),
        }
    }

    #[test]
    fn test_base_name_strips_directories() {
        assert_eq!(base_name(Path::new("/lists/global.csv")), "global.csv");
        assert_eq!(base_name(Path::new("it.csv")), "it.csv");
    }

    #[test]
    fn test_is_legend() {
        let marker = "00-LEGEND-";
        assert!(is_legend(Path::new("lists/00-LEGEND-category_codes.csv"), marker));
        assert!(!is_legend(Path::new("lists/global.csv"), marker));
        // Only the base name counts, not the directories
        assert!(!is_legend(Path::new("00-LEGEND-dir/global.csv"), marker));
    }

    #[tokio::test]
    async fn test_emit_entries_tags_every_url() {
        let (tx, mut rx) = mpsc::channel(8);

        let sent = emit_entries("list.csv", vec![row("http://x/a"), row("http://x/b")], &tx)
            .await
            .unwrap();
        drop(tx);

        assert_eq!(sent, 2);
        let mut received = Vec::new();
        while let Some(entry) = rx.recv().await {
            received.push(entry);
        }
        assert_eq!(
            received,
            vec![
                UrlEntry {
                    url: "http://x/a".to_string(),
                    filename: "list.csv".to_string()
                },
                UrlEntry {
                    url: "http://x/b".to_string(),
                    filename: "list.csv".to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_emit_entries_fails_on_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let err = emit_entries("list.csv", vec![row("http://x/a")], &tx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("list.csv"));
    }

    #[tokio::test]
    async fn test_spawn_reader_parses_and_sends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "http://x/a,CAT,desc,2020-01-01,tester,note").unwrap();
        drop(file);

        let (tx, mut rx) = mpsc::channel(1);
        let handle = spawn_reader(path, tx);

        let entry = rx.recv().await.unwrap();
        assert_eq!(entry.url, "http://x/a");
        assert_eq!(entry.filename, "list.csv");
        assert_eq!(handle.await.unwrap().unwrap(), 1);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_spawn_reader_reports_missing_file() {
        let (tx, _rx) = mpsc::channel(1);
        let result = spawn_reader(PathBuf::from("/no/such/list.csv"), tx).await.unwrap();
        assert!(result.is_err());
    }
}
