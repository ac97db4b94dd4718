// src/feed/jsonl.rs

//! JSON-lines export of a run's feed, one [`FeedEvent`] per line.
//!
//! This is the format dashboards tail to render live run state.

use std::path::PathBuf;

use anyhow::Context;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::feed::{EventFeed, FeedEvent};

/// Spawn a background task that writes the feed (backlog first, then live
/// events) to `path` until the run reaches a terminal status.
///
/// Every event is written exactly once, in `seq` order. If the live receiver
/// lags, the missed events are read back from the feed's log.
pub fn spawn_jsonl_sink(feed: &EventFeed, path: PathBuf) -> JoinHandle<Result<()>> {
    let (backlog, mut rx) = feed.subscribe_with_backlog();
    let feed = feed.clone();
    let run_id = feed.run_id();

    tokio::spawn(async move {
        let mut file = File::create(&path)
            .await
            .with_context(|| format!("creating event log {:?}", path))?;
        let mut last_seq = 0;

        let finished = write_new(&mut file, &backlog, &mut last_seq).await?;

        if !finished {
            loop {
                let batch = match rx.recv().await {
                    Ok(event) => vec![event],
                    Err(RecvError::Lagged(n)) => {
                        warn!(
                            run_id = %run_id,
                            skipped = n,
                            last_seq,
                            "event log writer lagged; catching up from the feed"
                        );
                        feed.events_since(last_seq)
                    }
                    Err(RecvError::Closed) => break,
                };
                if write_new(&mut file, &batch, &mut last_seq).await? {
                    break;
                }
            }
        }

        file.flush().await?;
        debug!(run_id = %run_id, path = ?path, last_seq, "event log complete");
        Ok(())
    })
}

/// Write the events of `batch` not yet written, advancing `last_seq`.
///
/// Returns `true` once the run-finished event has been written.
async fn write_new(file: &mut File, batch: &[FeedEvent], last_seq: &mut u64) -> Result<bool> {
    for event in batch.iter() {
        if event.seq <= *last_seq {
            continue;
        }
        write_event(file, event).await?;
        *last_seq = event.seq;
        if event.is_run_finished() {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Serialize one event as a single JSON line.
pub fn to_line(event: &FeedEvent) -> Result<String> {
    let mut line = serde_json::to_string(event).context("serializing feed event")?;
    line.push('\n');
    Ok(line)
}

async fn write_event(file: &mut File, event: &FeedEvent) -> Result<()> {
    let line = to_line(event)?;
    file.write_all(line.as_bytes()).await?;
    Ok(())
}
