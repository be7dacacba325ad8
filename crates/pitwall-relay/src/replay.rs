//! Replay feed: stream a recorded telemetry session from a JSON-lines file,
//! one record per tick, looping back to the start at end-of-file. The replay
//! pauses while no viewer is connected, same as the synthetic feed.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::feed::wait_for_viewers;
use crate::registry::ViewerRegistry;

/// A telemetry recording loaded into memory: one JSON object per line.
pub struct Recording {
    records: Vec<String>,
}

impl Recording {
    /// Load a recording. Blank lines and lines that are not JSON objects are
    /// skipped with a warning; an unreadable file is an error.
    pub async fn load(path: &Path) -> std::io::Result<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        let mut records = Vec::new();
        for (idx, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(line) {
                Ok(Value::Object(_)) => records.push(line.to_string()),
                Ok(_) => warn!(line = idx + 1, "replay record is not a JSON object, skipped"),
                Err(e) => warn!(line = idx + 1, error = %e, "invalid replay record, skipped"),
            }
        }
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record at `cursor`, wrapping at the end.
    pub fn get(&self, cursor: usize) -> Option<&str> {
        if self.records.is_empty() {
            None
        } else {
            Some(self.records[cursor % self.records.len()].as_str())
        }
    }
}

/// Spawn the replay feed: one record per tick to all connected viewers,
/// wrapping back to the first record after the last.
pub fn run_replay_feed(
    registry: Arc<ViewerRegistry>,
    recording: Recording,
    interval: Duration,
) -> JoinHandle<()> {
    let mut occupancy = registry.watch_occupancy();
    tokio::spawn(async move {
        if recording.is_empty() {
            warn!("replay recording has no records, feed not started");
            return;
        }
        tracing::info!(records = recording.len(), "replay feed started");

        let mut ticker = tokio::time::interval(interval);
        let mut cursor = 0usize;
        loop {
            if !wait_for_viewers(&mut occupancy, &mut ticker).await {
                return;
            }
            ticker.tick().await;
            if *occupancy.borrow() == 0 {
                continue;
            }

            if let Some(record) = recording.get(cursor) {
                registry.broadcast(record);
            }
            cursor = cursor.wrapping_add(1);
            if cursor % recording.len() == 0 {
                tracing::debug!("replay reached end of recording, restarting");
            }
        }
    })
}
