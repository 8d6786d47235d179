//! Append-only per-thread checkpoint log.
//!
//! Grounded line-for-line in `btflow/core/persistence.py`'s `SimpleCheckpointer`:
//! one newline-delimited JSON file per `thread_id`, written by appending, read by
//! scanning backward from EOF in fixed-size chunks so `load_latest` stays O(1)
//! amortized even once the file holds a long history.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt, SeekFrom};

use btflow_core::Value;

use crate::error::{Result, RuntimeError};

const CHUNK_SIZE: u64 = 8192;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub thread_id: String,
    pub step: u64,
    pub timestamp: DateTime<Utc>,
    pub state_dump: HashMap<String, Value>,
    pub tree_state: HashMap<String, String>,
}

/// Storage seam for checkpoints, so tests can swap in [`InMemoryCheckpointer`]
/// instead of touching the filesystem (teacher idiom: a narrow trait per effect,
/// one concrete adapter — see `aura-composition/src/adapters/*.rs`).
#[async_trait]
pub trait Checkpointer: Send + Sync {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<()>;
    async fn load_latest(&self, thread_id: &str) -> Result<Option<Checkpoint>>;
}

pub struct FileCheckpointer {
    dir: PathBuf,
}

impl FileCheckpointer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileCheckpointer { dir: dir.into() }
    }

    fn path_for(&self, thread_id: &str) -> PathBuf {
        self.dir.join(format!("{thread_id}.jsonl"))
    }
}

#[async_trait]
impl Checkpointer for FileCheckpointer {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| RuntimeError::CheckpointIo { thread_id: checkpoint.thread_id.clone(), source })?;

        let mut line = serde_json::to_string(checkpoint)
            .map_err(|e| RuntimeError::CheckpointCorrupt { thread_id: checkpoint.thread_id.clone(), message: e.to_string() })?;
        line.push('\n');

        let path = self.path_for(&checkpoint.thread_id);
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|source| RuntimeError::CheckpointIo { thread_id: checkpoint.thread_id.clone(), source })?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|source| RuntimeError::CheckpointIo { thread_id: checkpoint.thread_id.clone(), source })?;
        file.flush()
            .await
            .map_err(|source| RuntimeError::CheckpointIo { thread_id: checkpoint.thread_id.clone(), source })?;
        Ok(())
    }

    async fn load_latest(&self, thread_id: &str) -> Result<Option<Checkpoint>> {
        let path = self.path_for(thread_id);
        if !path.exists() {
            return Ok(None);
        }
        load_latest_from_file(&path, thread_id).await
    }
}

/// Scans backward from EOF in `CHUNK_SIZE` chunks for the last complete,
/// parseable line, skipping any corrupted or partial tail (spec: "corrupted tail
/// lines cause the read to fall back to the previous complete line").
async fn load_latest_from_file(path: &Path, thread_id: &str) -> Result<Option<Checkpoint>> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|source| RuntimeError::CheckpointIo { thread_id: thread_id.to_string(), source })?;
    let len = file
        .metadata()
        .await
        .map_err(|source| RuntimeError::CheckpointIo { thread_id: thread_id.to_string(), source })?
        .len();

    if len == 0 {
        return Ok(None);
    }

    let mut pos = len;
    let mut buffer = String::new();

    while pos > 0 {
        let read_size = CHUNK_SIZE.min(pos);
        pos -= read_size;

        file.seek(SeekFrom::Start(pos))
            .await
            .map_err(|source| RuntimeError::CheckpointIo { thread_id: thread_id.to_string(), source })?;
        let mut chunk = vec![0u8; read_size as usize];
        file.read_exact(&mut chunk)
            .await
            .map_err(|source| RuntimeError::CheckpointIo { thread_id: thread_id.to_string(), source })?;

        let chunk_text = String::from_utf8_lossy(&chunk);
        buffer = format!("{chunk_text}{buffer}");

        let lines: Vec<&str> = buffer.lines().collect();
        // The first line in `buffer` may be a fragment of a longer line that
        // started further back; only lines after it are guaranteed complete,
        // unless we've reached the start of the file.
        let complete_lines: &[&str] = if pos == 0 { &lines[..] } else if lines.len() > 1 { &lines[1..] } else { &[] };

        for line in complete_lines.iter().rev() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Ok(checkpoint) = serde_json::from_str::<Checkpoint>(trimmed) {
                return Ok(Some(checkpoint));
            }
            tracing::warn!(thread_id, line = trimmed, "skipping corrupt checkpoint line");
        }
    }

    Ok(None)
}

/// In-memory test double, exported from the production crate rather than kept
/// `#[cfg(test)]`-only so downstream crates can unit-test against it too
/// (teacher idiom: `aura-core/src/effects/testing.rs`).
pub mod testing {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    pub struct InMemoryCheckpointer {
        threads: Mutex<HashMap<String, Vec<Checkpoint>>>,
    }

    impl InMemoryCheckpointer {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl Checkpointer for InMemoryCheckpointer {
        async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
            self.threads.lock().entry(checkpoint.thread_id.clone()).or_default().push(checkpoint.clone());
            Ok(())
        }

        async fn load_latest(&self, thread_id: &str) -> Result<Option<Checkpoint>> {
            Ok(self.threads.lock().get(thread_id).and_then(|v| v.last().cloned()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::InMemoryCheckpointer;
    use super::*;

    fn sample(thread_id: &str, step: u64) -> Checkpoint {
        Checkpoint {
            thread_id: thread_id.to_string(),
            step,
            timestamp: Utc::now(),
            state_dump: HashMap::new(),
            tree_state: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn in_memory_round_trips_latest() {
        let cp = InMemoryCheckpointer::new();
        cp.save(&sample("t1", 1)).await.unwrap();
        cp.save(&sample("t1", 2)).await.unwrap();
        let latest = cp.load_latest("t1").await.unwrap().unwrap();
        assert_eq!(latest.step, 2);
    }

    #[tokio::test]
    async fn file_checkpointer_round_trips_across_many_records() {
        let dir = tempfile::tempdir().unwrap();
        let cp = FileCheckpointer::new(dir.path());
        for step in 0..500 {
            cp.save(&sample("t1", step)).await.unwrap();
        }
        let latest = cp.load_latest("t1").await.unwrap().unwrap();
        assert_eq!(latest.step, 499);
    }

    #[tokio::test]
    async fn missing_thread_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let cp = FileCheckpointer::new(dir.path());
        assert!(cp.load_latest("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_tail_falls_back_to_previous_line() {
        let dir = tempfile::tempdir().unwrap();
        let cp = FileCheckpointer::new(dir.path());
        cp.save(&sample("t1", 1)).await.unwrap();

        let path = dir.path().join("t1.jsonl");
        let mut file = tokio::fs::OpenOptions::new().append(true).open(&path).await.unwrap();
        file.write_all(b"{not valid json\n").await.unwrap();

        let latest = cp.load_latest("t1").await.unwrap().unwrap();
        assert_eq!(latest.step, 1);
    }
}
