//! file.rs: append-only JSON Lines store, one file per collection.
//!
//! Layout: `<dir>/<collection name>.jsonl`, one `HistoryRecord` document per
//! line. Writers are serialized through an async mutex so concurrent appends
//! never interleave. Unreadable lines are skipped on read.

use std::io::ErrorKind;
use std::io::SeekFrom;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;

use super::{
    record_append_outcome, select_recent, Collection, HistoryRecord, HistoryStore, Order,
    StoreError,
};
use crate::scoring::ScoreResult;

#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
    seq: AtomicU64,
}

impl FileStore {
    /// Create the directory if needed. An unusable directory is reported as
    /// `StoreUnavailable`.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await.map_err(|e| {
            StoreError::StoreUnavailable(format!("create {}: {e}", dir.display()))
        })?;
        tracing::debug!(dir = %dir.display(), "file history store opened");
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
            seq: AtomicU64::new(0),
        })
    }

    pub fn path_for(&self, collection: Collection) -> PathBuf {
        self.dir.join(format!("{}.jsonl", collection.name()))
    }

    async fn append_locked(
        &self,
        result: &ScoreResult,
        is_simulated: bool,
    ) -> Result<HistoryRecord, StoreError> {
        let _guard = self.write_lock.lock().await;

        let ts = Utc::now();
        let id = format!(
            "{}-{}",
            ts.timestamp_micros(),
            self.seq.fetch_add(1, Ordering::Relaxed)
        );
        let record = HistoryRecord::build(result, is_simulated, id, ts)?;

        let doc = serde_json::to_vec(&record)
            .map_err(|e| StoreError::WriteRejected(format!("serialize record: {e}")))?;

        let path = self.path_for(record.collection);
        let unavailable =
            |e: std::io::Error| StoreError::StoreUnavailable(format!("{}: {e}", path.display()));
        let mut f = OpenOptions::new()
            .read(true)
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(unavailable)?;

        // A torn earlier write may have left no trailing newline; start a
        // fresh line so this record is not glued onto the broken one.
        let mut line = Vec::with_capacity(doc.len() + 2);
        if !ends_with_newline(&mut f).await.map_err(unavailable)? {
            line.push(b'\n');
        }
        line.extend_from_slice(&doc);
        line.push(b'\n');
        // Whole line in one write; a partial line would be skipped on read.
        f.write_all(&line).await.map_err(unavailable)?;
        f.flush().await.map_err(unavailable)?;

        Ok(record)
    }
}

/// `true` for an empty file or one whose last byte is `\n`.
async fn ends_with_newline(f: &mut fs::File) -> std::io::Result<bool> {
    let len = f.metadata().await?.len();
    if len == 0 {
        return Ok(true);
    }
    f.seek(SeekFrom::Start(len - 1)).await?;
    let mut last = [0u8; 1];
    f.read_exact(&mut last).await?;
    Ok(last[0] == b'\n')
}

#[async_trait::async_trait]
impl HistoryStore for FileStore {
    async fn append(
        &self,
        result: &ScoreResult,
        is_simulated: bool,
    ) -> Result<HistoryRecord, StoreError> {
        let res = self.append_locked(result, is_simulated).await;
        record_append_outcome(self.name(), &res);
        res
    }

    async fn list_recent(
        &self,
        collection: Collection,
        limit: usize,
        order: Order,
    ) -> Result<Vec<HistoryRecord>, StoreError> {
        let path = self.path_for(collection);
        let content = match fs::read_to_string(&path).await {
            Ok(s) => s,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StoreError::StoreUnavailable(format!(
                    "{}: {e}",
                    path.display()
                )))
            }
        };

        let mut records = Vec::new();
        for (lineno, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<HistoryRecord>(line) {
                Ok(r) => records.push(r),
                Err(e) => tracing::warn!(
                    path = %path.display(),
                    line = lineno + 1,
                    "skipping unreadable history line: {e}"
                ),
            }
        }
        Ok(select_recent(records, limit, order))
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
