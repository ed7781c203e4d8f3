//! Local, append-only stream file.
//!
//! Each write becomes one line `{"partitionKey": "...", "data": {...}}`. The
//! sequence number in the returned [`Ack`] counts lines written by this
//! process, starting at 1.
//!
//! # Torn lines
//!
//! A line is written with one `write_all`. If that fails partway, the file is
//! truncated back to its length before the write, so the next record starts
//! on a clean line. A crash between the partial write and the truncation can
//! still leave a fragment; [`FileSink::open`] seals such a fragment with a
//! newline so it costs one unreadable line rather than the next record too.

use crate::error::PublishError;
use crate::publish::{Ack, StreamSink};
use serde_json::{json, Value};
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{error, warn};

#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    file: Mutex<File>,
    written: AtomicU64,
}

impl FileSink {
    /// Open (creating if needed) `path` for appending.
    ///
    /// # Arguments
    ///
    /// * `path` - The stream file; missing parent directories are created
    ///
    /// # Returns
    ///
    /// A sink positioned at the end of the file. If the file does not end in
    /// a newline, one is appended first.
    pub async fn open(path: &Path) -> Result<Self, PublishError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)
            .await?;

        if !ends_with_newline(&mut file).await? {
            warn!(path = %path.display(), "Stream file ends mid-line; sealing it");
            file.write_all(b"\n").await?;
            file.flush().await?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            written: AtomicU64::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StreamSink for FileSink {
    async fn put(&self, partition_key: &str, payload: Vec<u8>) -> Result<Ack, PublishError> {
        let data: Value = serde_json::from_slice(&payload)?;
        let mut line = serde_json::to_vec(&json!({
            "partitionKey": partition_key,
            "data": data,
        }))?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        append_line(&mut *file, &line).await?;
        let seq = self.written.fetch_add(1, Ordering::SeqCst) + 1;

        Ok(Ack {
            partition_key: partition_key.to_string(),
            shard_id: None,
            sequence_number: Some(seq.to_string()),
        })
    }
}

/// `true` for an empty file or one whose last byte is `\n`.
async fn ends_with_newline(file: &mut File) -> io::Result<bool> {
    let len = file.metadata().await?.len();
    if len == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::Start(len - 1)).await?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last).await?;
    Ok(last[0] == b'\n')
}

/// File operations [`append_line`] needs besides writing.
trait Truncate {
    async fn len(&self) -> io::Result<u64>;
    async fn truncate_to(&self, len: u64) -> io::Result<()>;
}

impl Truncate for File {
    async fn len(&self) -> io::Result<u64> {
        Ok(self.metadata().await?.len())
    }

    async fn truncate_to(&self, len: u64) -> io::Result<()> {
        self.set_len(len).await
    }
}

/// Append `line`, cutting the file back to its old length if the write fails.
async fn append_line<W>(file: &mut W, line: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Truncate + Unpin,
{
    let start = file.len().await?;
    let res = match file.write_all(line).await {
        Ok(()) => file.flush().await,
        Err(e) => Err(e),
    };
    if let Err(e) = res {
        if let Err(trunc) = file.truncate_to(start).await {
            error!(error = %trunc, len = start, "Could not remove partial line from stream file");
        }
        return Err(e);
    }
    Ok(())
}
