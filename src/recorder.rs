//! # Stage: Metrics Recording
//!
//! ## Responsibility
//! Append one [`InferenceRecord`] per request to an append-only CSV log,
//! creating the log with a header row if it does not exist yet.
//!
//! ## Guarantees
//! - The header is written once, when the file is empty, and never rewritten
//! - Every row has exactly [`LOG_COLUMNS`]`.len()` cells, in header order
//! - Appends are serialized behind one async mutex: concurrent requests
//!   never interleave partial rows
//! - A row is fully encoded in memory before it is written with a single
//!   `write_all`, then flushed and synced before `append` returns `Ok`
//! - A failed append truncates the file back to its previous length
//! - A torn trailing line left by an earlier crash is cut off before the
//!   next write, so it never merges with a good row
//! - A log whose header differs from [`LOG_COLUMNS`] is refused, not
//!   appended to
//! - Failures are returned as [`RouterError::LogWrite`], never swallowed
//!
//! ## NOT Responsible For
//! - Computing derived metrics (that belongs to `record`)
//! - Rotation or retention of old logs

use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::record::{InferenceRecord, LOG_COLUMNS};
use crate::RouterError;

/// Append-only CSV writer for inference records.
///
/// Cheap to share behind an `Arc`; all file access goes through an internal
/// mutex.
#[derive(Debug)]
pub struct MetricsRecorder {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl MetricsRecorder {
    /// Create a recorder for `path`. Nothing is touched on disk until
    /// [`ensure_log`](Self::ensure_log) or [`append`](Self::append).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the log with its header row if it is missing or empty.
    ///
    /// Idempotent. An existing file is left untouched apart from cutting
    /// off a torn trailing line.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::LogWrite`] if the file cannot be created,
    /// read, or written, or with an [`io::ErrorKind::InvalidData`] source if
    /// its header differs from [`LOG_COLUMNS`].
    pub async fn ensure_log(&self) -> Result<(), RouterError> {
        let _guard = self.write_lock.lock().await;
        let (_, wrote_header, _) = self.open_with_header().await.map_err(|e| self.err(e))?;
        if !wrote_header {
            self.check_existing_header().await.map_err(|e| self.err(e))?;
        }
        Ok(())
    }

    /// Append exactly one row for `record`.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::LogWrite`] if encoding, writing, flushing or
    /// syncing fails. On error the file is truncated back to its length
    /// before the write and the caller must treat the record as lost.
    pub async fn append(&self, record: &InferenceRecord) -> Result<(), RouterError> {
        let row = encode_row(record.csv_row()).map_err(|e| self.err(e))?;

        let _guard = self.write_lock.lock().await;
        let (mut file, _, prev_len) = self.open_with_header().await.map_err(|e| self.err(e))?;
        if let Err(e) = write_synced(&mut file, &row).await {
            if let Err(rollback) = file.set_len(prev_len).await {
                warn!(
                    path = %self.path.display(),
                    error = %rollback,
                    "could not truncate partial row"
                );
            }
            return Err(self.err(e));
        }

        debug!(
            path = %self.path.display(),
            model = %record.selected_model,
            bytes = row.len(),
            "appended inference record"
        );
        Ok(())
    }

    /// Open the log for appending, writing the header if the file is empty.
    ///
    /// A trailing line without its `\n` terminator is cut off first. Returns
    /// the file, whether a header was written, and the file length. Callers
    /// must hold `write_lock`.
    async fn open_with_header(&self) -> io::Result<(File, bool, u64)> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .await?;

        let len = file.metadata().await?.len();
        let intact = complete_lines_len(&mut file, len).await?;
        if intact < len {
            warn!(
                path = %self.path.display(),
                discarded_bytes = len - intact,
                "truncating torn trailing line"
            );
            file.set_len(intact).await?;
        }
        if intact > 0 {
            return Ok((file, false, intact));
        }

        let header = encode_row(LOG_COLUMNS)?;
        file.write_all(&header).await?;
        file.flush().await?;
        Ok((file, true, header.len() as u64))
    }

    async fn check_existing_header(&self) -> io::Result<()> {
        let file = File::open(&self.path).await?;
        let mut first_line = String::new();
        BufReader::new(file).read_line(&mut first_line).await?;

        let expected = String::from_utf8_lossy(&encode_row(LOG_COLUMNS)?).into_owned();
        if first_line.trim_end() != expected.trim_end() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "existing header {:?} does not match the {} log columns",
                    first_line.trim_end(),
                    LOG_COLUMNS.len()
                ),
            ));
        }
        Ok(())
    }

    fn err(&self, source: io::Error) -> RouterError {
        RouterError::LogWrite {
            path: self.path.clone(),
            source,
        }
    }
}

async fn write_synced(file: &mut File, bytes: &[u8]) -> io::Result<()> {
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_data().await
}

/// Length of `file` up to and including its last `\n`, scanning backwards
/// from `len`. Zero if there is no newline at all.
async fn complete_lines_len(file: &mut File, len: u64) -> io::Result<u64> {
    const CHUNK: u64 = 4096;
    let mut buf = vec![0u8; CHUNK as usize];
    let mut end = len;
    while end > 0 {
        let start = end.saturating_sub(CHUNK);
        let n = (end - start) as usize;
        file.seek(SeekFrom::Start(start)).await?;
        file.read_exact(&mut buf[..n]).await?;
        if let Some(pos) = buf[..n].iter().rposition(|&b| b == b'\n') {
            return Ok(start + pos as u64 + 1);
        }
        end = start;
    }
    Ok(0)
}

/// Encode one CSV row (with quoting) terminated by `\n`.
fn encode_row<I, T>(fields: I) -> io::Result<Vec<u8>>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(fields)?;
    writer
        .into_inner()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))
}
