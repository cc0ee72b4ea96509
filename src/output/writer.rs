//! Incremental sinks
//!
//! A sink receives accepted records one at a time, buffers them, and makes
//! them durable on `flush`. Sinks never deduplicate.

use crate::error::Result;
use csv::WriterBuilder;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const TAIL_CHUNK: u64 = 8 * 1024;

/// Append-only destination for accepted records
pub trait RecordSink<R> {
    /// Buffer one record
    fn append(&mut self, record: &R) -> Result<()>;

    /// Make every buffered record durable
    fn flush(&mut self) -> Result<()>;

    /// Records appended since the last flush
    fn pending(&self) -> usize;
}

// ============================================================================
// CSV sink
// ============================================================================

/// Append-mode CSV file sink
pub struct CsvSink<R> {
    path: PathBuf,
    writer: csv::Writer<File>,
    pending: usize,
    flushed: u64,
    _record: PhantomData<fn(&R)>,
}

impl<R: Serialize> CsvSink<R> {
    /// Open `path` for appending, creating it (and its directory) if needed.
    ///
    /// The header row is written only when the file is new or empty, so
    /// reopening an existing output never repeats it. A partial last row
    /// left by an interrupted write is cut off before appending.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        truncate_torn_tail(&path)?;

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let needs_header = file.metadata()?.len() == 0;
        debug!(
            "Opened output {} (header: {needs_header})",
            path.display()
        );

        let writer = WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);

        Ok(Self {
            path,
            writer,
            pending: 0,
            flushed: 0,
            _record: PhantomData,
        })
    }

    /// Get the output path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records made durable by this sink so far
    pub fn flushed(&self) -> u64 {
        self.flushed
    }
}

/// Cut an existing file back to its last newline.
///
/// Rows are never written with embedded newlines, so bytes after the last
/// `\n` can only be a row whose write was interrupted.
fn truncate_torn_tail(path: &Path) -> Result<()> {
    let mut file = match OpenOptions::new().read(true).write(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    let len = file.metadata()?.len();
    let mut end = len;
    let mut buf = vec![0u8; TAIL_CHUNK as usize];
    let keep = loop {
        if end == 0 {
            break 0;
        }
        let start = end.saturating_sub(TAIL_CHUNK);
        let chunk = &mut buf[..(end - start) as usize];
        file.seek(SeekFrom::Start(start))?;
        file.read_exact(chunk)?;
        if let Some(pos) = chunk.iter().rposition(|b| *b == b'\n') {
            break start + pos as u64 + 1;
        }
        end = start;
    };

    if keep < len {
        warn!(
            "Dropping {} bytes of partial row at the end of {}",
            len - keep,
            path.display()
        );
        file.set_len(keep)?;
        file.sync_data()?;
    }
    Ok(())
}

impl<R: Serialize> RecordSink<R> for CsvSink<R> {
    fn append(&mut self, record: &R) -> Result<()> {
        self.writer.serialize(record)?;
        self.pending += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        self.flushed += self.pending as u64;
        self.pending = 0;
        Ok(())
    }

    fn pending(&self) -> usize {
        self.pending
    }
}

impl<R> std::fmt::Debug for CsvSink<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsvSink")
            .field("path", &self.path)
            .field("pending", &self.pending)
            .field("flushed", &self.flushed)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Memory sink
// ============================================================================

/// In-memory sink; flushed records move from the buffer to `records`
#[derive(Debug, Clone)]
pub struct MemorySink<R> {
    records: Vec<R>,
    buffer: Vec<R>,
    flushes: usize,
}

impl<R> Default for MemorySink<R> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            buffer: Vec::new(),
            flushes: 0,
        }
    }
}

impl<R> MemorySink<R> {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Durable records
    pub fn records(&self) -> &[R] {
        &self.records
    }

    /// Number of flushes so far
    pub fn flushes(&self) -> usize {
        self.flushes
    }

    /// Take the durable records
    pub fn into_records(self) -> Vec<R> {
        self.records
    }
}

impl<R: Clone> RecordSink<R> for MemorySink<R> {
    fn append(&mut self, record: &R) -> Result<()> {
        self.buffer.push(record.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.records.append(&mut self.buffer);
        self.flushes += 1;
        Ok(())
    }

    fn pending(&self) -> usize {
        self.buffer.len()
    }
}
