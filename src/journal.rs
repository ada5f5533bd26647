//! Append-only integrity journal
//!
//! The journal is a plain text file holding one [`FileRecord`] per line (see
//! [`crate::record`] for the format). During a run new records are only ever
//! appended; superseded and deleted entries are removed afterwards by
//! [`Journal::compact`].
//!
//! ## Locking
//!
//! Each [`Journal`] owns a mutex scoped to its file. `append`, `load`,
//! `compact` and `snapshot` all take it, so an append can never interleave
//! with another append or with a compaction rewriting the same file. Two
//! journals of different roots (base and external directory during a
//! containment check) never contend.
//!
//! ## Buffered appends
//!
//! [`RecordBuffer`] collects records in memory and appends them in one write
//! once the file bytes they describe exceed a threshold, which keeps memory
//! bounded on very large trees without a journal write per file.

use crate::error::{IntegrityError, Result};
use crate::layout;
use crate::record::{self, ConsolidatedState, FileRecord};
use parking_lot::Mutex;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tempfile::NamedTempFile;
use tracing::{debug, trace};

/// Default flush threshold of [`RecordBuffer`]: 1 GiB of hashed file content
pub const DEFAULT_FLUSH_THRESHOLD: u64 = 1024 * 1024 * 1024;

/// Raw journal bytes captured under the journal lock
#[derive(Debug, Clone)]
pub struct JournalSnapshot {
    /// File content
    pub content: Vec<u8>,
    /// Modification time of the journal file
    pub modified: SystemTime,
}

/// The journal of one tracked root
#[derive(Debug)]
pub struct Journal {
    path: PathBuf,
    lock: Mutex<()>,
}

impl Journal {
    /// Journal of the tracked directory `root`
    ///
    /// Nothing is touched on disk until the first append.
    pub fn new(root: &Path) -> Self {
        Self::at(layout::journal_path(root))
    }

    /// Journal backed by an explicit file
    pub fn at(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append records at the end of the journal
    ///
    /// The batch is serialized before the file is opened, so a serialization
    /// failure leaves the journal untouched.
    pub fn append(&self, records: &[FileRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let content = record::encode_records(records)?;

        let _guard = self.lock.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(content.as_bytes())?;
        file.flush()?;
        debug!("Appended {} records to {:?}", records.len(), self.path);
        Ok(())
    }

    /// Load every record in file order
    ///
    /// A missing or empty journal loads as an empty sequence.
    pub fn load(&self) -> Result<Vec<FileRecord>> {
        let _guard = self.lock.lock();
        self.load_unlocked()
    }

    /// Load and consolidate the journal
    pub fn load_consolidated(&self) -> Result<ConsolidatedState> {
        Ok(ConsolidatedState::from_records(self.load()?))
    }

    /// Rewrite the journal so it holds exactly its consolidated state
    ///
    /// The file is only replaced when the compacted content differs from the
    /// current content, leaving its modification time alone otherwise.
    /// Returns whether the file was rewritten.
    pub fn compact(&self) -> Result<bool> {
        let _guard = self.lock.lock();
        let current = match self.read_unlocked()? {
            Some((content, _)) => content,
            None => return Ok(false),
        };
        let text = std::str::from_utf8(&current)
            .map_err(|e| IntegrityError::MalformedRecord {
                line: 0,
                reason: format!("journal is not UTF-8: {}", e),
            })?;
        let records = record::decode_records(text)?;
        let before = records.len();
        let compacted = ConsolidatedState::from_records(records).into_sorted();
        let content = record::encode_records(&compacted)?;

        if content.as_bytes() == current.as_slice() {
            debug!("Journal {:?} already compact ({} records)", self.path, before);
            return Ok(false);
        }

        let dir = self
            .path
            .parent()
            .ok_or_else(|| IntegrityError::internal(format!("journal {:?} has no parent", self.path)))?;
        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(content.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| IntegrityError::Io(e.error))?;

        debug!(
            "Compacted journal {:?}: {} -> {} records",
            self.path,
            before,
            compacted.len()
        );
        Ok(true)
    }

    /// Raw content and modification time, `None` if the journal does not exist
    pub fn snapshot(&self) -> Result<Option<JournalSnapshot>> {
        let _guard = self.lock.lock();
        Ok(self
            .read_unlocked()?
            .map(|(content, modified)| JournalSnapshot { content, modified }))
    }

    fn load_unlocked(&self) -> Result<Vec<FileRecord>> {
        let content = match self.read_unlocked()? {
            Some((content, _)) => content,
            None => return Ok(Vec::new()),
        };
        if content.is_empty() {
            return Ok(Vec::new());
        }
        let text = String::from_utf8(content).map_err(|e| IntegrityError::MalformedRecord {
            line: 0,
            reason: format!("journal is not UTF-8: {}", e),
        })?;
        let records = record::decode_records(&text)?;
        trace!("Loaded {} records from {:?}", records.len(), self.path);
        Ok(records)
    }

    fn read_unlocked(&self) -> Result<Option<(Vec<u8>, SystemTime)>> {
        let modified = match fs::metadata(&self.path) {
            Ok(meta) => meta.modified()?,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let content = fs::read(&self.path)?;
        Ok(Some((content, modified)))
    }
}

/// In-memory batch of pending journal appends
///
/// Owned by a single writer (the aggregator of a run), so it needs no
/// locking of its own.
#[derive(Debug)]
pub struct RecordBuffer<'a> {
    journal: &'a Journal,
    records: Vec<FileRecord>,
    buffered_bytes: u64,
    threshold: u64,
}

impl<'a> RecordBuffer<'a> {
    /// Buffer in front of `journal` flushing above `threshold` bytes
    pub fn new(journal: &'a Journal, threshold: u64) -> Self {
        Self {
            journal,
            records: Vec::new(),
            buffered_bytes: 0,
            threshold,
        }
    }

    /// Queue a record, flushing when the threshold is exceeded
    ///
    /// Returns whether a flush happened.
    pub fn push(&mut self, record: FileRecord) -> Result<bool> {
        self.buffered_bytes = self.buffered_bytes.saturating_add(record.size);
        self.records.push(record);
        if self.buffered_bytes > self.threshold {
            return self.flush();
        }
        Ok(false)
    }

    /// Append all queued records to the journal
    ///
    /// Returns whether anything was written.
    pub fn flush(&mut self) -> Result<bool> {
        if self.records.is_empty() {
            return Ok(false);
        }
        self.journal.append(&self.records)?;
        self.records.clear();
        self.buffered_bytes = 0;
        Ok(true)
    }

    /// Number of queued records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
