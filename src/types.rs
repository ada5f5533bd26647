//! Core data types shared across the engine
//!
//! ## Overview
//!
//! - **Configuration**: [`Options`] - what a single run reports and whether it
//!   backs up the journal first
//! - **Disk state**: [`DiskFile`], [`DiskSnapshot`] - the ephemeral result of
//!   one directory scan, never persisted
//!
//! ## Examples
//!
//! ```rust
//! use fileintegrity::types::Options;
//!
//! // Log everything to the log file, nothing to the terminal
//! let options = Options {
//!     log_to_console: false,
//!     show_progress: false,
//!     ..Options::default()
//! };
//! assert!(options.log_to_file);
//! ```

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::btree_map::{self, BTreeMap};
use std::fs;
use std::path::{Path, PathBuf};

/// Per-run configuration
///
/// Every field defaults to the value of [`Options::default`] when missing
/// from a configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Print log entries that are visible on the console
    pub log_to_console: bool,
    /// Write log entries to the per-run log file
    pub log_to_file: bool,
    /// Zip the journal before an upsert touches it
    pub backup_before_run: bool,
    /// Show a byte progress bar while hashing
    pub show_progress: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            log_to_console: true,
            log_to_file: true,
            backup_before_run: false,
            show_progress: true,
        }
    }
}

impl Options {
    /// Console and file logging plus backup, without a progress bar
    pub fn enabled() -> Self {
        Self {
            log_to_console: true,
            log_to_file: true,
            backup_before_run: true,
            show_progress: false,
        }
    }

    /// No output and no backup
    pub fn disabled() -> Self {
        Self {
            log_to_console: false,
            log_to_file: false,
            backup_before_run: false,
            show_progress: false,
        }
    }

    /// Options used by the command line
    ///
    /// The log file is always written; console output and the progress bar
    /// are dropped in quiet mode.
    pub fn quiet(quiet: bool) -> Self {
        Self {
            log_to_console: !quiet,
            log_to_file: true,
            backup_before_run: false,
            show_progress: !quiet,
        }
    }

    /// Load options from a JSON file
    ///
    /// # Errors
    ///
    /// - [`crate::IntegrityError::Io`] if the file cannot be read
    /// - [`crate::IntegrityError::Json`] if it is not a valid options object
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Same options with backup forced on
    pub fn with_backup(mut self) -> Self {
        self.backup_before_run = true;
        self
    }
}

/// A regular file found on disk during a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskFile {
    /// Absolute (or root-joined) path used to open the file
    pub absolute_path: PathBuf,
    /// Path relative to the scanned root, `/` separated
    pub relative_path: String,
    /// Size in bytes
    pub size: u64,
    /// Last modification time
    pub modified: DateTime<Utc>,
}

/// All files found by one scan, keyed by relative path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiskSnapshot {
    files: BTreeMap<String, DiskFile>,
}

impl DiskSnapshot {
    /// Empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file, replacing any file with the same relative path
    pub fn insert(&mut self, file: DiskFile) {
        self.files.insert(file.relative_path.clone(), file);
    }

    /// File at a relative path
    pub fn get(&self, relative_path: &str) -> Option<&DiskFile> {
        self.files.get(relative_path)
    }

    /// Whether a file exists at a relative path
    pub fn contains(&self, relative_path: &str) -> bool {
        self.files.contains_key(relative_path)
    }

    /// Number of files
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the scan found no file
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Sum of all file sizes
    pub fn total_bytes(&self) -> u64 {
        self.files.values().map(|f| f.size).sum()
    }

    /// Files in relative path order
    pub fn iter(&self) -> btree_map::Values<'_, String, DiskFile> {
        self.files.values()
    }
}

impl FromIterator<DiskFile> for DiskSnapshot {
    fn from_iter<I: IntoIterator<Item = DiskFile>>(iter: I) -> Self {
        let mut snapshot = DiskSnapshot::new();
        for file in iter {
            snapshot.insert(file);
        }
        snapshot
    }
}

impl<'a> IntoIterator for &'a DiskSnapshot {
    type Item = &'a DiskFile;
    type IntoIter = btree_map::Values<'a, String, DiskFile>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.values()
    }
}
