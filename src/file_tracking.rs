//! Disk scanning for the reconciliation engine
//!
//! [`FileTracker`] walks a tracked root once and produces a [`DiskSnapshot`]
//! of every regular file in it: relative path, size and modification time.
//! Contents are not read here; hashing happens in the worker pool.
//!
//! ## Skipped Entries
//!
//! - **Directories** (at any depth, by exact name): operating system
//!   bookkeeping folders such as `$RECYCLE.BIN` or `.Spotlight-V100`, and the
//!   store's own metadata directory
//! - **Files** (by name, glob): Office lock files `~$*`, AppleDouble files
//!   `._*` and `.DS_Store`
//! - **Symbolic links** are neither followed nor recorded
//! - **Non UTF-8 paths** cannot be written to the journal and are skipped with
//!   a warning
//!
//! Any other walk error (unreadable directory, metadata failure) aborts the
//! scan, because an incomplete snapshot would make missing files look deleted.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use crate::file_tracking::FileTracker;
//! use std::path::PathBuf;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let snapshot = FileTracker::new(PathBuf::from("./photos"))?.scan()?;
//! println!("{} files, {} bytes", snapshot.len(), snapshot.total_bytes());
//! # Ok(())
//! # }
//! ```

use crate::error::{IntegrityError, Result};
use crate::layout::METADATA_DIR_NAME;
use crate::types::{DiskFile, DiskSnapshot};
use crate::utils::relative_path_string;
use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};
use walkdir::{DirEntry, WalkDir};

/// Directory names never descended into
pub const IGNORED_DIRS: &[&str] = &[
    "$RECYCLE.BIN",
    "System Volume Information",
    ".Spotlight-V100",
    ".fseventsd",
    ".Trashes",
    ".TemporaryItems",
    METADATA_DIR_NAME,
];

/// File name patterns never recorded
pub const IGNORED_FILE_PATTERNS: &[&str] = &["~$*", "._*", ".DS_Store"];

/// Scanner for one tracked root
#[derive(Debug)]
pub struct FileTracker {
    /// Root directory to scan
    root_path: PathBuf,
    /// Compiled [`IGNORED_FILE_PATTERNS`]
    ignored_files: GlobSet,
}

impl FileTracker {
    /// Create a scanner for `root_path`
    ///
    /// # Errors
    ///
    /// - [`IntegrityError::InvalidPattern`] if an ignore pattern fails to
    ///   compile
    pub fn new(root_path: PathBuf) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in IGNORED_FILE_PATTERNS {
            let glob = Glob::new(pattern)
                .map_err(|e| IntegrityError::InvalidPattern(format!("{}: {}", pattern, e)))?;
            builder.add(glob);
        }
        let ignored_files = builder
            .build()
            .map_err(|e| IntegrityError::InvalidPattern(e.to_string()))?;
        Ok(Self {
            root_path,
            ignored_files,
        })
    }

    /// Root this tracker scans
    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    /// Walk the root and collect every tracked file
    ///
    /// # Errors
    ///
    /// - [`IntegrityError::WalkDir`] if a directory or a file's metadata
    ///   cannot be read
    pub fn scan(&self) -> Result<DiskSnapshot> {
        let mut snapshot = DiskSnapshot::new();
        let walker = WalkDir::new(&self.root_path)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| !is_ignored_dir(entry));

        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                if entry.file_type().is_symlink() {
                    trace!("Skipping symlink {:?}", entry.path());
                }
                continue;
            }
            if self.is_ignored_file(&entry) {
                trace!("Skipping ignored file {:?}", entry.path());
                continue;
            }

            let relative_path = match relative_path_string(entry.path(), &self.root_path) {
                Some(relative) => relative,
                None => {
                    warn!("Skipping path not representable as UTF-8: {:?}", entry.path());
                    continue;
                }
            };
            let metadata = entry.metadata()?;
            let modified: DateTime<Utc> = metadata.modified()?.into();

            snapshot.insert(DiskFile {
                absolute_path: entry.path().to_path_buf(),
                relative_path,
                size: metadata.len(),
                modified,
            });
        }

        debug!(
            "Scanned {:?}: {} files, {} bytes",
            self.root_path,
            snapshot.len(),
            snapshot.total_bytes()
        );
        Ok(snapshot)
    }

    fn is_ignored_file(&self, entry: &DirEntry) -> bool {
        self.ignored_files.is_match(Path::new(entry.file_name()))
    }
}

fn is_ignored_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(|name| IGNORED_DIRS.contains(&name))
            .unwrap_or(false)
}
