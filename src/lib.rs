//! # fileintegrity - Integrity tracking for directory trees
//!
//! Records a SHA-256 fingerprint of every file of a directory in an
//! append-only journal, and uses that journal to detect corruption,
//! duplicated content and content already present in another directory.
//!
//! ## Overview
//!
//! fileintegrity lets you:
//! - Bring a directory's journal up to date with its files ([`upsert()`])
//! - Re-hash every recorded file and report what changed ([`verify()`])
//! - Report files with identical content ([`find_duplicates()`])
//! - Report files of an external directory whose content already exists in a
//!   tracked directory, and optionally delete them ([`find_contained()`])
//!
//! ## Architecture
//!
//! - **Journal**: one text line per record under the hidden `.integrity`
//!   directory of the tracked root. Records are only appended during a run
//!   and the journal is compacted to one line per live file afterwards
//! - **Worker pool**: hashing runs on a fixed set of threads fed through
//!   bounded queues, with a single aggregator consuming results
//! - **Incremental upsert**: files whose size and modification time match
//!   their record are not hashed again
//! - **Run logs**: every run writes a timestamped log file next to the
//!   journal, ending with a summary block
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fileintegrity::Options;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let root = Path::new("./photos");
//!
//! // Record every file
//! let summary = fileintegrity::upsert(root, &Options::default())?;
//! println!("{} new files", summary.new_files);
//!
//! // Later: check nothing rotted
//! let summary = fileintegrity::verify(root, &Options::default())?;
//! if !summary.is_valid() {
//!     println!("{} files are damaged or missing", summary.invalid_files);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom Configuration
//!
//! ```rust,no_run
//! use fileintegrity::{IntegrityStoreBuilder, NoiseFilter, Options};
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = IntegrityStoreBuilder::new()
//!     .parallel_workers(4)
//!     .flush_threshold_bytes(256 * 1024 * 1024)
//!     .noise_filter(NoiseFilter::default())
//!     .build(PathBuf::from("./archive"))?;
//!
//! store.upsert(&Options::enabled())?;
//! let duplicates = store.find_duplicates(&Options::quiet(true))?;
//! println!("{} duplicate files", duplicates.duplicate_files);
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Every operation returns `Result<T, IntegrityError>`. An error means the
//! run could not be trusted (journal unreadable, directory missing, I/O
//! failure while writing) and was aborted. Problems with individual files
//! are not errors: they are logged and counted in the run's summary.
//!
//! ## Module Organization
//!
//! - [`record`]: journal records, line format and consolidation
//! - [`journal`]: append, load and compaction of the journal file
//! - [`pool`]: worker pool and hashing payloads
//! - [`upsert`](mod@upsert): reconciliation of disk and journal
//! - [`fingerprint`]: fingerprint index and duplicate/containment analysis
//! - [`report`] and [`summary`]: run logs and summaries
//! - [`types`]: run options and disk snapshots
//! - [`error`]: error types

// Public API modules
pub mod backup;
pub mod error;
pub mod file_tracking;
pub mod fingerprint;
pub mod journal;
pub mod layout;
pub mod pool;
pub mod record;
pub mod report;
pub mod store;
pub mod summary;
pub mod types;
pub mod upsert;
pub mod utils;

// Internal modules
mod check;
mod verification;

// Re-export main types for convenience
pub use error::{IntegrityError, Result};
pub use fingerprint::{FingerprintIndex, FingerprintKey, NoiseFilter};
pub use journal::Journal;
pub use record::{ConsolidatedState, FileRecord, TOMBSTONE_HASH};
pub use store::{IntegrityStore, IntegrityStoreBuilder};
pub use summary::{ContainedSummary, DuplicateSummary, UpsertSummary, VerifySummary};
pub use types::{DiskFile, DiskSnapshot, Options};

use std::path::Path;

/// Bring the journal of `path` up to date with its files
///
/// # Errors
///
/// - [`IntegrityError::DirectoryNotFound`] / [`IntegrityError::NotADirectory`]
/// - journal, log, backup or scan I/O errors
pub fn upsert(path: &Path, options: &Options) -> Result<UpsertSummary> {
    IntegrityStore::open(path.to_path_buf())?.upsert(options)
}

/// Re-check every file recorded for `path`
///
/// Check [`VerifySummary::is_valid`] to learn whether files were damaged.
pub fn verify(path: &Path, options: &Options) -> Result<VerifySummary> {
    IntegrityStore::open(path.to_path_buf())?.verify(options)
}

/// Report files with identical content within `path`
pub fn find_duplicates(path: &Path, options: &Options) -> Result<DuplicateSummary> {
    IntegrityStore::open(path.to_path_buf())?.find_duplicates(options)
}

/// Report files of `external` whose content already exists in `base`
///
/// With `fix` set, those files and duplicates among the rest are deleted from
/// `external`. Nothing inside `base` is ever deleted.
pub fn find_contained(
    base: &Path,
    external: &Path,
    fix: bool,
    options: &Options,
) -> Result<ContainedSummary> {
    IntegrityStore::open(base.to_path_buf())?.find_contained_in(
        external.to_path_buf(),
        fix,
        options,
    )
}
