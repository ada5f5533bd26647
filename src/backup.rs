//! Journal backups
//!
//! Before a run that rewrites the journal, the current journal can be copied
//! into a deflated zip archive next to it. The archive is named after the
//! journal's modification time, so backing up an unchanged journal twice
//! produces the same archive instead of a new one.

use crate::error::Result;
use crate::journal::Journal;
use crate::layout::{self, JOURNAL_FILE_NAME};
use chrono::{DateTime, Local};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Zip the journal of `root` into its metadata directory
///
/// Returns the archive path, or `None` when there is no journal yet.
///
/// # Errors
///
/// - [`crate::IntegrityError::Io`] if the journal cannot be read or the
///   archive cannot be created
/// - [`crate::IntegrityError::Zip`] if writing the archive fails
pub fn backup_journal(root: &Path, journal: &Journal) -> Result<Option<PathBuf>> {
    let snapshot = match journal.snapshot()? {
        Some(snapshot) => snapshot,
        None => {
            debug!("No journal in {:?}, skipping backup", root);
            return Ok(None);
        }
    };

    let modified: DateTime<Local> = snapshot.modified.into();
    let archive_path = layout::backup_file_path(root, &modified);

    let file = File::create(&archive_path)?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    writer.start_file(JOURNAL_FILE_NAME, options)?;
    writer.write_all(&snapshot.content)?;
    writer.finish()?;

    info!(
        "Backed up journal ({} bytes) to {:?}",
        snapshot.content.len(),
        archive_path
    );
    Ok(Some(archive_path))
}
