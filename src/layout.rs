//! On-disk layout of a tracked directory
//!
//! ```text
//! <root>/
//! └── .integrity/                           # hidden metadata directory
//!     ├── .integrity                        # the journal
//!     ├── 240517.093015.integrity.zip       # journal backups
//!     └── 240517.093015.upsert.log          # per-run log files
//! ```

use crate::error::{IntegrityError, Result};
use chrono::{DateTime, Local};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Name of the hidden metadata directory inside every tracked root
pub const METADATA_DIR_NAME: &str = ".integrity";

/// Name of the journal file inside the metadata directory
pub const JOURNAL_FILE_NAME: &str = ".integrity";

/// Timestamp format used in log lines, log file names and backup names
pub const TIME_FORMAT: &str = "%y%m%d.%H%M%S";

const LOG_EXTENSION: &str = "log";

/// Metadata directory of a tracked root
pub fn metadata_dir(root: &Path) -> PathBuf {
    root.join(METADATA_DIR_NAME)
}

/// Journal file of a tracked root
pub fn journal_path(root: &Path) -> PathBuf {
    metadata_dir(root).join(JOURNAL_FILE_NAME)
}

/// Format a timestamp the way log and backup names expect
pub fn format_time(ts: &DateTime<Local>) -> String {
    ts.format(TIME_FORMAT).to_string()
}

/// `<metadata dir>/<timestamp>.<category>.log`
pub fn log_file_path(root: &Path, started: &DateTime<Local>, category: &str) -> PathBuf {
    metadata_dir(root).join(format!(
        "{}.{}.{}",
        format_time(started),
        category,
        LOG_EXTENSION
    ))
}

/// `<metadata dir>/<journal mtime><journal name>.zip`
pub fn backup_file_path(root: &Path, journal_modified: &DateTime<Local>) -> PathBuf {
    metadata_dir(root).join(format!(
        "{}{}.zip",
        format_time(journal_modified),
        JOURNAL_FILE_NAME
    ))
}

/// Fail unless `path` exists and is a directory
pub fn assert_dir(path: &Path) -> Result<()> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(IntegrityError::NotADirectory(path.to_path_buf())),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            Err(IntegrityError::DirectoryNotFound(path.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Fail unless the metadata directory of `root` exists
pub fn assert_metadata_dir(root: &Path) -> Result<()> {
    assert_dir(root)?;
    match assert_dir(&metadata_dir(root)) {
        Err(IntegrityError::DirectoryNotFound(_)) => {
            Err(IntegrityError::MetadataDirMissing(root.to_path_buf()))
        }
        other => other,
    }
}

/// Create the metadata directory on first use and hide it
pub fn ensure_metadata_dir(root: &Path) -> Result<PathBuf> {
    let dir = metadata_dir(root);
    match fs::metadata(&dir) {
        Ok(meta) if meta.is_dir() => Ok(dir),
        Ok(_) => Err(IntegrityError::NotADirectory(dir)),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            fs::create_dir(&dir)?;
            hide_path(&dir)?;
            info!("Created integrity directory {:?}", dir);
            Ok(dir)
        }
        Err(e) => Err(e.into()),
    }
}

/// Mark a path as hidden
///
/// The metadata directory name starts with a dot, which already hides it on
/// Unix-like systems.
#[cfg(not(windows))]
pub fn hide_path(path: &Path) -> Result<()> {
    debug!("Dot-prefixed path is hidden already: {:?}", path);
    Ok(())
}

/// Mark a path as hidden (Windows implementation)
#[cfg(windows)]
pub fn hide_path(path: &Path) -> Result<()> {
    let status = std::process::Command::new("attrib")
        .arg("+H")
        .arg(path)
        .status()?;
    if !status.success() {
        return Err(IntegrityError::internal(format!(
            "could not hide {:?}: attrib exited with {}",
            path, status
        )));
    }
    debug!("Hid {:?}", path);
    Ok(())
}
