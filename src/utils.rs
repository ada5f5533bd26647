//! Utility functions shared by the engine
//!
//! ## Categories of Utilities
//!
//! ### Hashing
//! - Streaming SHA-256 of files and readers (the fingerprint hasher)
//! - SHA-256 of in-memory data
//!
//! ### Path Manipulation
//! - Converting walked paths to `/` separated relative paths
//! - Joining journal paths back onto a root without escaping it
//!
//! ### Formatting
//! - Human-readable byte sizes
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use crate::utils::{hash_file_content, format_bytes};
//! use std::path::Path;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let hash = hash_file_content(Path::new("example.txt"))?;
//! assert_eq!(hash.len(), 64);
//! println!("{}", format_bytes(1536)); // "1.50 KB"
//! # Ok(())
//! # }
//! ```

use crate::error::{IntegrityError, Result};
use crate::pool::HashFailure;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// Stream a reader through SHA-256
///
/// Returns the lowercase hex digest. The reader is consumed to its end.
pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_BUFFER_SIZE];

    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Hash a file's content using SHA-256
///
/// The file is read in 64 KiB chunks, so memory use does not grow with the
/// file size. The handle is closed before returning on every path.
///
/// # Arguments
///
/// * `path` - Path to the file to hash
///
/// # Returns
///
/// The SHA-256 digest as a 64-character lowercase hex string.
///
/// # Errors
///
/// - [`HashFailure::Open`] if the file cannot be opened
/// - [`HashFailure::Read`] if reading fails part way through
///
/// # Example
///
/// ```rust,ignore
/// use crate::utils::hash_file_content;
/// use std::path::Path;
///
/// let hash = hash_file_content(Path::new("example.txt"))?;
/// assert_eq!(hash.len(), 64);
/// ```
pub fn hash_file_content(path: &Path) -> std::result::Result<String, HashFailure> {
    let file = File::open(path).map_err(HashFailure::Open)?;
    hash_reader(file).map_err(HashFailure::Read)
}

/// Hash arbitrary data using SHA-256
pub fn hash_data(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Convert a walked path into a `/` separated path relative to `base`
///
/// Returns `None` when `path` is not below `base`, is `base` itself, or is
/// not representable as UTF-8.
pub fn relative_path_string(path: &Path, base: &Path) -> Option<String> {
    let relative = path.strip_prefix(base).ok()?;
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

/// Join a `/` separated relative path onto `base`
///
/// Only normal components are accepted, so the result can never point
/// outside of `base`.
///
/// # Errors
///
/// - [`IntegrityError::UnsafeRelativePath`] for empty, absolute or
///   parent-relative paths
pub fn join_relative(base: &Path, relative: &str) -> Result<PathBuf> {
    let mut joined = base.to_path_buf();
    let mut depth = 0usize;
    for part in relative.split('/') {
        let mut components = Path::new(part).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => {
                joined.push(name);
                depth += 1;
            }
            _ => return Err(IntegrityError::UnsafeRelativePath(relative.to_string())),
        }
    }
    if depth == 0 {
        return Err(IntegrityError::UnsafeRelativePath(relative.to_string()));
    }
    Ok(joined)
}

/// Format bytes in human-readable form
///
/// Converts a byte count into a string using binary units (B, KB, MB, GB,
/// TB, PB). Values below 1024 are whole numbers, larger values get two
/// decimals.
///
/// # Example
///
/// ```rust,ignore
/// use crate::utils::format_bytes;
///
/// assert_eq!(format_bytes(0), "0 B");
/// assert_eq!(format_bytes(1536), "1.50 KB");
/// assert_eq!(format_bytes(1_073_741_824), "1.00 GB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", bytes, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

/// `part` as a percentage of `whole`, 0 when `whole` is 0
pub fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}
