//! Per-run audit logs and console output
//!
//! Each run writes its own log file under the metadata directory, named after
//! the time the run started and its [`LogCategory`]. Entries are kept in a
//! [`LogBuffer`] and appended to that file when the buffer is flushed.
//!
//! ## Flush modes
//!
//! - **Manual**: the owner decides when to flush. The upsert flushes its log
//!   right after every journal flush, so the log never claims more than the
//!   journal holds.
//! - **Automatic**: the buffer flushes itself every `max_entries` entries
//!   (verify and the fingerprint checks).
//!
//! Console output is independent of flushing: an entry that is visible on
//! the console is printed the moment it is appended, through the run's
//! progress bar so the bar is not torn.

use crate::error::Result;
use crate::layout;
use crate::summary::RunSummary;
use chrono::{DateTime, Local};
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::trace;

/// Automatic flush interval of the verify log
pub const VERIFY_FLUSH_ENTRIES: usize = 1_000;

/// Automatic flush interval of the duplicate and contained logs
pub const ANALYSIS_FLUSH_ENTRIES: usize = 10_000;

/// Kind of run a log file belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogCategory {
    /// Reconciliation of disk and journal
    Upsert,
    /// Re-hash of every recorded file
    Verify,
    /// Duplicate check of one store
    Duplicate,
    /// Containment check of an external directory
    Contained,
}

impl LogCategory {
    /// Name used in log file names
    pub fn as_str(&self) -> &'static str {
        match self {
            LogCategory::Upsert => "upsert",
            LogCategory::Verify => "verify",
            LogCategory::Duplicate => "duplicate",
            LogCategory::Contained => "contained",
        }
    }

    /// Name used in summary titles
    pub fn title(&self) -> &'static str {
        match self {
            LogCategory::Upsert => "Upsert",
            LogCategory::Verify => "Verify",
            LogCategory::Duplicate => "Duplicate",
            LogCategory::Contained => "Contained",
        }
    }

    /// Header keyword of analysis blocks
    pub fn block_keyword(&self) -> &'static str {
        match self {
            LogCategory::Upsert => "UPSERT",
            LogCategory::Verify => "VERIFY",
            LogCategory::Duplicate => "DUPLICATE",
            LogCategory::Contained => "CONTAINED",
        }
    }
}

impl fmt::Display for LogCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an upsert did with a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOperation {
    /// First record for the path
    New,
    /// Newer record replacing an existing one
    Update,
    /// Tombstone for a vanished file
    Delete,
    /// The file could not be hashed, nothing was recorded
    Failed,
}

impl fmt::Display for UpsertOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UpsertOperation::New => "NEW",
            UpsertOperation::Update => "UPDATE",
            UpsertOperation::Delete => "DELETE",
            UpsertOperation::Failed => "FAILED",
        })
    }
}

/// Result of verifying one path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyStatus {
    /// Size and content match the record
    Ok,
    /// Missing, unreadable or changed
    Error,
}

impl fmt::Display for VerifyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VerifyStatus::Ok => "OK",
            VerifyStatus::Error => "ERROR",
        })
    }
}

/// One entry of a run log
#[derive(Debug, Clone, PartialEq)]
pub enum LogEntry {
    /// `<ts>  <OP>  <path>[  <reason>]`
    Upsert {
        /// When the entry was created
        created: DateTime<Local>,
        /// What happened
        operation: UpsertOperation,
        /// Relative path
        path: String,
        /// Failure reason for [`UpsertOperation::Failed`]
        reason: Option<String>,
    },
    /// `<ts>  <STATUS>  <path>  <reason>`
    Verify {
        /// When the entry was created
        created: DateTime<Local>,
        /// Verification result
        status: VerifyStatus,
        /// Relative path
        path: String,
        /// Empty for [`VerifyStatus::Ok`]
        reason: String,
    },
    /// Header line followed by one path per line
    Block {
        /// [`LogCategory::Duplicate`] or [`LogCategory::Contained`]
        category: LogCategory,
        /// Content hash shared by the paths
        hash: String,
        /// Relative paths, in report order
        paths: Vec<String>,
    },
    /// Closing summary of the run
    Summary(RunSummary),
}

impl LogEntry {
    /// Upsert entry stamped now
    pub fn upsert(operation: UpsertOperation, path: impl Into<String>) -> Self {
        LogEntry::Upsert {
            created: Local::now(),
            operation,
            path: path.into(),
            reason: None,
        }
    }

    /// Failed upsert entry stamped now
    pub fn upsert_failed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        LogEntry::Upsert {
            created: Local::now(),
            operation: UpsertOperation::Failed,
            path: path.into(),
            reason: Some(reason.into()),
        }
    }

    /// Verify entry stamped now
    pub fn verify(status: VerifyStatus, path: impl Into<String>, reason: impl Into<String>) -> Self {
        LogEntry::Verify {
            created: Local::now(),
            status,
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether the entry is printed on the console
    ///
    /// Successful verifications only go to the log file.
    pub fn visible_on_console(&self) -> bool {
        !matches!(
            self,
            LogEntry::Verify {
                status: VerifyStatus::Ok,
                ..
            }
        )
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogEntry::Upsert {
                created,
                operation,
                path,
                reason,
            } => {
                write!(f, "{}  {}  {}", layout::format_time(created), operation, path)?;
                if let Some(reason) = reason {
                    write!(f, "  {}", reason)?;
                }
                Ok(())
            }
            LogEntry::Verify {
                created,
                status,
                path,
                reason,
            } => write!(
                f,
                "{}  {}  {}  {}",
                layout::format_time(created),
                status,
                path,
                reason
            ),
            LogEntry::Block {
                category,
                hash,
                paths,
            } => {
                writeln!(f, "{} {}", category.block_keyword(), hash)?;
                for path in paths {
                    writeln!(f, "{}", path)?;
                }
                Ok(())
            }
            LogEntry::Summary(summary) => summary.fmt(f),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlushMode {
    Manual,
    Automatic { max_entries: usize },
}

/// Buffered writer for one run log
///
/// Owned by a single consumer (the aggregator of a run), so it needs no
/// locking. With file logging disabled no file is ever created and entries
/// are not retained.
#[derive(Debug)]
pub struct LogBuffer {
    path: Option<PathBuf>,
    entries: Vec<LogEntry>,
    mode: FlushMode,
    console: bool,
    progress: Option<ProgressBar>,
}

impl LogBuffer {
    /// Buffer flushed only by [`LogBuffer::flush`]
    pub fn manual(root: &Path, category: LogCategory, log_to_file: bool, log_to_console: bool) -> Self {
        Self::create(root, category, FlushMode::Manual, log_to_file, log_to_console)
    }

    /// Buffer that flushes itself every `max_entries` entries
    pub fn automatic(
        root: &Path,
        category: LogCategory,
        max_entries: usize,
        log_to_file: bool,
        log_to_console: bool,
    ) -> Self {
        Self::create(
            root,
            category,
            FlushMode::Automatic {
                max_entries: max_entries.max(1),
            },
            log_to_file,
            log_to_console,
        )
    }

    fn create(
        root: &Path,
        category: LogCategory,
        mode: FlushMode,
        log_to_file: bool,
        log_to_console: bool,
    ) -> Self {
        let path = log_to_file.then(|| layout::log_file_path(root, &Local::now(), category.as_str()));
        Self {
            path,
            entries: Vec::new(),
            mode,
            console: log_to_console,
            progress: None,
        }
    }

    /// Print console entries through `progress`
    pub fn with_progress(mut self, progress: &ProgressBar) -> Self {
        self.progress = Some(progress.clone());
        self
    }

    /// Log file this buffer writes to, if file logging is enabled
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Number of entries waiting for a flush
    pub fn pending(&self) -> usize {
        self.entries.len()
    }

    /// Add an entry, printing it if it is visible on the console
    pub fn append(&mut self, entry: LogEntry) -> Result<()> {
        if self.console && entry.visible_on_console() {
            let text = entry.to_string();
            match &self.progress {
                Some(progress) => progress.suspend(|| println!("{}", text)),
                None => println!("{}", text),
            }
        }
        if self.path.is_none() {
            return Ok(());
        }
        self.entries.push(entry);
        if let FlushMode::Automatic { max_entries } = self.mode {
            if self.entries.len() >= max_entries {
                self.flush()?;
            }
        }
        Ok(())
    }

    /// Append every buffered entry to the log file
    pub fn flush(&mut self) -> Result<()> {
        let path = match &self.path {
            Some(path) if !self.entries.is_empty() => path,
            _ => return Ok(()),
        };
        let mut content = String::new();
        for entry in &self.entries {
            content.push_str(&entry.to_string());
            content.push('\n');
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(content.as_bytes())?;
        trace!("Flushed {} log entries to {:?}", self.entries.len(), path);
        self.entries.clear();
        Ok(())
    }
}

/// Byte progress bar for a run, hidden unless `visible`
pub fn progress_bar(total_bytes: u64, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(total_bytes);
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("#>-");
    bar.set_style(style);
    bar
}
