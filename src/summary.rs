//! Run summaries
//!
//! Every run ends with a summary that is both returned to the caller and
//! written as the last entry of the run's log. The text form is a fixed
//! width block:
//!
//! ```text
//!
//!
//! //// Verify Summary ///////////////////////
//! Execution time:                     0.42 s
//! Total size:                       12.50 MB
//! ...
//! ```

use crate::report::LogCategory;
use crate::utils::{format_bytes, percentage};
use std::fmt;
use std::time::Duration;

/// Width of every summary line
pub const SUMMARY_COLUMNS: usize = 42;

fn title(category: LogCategory) -> String {
    let mut line = format!("//// {} Summary ", category.title());
    while line.chars().count() < SUMMARY_COLUMNS {
        line.push('/');
    }
    line
}

fn line(label: &str, value: impl fmt::Display) -> String {
    let value = value.to_string();
    let used = label.chars().count() + value.chars().count();
    let pad = SUMMARY_COLUMNS.saturating_sub(used).max(1);
    format!("{}{}{}", label, " ".repeat(pad), value)
}

fn write_block(f: &mut fmt::Formatter<'_>, category: LogCategory, lines: &[String]) -> fmt::Result {
    write!(f, "\n\n{}", title(category))?;
    for line in lines {
        write!(f, "\n{}", line)?;
    }
    Ok(())
}

fn rate(bytes: u64, elapsed: Duration) -> u64 {
    let secs = elapsed.as_secs_f64();
    if secs == 0.0 {
        return 0;
    }
    (bytes as f64 / secs) as u64
}

/// Outcome of an upsert run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    /// Wall time of the run
    pub execution_time: Duration,
    /// Size of every file found on disk
    pub total_bytes: u64,
    /// Size of the files that were hashed
    pub hashed_bytes: u64,
    /// Unchanged files (same size and modification time)
    pub skipped_files: u64,
    /// Files without a previous record
    pub new_files: u64,
    /// Files whose record was replaced
    pub updated_files: u64,
    /// Recorded files no longer on disk
    pub deleted_files: u64,
    /// Files that could not be hashed
    pub failed_files: u64,
}

impl UpsertSummary {
    /// Hashed bytes per second
    pub fn hash_rate(&self) -> u64 {
        rate(self.hashed_bytes, self.execution_time)
    }

    /// Whether the run wrote any new record
    pub fn has_changes(&self) -> bool {
        self.new_files + self.updated_files + self.deleted_files > 0
    }
}

impl fmt::Display for UpsertSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_block(
            f,
            LogCategory::Upsert,
            &[
                line("Execution time:", format!("{:.2} s", self.execution_time.as_secs_f64())),
                line("Total size:", format_bytes(self.total_bytes)),
                line("Hash rate:", format!("{}/s", format_bytes(self.hash_rate()))),
                line("Skipped files:", self.skipped_files),
                line("New files:", self.new_files),
                line("Updated files:", self.updated_files),
                line("Deleted files:", self.deleted_files),
                line("Failed files:", self.failed_files),
            ],
        )
    }
}

/// Outcome of a verify run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerifySummary {
    /// Wall time of the run
    pub execution_time: Duration,
    /// Recorded size of every verified file
    pub total_bytes: u64,
    /// Files that still match their record
    pub valid_files: u64,
    /// Files that are missing or changed
    pub invalid_files: u64,
}

impl VerifySummary {
    /// Verified bytes per second
    pub fn hash_rate(&self) -> u64 {
        rate(self.total_bytes, self.execution_time)
    }

    /// Share of invalid files, 0 when nothing was verified
    pub fn invalid_percentage(&self) -> f64 {
        percentage(self.invalid_files, self.valid_files + self.invalid_files)
    }

    /// Whether every recorded file is intact
    pub fn is_valid(&self) -> bool {
        self.invalid_files == 0
    }
}

impl fmt::Display for VerifySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_block(
            f,
            LogCategory::Verify,
            &[
                line("Execution time:", format!("{:.2} s", self.execution_time.as_secs_f64())),
                line("Total size:", format_bytes(self.total_bytes)),
                line("Hash rate:", format!("{}/s", format_bytes(self.hash_rate()))),
                line("Verified valid files:", self.valid_files),
                line("Verified invalid files:", self.invalid_files),
                line(
                    "Percentage of invalid files:",
                    format!("{:.6}", self.invalid_percentage()),
                ),
            ],
        )
    }
}

/// Outcome of a duplicate check
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DuplicateSummary {
    /// Wall time of the run
    pub execution_time: Duration,
    /// Every recorded file, including filtered noise
    pub total_files: u64,
    /// Size of every recorded file
    pub total_bytes: u64,
    /// Files beyond the first of each group
    pub duplicate_files: u64,
    /// Size of those files
    pub duplicate_bytes: u64,
}

impl fmt::Display for DuplicateSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_block(
            f,
            LogCategory::Duplicate,
            &[
                line("Execution time:", format!("{:.2} s", self.execution_time.as_secs_f64())),
                line("Total files:", self.total_files),
                line("Duplicate files:", self.duplicate_files),
                line(
                    "Duplicate file percentage:",
                    format!("{:.1}", percentage(self.duplicate_files, self.total_files)),
                ),
                line("Total size:", format_bytes(self.total_bytes)),
                line("Duplicate size:", format_bytes(self.duplicate_bytes)),
                line(
                    "Duplicate size percentage:",
                    format!("{:.1}", percentage(self.duplicate_bytes, self.total_bytes)),
                ),
            ],
        )
    }
}

/// Outcome of a containment check
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContainedSummary {
    /// Wall time of the run, including the upsert of the external directory
    pub execution_time: Duration,
    /// Every file recorded in the external directory
    pub total_files: u64,
    /// Size of those files
    pub total_bytes: u64,
    /// External files whose content already exists in the base
    pub contained_files: u64,
    /// Size of those files
    pub contained_bytes: u64,
    /// Remaining external duplicates beyond the first of each group
    pub duplicate_files: u64,
    /// Size of those files
    pub duplicate_bytes: u64,
    /// Files deleted in fix mode
    pub removed_files: u64,
}

impl ContainedSummary {
    /// Contained plus duplicate files
    pub fn overhead_files(&self) -> u64 {
        self.contained_files + self.duplicate_files
    }

    /// Contained plus duplicate bytes
    pub fn overhead_bytes(&self) -> u64 {
        self.contained_bytes + self.duplicate_bytes
    }
}

impl fmt::Display for ContainedSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_block(
            f,
            LogCategory::Contained,
            &[
                line("Execution time:", format!("{:.2} s", self.execution_time.as_secs_f64())),
                line("Total files:", self.total_files),
                line("Contained files:", self.contained_files),
                line("Duplicate files:", self.duplicate_files),
                line(
                    "Overhead file percentage:",
                    format!("{:.1}", percentage(self.overhead_files(), self.total_files)),
                ),
                line("Total size:", format_bytes(self.total_bytes)),
                line("Contained size:", format_bytes(self.contained_bytes)),
                line("Duplicate size:", format_bytes(self.duplicate_bytes)),
                line(
                    "Overhead size percentage:",
                    format!("{:.1}", percentage(self.overhead_bytes(), self.total_bytes)),
                ),
                line("Removed files:", self.removed_files),
            ],
        )
    }
}

/// Any run summary, as carried by a log entry
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RunSummary {
    /// See [`UpsertSummary`]
    Upsert(UpsertSummary),
    /// See [`VerifySummary`]
    Verify(VerifySummary),
    /// See [`DuplicateSummary`]
    Duplicate(DuplicateSummary),
    /// See [`ContainedSummary`]
    Contained(ContainedSummary),
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunSummary::Upsert(s) => s.fmt(f),
            RunSummary::Verify(s) => s.fmt(f),
            RunSummary::Duplicate(s) => s.fmt(f),
            RunSummary::Contained(s) => s.fmt(f),
        }
    }
}

impl From<UpsertSummary> for RunSummary {
    fn from(summary: UpsertSummary) -> Self {
        RunSummary::Upsert(summary)
    }
}

impl From<VerifySummary> for RunSummary {
    fn from(summary: VerifySummary) -> Self {
        RunSummary::Verify(summary)
    }
}

impl From<DuplicateSummary> for RunSummary {
    fn from(summary: DuplicateSummary) -> Self {
        RunSummary::Duplicate(summary)
    }
}

impl From<ContainedSummary> for RunSummary {
    fn from(summary: ContainedSummary) -> Self {
        RunSummary::Contained(summary)
    }
}
