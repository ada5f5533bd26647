//! Reconciliation of a directory with its journal
//!
//! An upsert brings the journal up to date with the disk:
//!
//! 1. Validate the root and create the metadata directory on first use
//! 2. Optionally zip the current journal
//! 3. Load the consolidated journal and scan the disk
//! 4. Partition paths into skipped, to-hash and deleted ([`UpsertPlan`])
//! 5. Hash the to-hash files on the worker pool; the aggregator appends a
//!    record per hashed file and logs it as NEW or UPDATE
//! 6. Once every hash is accounted for, append a tombstone per deleted path
//! 7. Flush, compact the journal and log the summary
//!
//! A file is skipped when its recorded modification time and size both match
//! the disk; its content is assumed unchanged. A file that cannot be hashed
//! gets no record and a FAILED log entry; its previous record stays in place.

use crate::backup;
use crate::error::Result;
use crate::file_tracking::FileTracker;
use crate::journal::RecordBuffer;
use crate::layout;
use crate::pool::{CreateRequest, CreateResponse};
use crate::record::{ConsolidatedState, FileRecord};
use crate::report::{self, LogBuffer, LogCategory, LogEntry, UpsertOperation};
use crate::store::IntegrityStore;
use crate::summary::UpsertSummary;
use crate::types::{DiskFile, DiskSnapshot, Options};
use chrono::Utc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// How an upsert will treat every known path
#[derive(Debug, Default)]
pub struct UpsertPlan<'a> {
    /// Unchanged files, nothing to do
    pub skipped: Vec<&'a DiskFile>,
    /// New or changed files, in path order
    pub to_hash: Vec<&'a DiskFile>,
    /// Recorded files no longer on disk, in path order
    pub deleted: Vec<&'a FileRecord>,
}

impl<'a> UpsertPlan<'a> {
    /// Partition the disk snapshot against the consolidated journal
    pub fn build(state: &'a ConsolidatedState, snapshot: &'a DiskSnapshot) -> Self {
        let mut plan = UpsertPlan::default();
        for file in snapshot {
            match state.get(&file.relative_path) {
                Some(record) if record.modified == file.modified && record.size == file.size => {
                    plan.skipped.push(file)
                }
                _ => plan.to_hash.push(file),
            }
        }
        plan.deleted = state
            .sorted()
            .into_iter()
            .filter(|record| !snapshot.contains(&record.relative_path))
            .collect();
        plan
    }

    /// Size of the skipped files
    pub fn skipped_bytes(&self) -> u64 {
        self.skipped.iter().map(|f| f.size).sum()
    }
}

/// Run an upsert on the store's root
pub(crate) fn run(store: &IntegrityStore, options: &Options) -> Result<UpsertSummary> {
    let root = store.root();
    layout::assert_dir(root)?;
    layout::ensure_metadata_dir(root)?;
    let journal = store.journal();

    if options.backup_before_run {
        backup::backup_journal(root, journal)?;
    }

    let start = Instant::now();
    info!("Upserting {:?}", root);

    let state = journal.load_consolidated()?;
    let snapshot = FileTracker::new(root.to_path_buf())?.scan()?;
    let plan = UpsertPlan::build(&state, &snapshot);
    debug!(
        "Upsert plan for {:?}: {} skipped, {} to hash, {} deleted",
        root,
        plan.skipped.len(),
        plan.to_hash.len(),
        plan.deleted.len()
    );

    let mut summary = UpsertSummary {
        total_bytes: snapshot.total_bytes(),
        skipped_files: plan.skipped.len() as u64,
        ..Default::default()
    };

    let progress = report::progress_bar(summary.total_bytes, options.show_progress);
    progress.inc(plan.skipped_bytes());
    let mut log = LogBuffer::manual(
        root,
        LogCategory::Upsert,
        options.log_to_file,
        options.log_to_console,
    )
    .with_progress(&progress);
    let mut records = RecordBuffer::new(journal, store.flush_threshold());

    let jobs = plan.to_hash.iter().map(|file| CreateRequest {
        file: (*file).clone(),
    });
    store.pool().run(jobs, |response| {
        progress.inc(response.file.size);
        record_hash_outcome(response, &state, &mut summary, &mut log, &mut records)
    })?;

    for previous in &plan.deleted {
        log.append(LogEntry::upsert(
            UpsertOperation::Delete,
            previous.relative_path.clone(),
        ))?;
        if records.push(FileRecord::tombstone(previous, Utc::now()))? {
            log.flush()?;
        }
        summary.deleted_files += 1;
    }

    records.flush()?;
    log.flush()?;
    let compacted = journal.compact()?;
    progress.finish_and_clear();

    summary.execution_time = start.elapsed();
    info!(
        "Upsert of {:?} finished: {} new, {} updated, {} deleted, {} skipped, {} failed (journal rewritten: {})",
        root,
        summary.new_files,
        summary.updated_files,
        summary.deleted_files,
        summary.skipped_files,
        summary.failed_files,
        compacted
    );
    log.append(LogEntry::Summary(summary.into()))?;
    log.flush()?;
    Ok(summary)
}

/// Account for one hashed file: a record and a NEW/UPDATE entry, or a
/// FAILED entry and no record
fn record_hash_outcome(
    response: CreateResponse,
    state: &ConsolidatedState,
    summary: &mut UpsertSummary,
    log: &mut LogBuffer,
    records: &mut RecordBuffer<'_>,
) -> Result<()> {
    let file = response.file;
    let hash = match response.hash {
        Ok(hash) => hash,
        Err(failure) => {
            warn!("Could not hash {:?}: {}", file.absolute_path, failure);
            summary.failed_files += 1;
            return log.append(LogEntry::upsert_failed(file.relative_path, failure.to_string()));
        }
    };

    let operation = if state.contains(&file.relative_path) {
        summary.updated_files += 1;
        UpsertOperation::Update
    } else {
        summary.new_files += 1;
        UpsertOperation::New
    };
    summary.hashed_bytes += file.size;
    log.append(LogEntry::upsert(operation, file.relative_path.clone()))?;

    let flushed = records.push(FileRecord {
        hash,
        created: Utc::now(),
        modified: file.modified,
        size: file.size,
        relative_path: file.relative_path,
    })?;
    if flushed {
        log.flush()?;
    }
    Ok(())
}
