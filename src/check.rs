//! Duplicate and containment checks
//!
//! Both checks read the consolidated journal, build fingerprint indexes and
//! log one block per group followed by a summary. The containment check
//! first upserts the external directory (with a backup of its journal) so
//! its journal reflects the disk, and logs into the base directory.
//!
//! In fix mode the containment check deletes every contained file and every
//! non-first duplicate from the external directory. Candidates are joined
//! onto the external root from their journal path (normal components only)
//! and any candidate that resolves inside the base directory is left alone.

use crate::error::Result;
use crate::fingerprint::{find_contained, find_duplicates, DuplicateReport, FingerprintIndex};
use crate::layout;
use crate::report::{LogBuffer, LogCategory, LogEntry, ANALYSIS_FLUSH_ENTRIES};
use crate::store::IntegrityStore;
use crate::summary::{ContainedSummary, DuplicateSummary};
use crate::types::Options;
use crate::upsert;
use crate::utils::join_relative;
use std::fs;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Report duplicate content within the store's root
pub(crate) fn run_duplicates(store: &IntegrityStore, options: &Options) -> Result<DuplicateSummary> {
    let root = store.root();
    layout::assert_metadata_dir(root)?;
    let start = Instant::now();
    info!("Checking {:?} for duplicates", root);

    let mut log = LogBuffer::automatic(
        root,
        LogCategory::Duplicate,
        ANALYSIS_FLUSH_ENTRIES,
        options.log_to_file,
        options.log_to_console,
    );
    let state = store.journal().load_consolidated()?;
    let index = FingerprintIndex::build(state.iter(), store.noise_filter());
    let report = find_duplicates(&index);
    log_duplicates(&mut log, &report)?;

    let summary = DuplicateSummary {
        execution_time: start.elapsed(),
        total_files: index.total_files(),
        total_bytes: index.total_bytes(),
        duplicate_files: report.duplicate_files,
        duplicate_bytes: report.duplicate_bytes,
    };
    info!(
        "Duplicate check of {:?} finished: {} duplicates in {} groups",
        root,
        summary.duplicate_files,
        report.groups.len()
    );
    log.append(LogEntry::Summary(summary.into()))?;
    log.flush()?;
    Ok(summary)
}

/// Report external content already present in the base store
pub(crate) fn run_contained(
    base: &IntegrityStore,
    external: &IntegrityStore,
    fix: bool,
    options: &Options,
) -> Result<ContainedSummary> {
    layout::assert_metadata_dir(base.root())?;
    layout::assert_dir(external.root())?;
    let start = Instant::now();
    info!(
        "Checking {:?} for content contained in {:?}",
        external.root(),
        base.root()
    );

    let mut log = LogBuffer::automatic(
        base.root(),
        LogCategory::Contained,
        ANALYSIS_FLUSH_ENTRIES,
        options.log_to_file,
        options.log_to_console,
    );
    upsert::run(external, &options.with_backup())?;

    let base_state = base.journal().load_consolidated()?;
    let external_state = external.journal().load_consolidated()?;
    let base_index = FingerprintIndex::build(base_state.iter(), base.noise_filter());
    let external_index = FingerprintIndex::build(external_state.iter(), external.noise_filter());
    let total_files = external_index.total_files();
    let total_bytes = external_index.total_bytes();

    let report = find_contained(&base_index, external_index);
    for group in &report.contained {
        log.append(LogEntry::Block {
            category: LogCategory::Contained,
            hash: group.key.hash.clone(),
            paths: group.paths(),
        })?;
    }
    log_duplicates(&mut log, &report.duplicates)?;

    let removed_files = if fix {
        remove_files(base.root(), external.root(), &report.removal_candidates())?
    } else {
        0
    };

    let summary = ContainedSummary {
        execution_time: start.elapsed(),
        total_files,
        total_bytes,
        contained_files: report.contained_files,
        contained_bytes: report.contained_bytes,
        duplicate_files: report.duplicates.duplicate_files,
        duplicate_bytes: report.duplicates.duplicate_bytes,
        removed_files,
    };
    info!(
        "Containment check of {:?} finished: {} contained, {} duplicates, {} removed",
        external.root(),
        summary.contained_files,
        summary.duplicate_files,
        summary.removed_files
    );
    log.append(LogEntry::Summary(summary.into()))?;
    log.flush()?;
    Ok(summary)
}

fn log_duplicates(log: &mut LogBuffer, report: &DuplicateReport) -> Result<()> {
    for group in &report.groups {
        log.append(LogEntry::Block {
            category: LogCategory::Duplicate,
            hash: group.key.hash.clone(),
            paths: group.paths(),
        })?;
    }
    Ok(())
}

/// Delete candidates from `external_root`, never touching `base_root`
fn remove_files(base_root: &Path, external_root: &Path, relative_paths: &[&str]) -> Result<u64> {
    let base_canonical = base_root.canonicalize()?;
    let mut removed = 0u64;
    for relative in relative_paths {
        let candidate = join_relative(external_root, relative)?;
        let resolved = candidate.canonicalize()?;
        if resolved.starts_with(&base_canonical) {
            warn!(
                "Not removing {:?}: it resolves inside the base directory {:?}",
                candidate, base_root
            );
            continue;
        }
        fs::remove_file(&candidate)?;
        debug!("Removed {:?}", candidate);
        removed += 1;
    }
    Ok(removed)
}
