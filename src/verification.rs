//! Verification of a directory against its journal
//!
//! Verification re-checks every live record of the consolidated journal on
//! the worker pool. For each file the checks run in a fixed order and stop at
//! the first mismatch:
//!
//! 1. the file still exists
//! 2. its metadata is readable
//! 3. its size equals the recorded size (no hashing when it does not)
//! 4. its SHA-256 equals the recorded hash
//!
//! Every result is logged: OK entries go to the log file only, ERROR entries
//! are also printed on the console. Verification only reads; the journal is
//! never modified.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use fileintegrity::{IntegrityStore, Options};
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = IntegrityStore::open(PathBuf::from("./photos"))?;
//! let summary = store.verify(&Options::default())?;
//! if !summary.is_valid() {
//!     println!("{} files changed or missing", summary.invalid_files);
//! }
//! # Ok(())
//! # }
//! ```

use crate::error::Result;
use crate::layout;
use crate::pool::VerifyRequest;
use crate::report::{self, LogBuffer, LogCategory, LogEntry, VerifyStatus, VERIFY_FLUSH_ENTRIES};
use crate::store::IntegrityStore;
use crate::summary::VerifySummary;
use crate::types::Options;
use crate::utils::join_relative;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Verify every recorded file of the store's root
pub(crate) fn run(store: &IntegrityStore, options: &Options) -> Result<VerifySummary> {
    let root = store.root();
    layout::assert_metadata_dir(root)?;

    let start = Instant::now();
    info!("Verifying {:?}", root);

    let state = store.journal().load_consolidated()?;
    let requests = state
        .sorted()
        .into_iter()
        .map(|record| {
            Ok(VerifyRequest {
                absolute_path: join_relative(root, &record.relative_path)?,
                record: record.clone(),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    debug!("Verifying {} records of {:?}", requests.len(), root);

    let mut summary = VerifySummary {
        total_bytes: state.total_bytes(),
        ..Default::default()
    };
    let progress = report::progress_bar(summary.total_bytes, options.show_progress);
    let mut log = LogBuffer::automatic(
        root,
        LogCategory::Verify,
        VERIFY_FLUSH_ENTRIES,
        options.log_to_file,
        options.log_to_console,
    )
    .with_progress(&progress);

    store.pool().run(requests, |response| {
        progress.inc(response.record.size);
        let path = response.record.relative_path;
        match response.result {
            Ok(()) => {
                summary.valid_files += 1;
                log.append(LogEntry::verify(VerifyStatus::Ok, path, ""))
            }
            Err(failure) => {
                warn!("Verification failed for {:?}: {}", path, failure);
                summary.invalid_files += 1;
                log.append(LogEntry::verify(VerifyStatus::Error, path, failure.to_string()))
            }
        }
    })?;
    progress.finish_and_clear();

    summary.execution_time = start.elapsed();
    info!(
        "Verification of {:?} finished: {} valid, {} invalid",
        root, summary.valid_files, summary.invalid_files
    );
    log.append(LogEntry::Summary(summary.into()))?;
    log.flush()?;
    Ok(summary)
}
