//! Integrity store of one directory
//!
//! [`IntegrityStore`] binds a tracked root to its journal, a worker pool and
//! the analysis settings. All four operations run through it:
//!
//! | Operation                          | Reads journal | Writes journal | Log category |
//! |------------------------------------|---------------|----------------|--------------|
//! | [`IntegrityStore::upsert`]         | yes           | yes            | `upsert`     |
//! | [`IntegrityStore::verify`]         | yes           | no             | `verify`     |
//! | [`IntegrityStore::find_duplicates`]| yes           | no             | `duplicate`  |
//! | [`IntegrityStore::find_contained`] | yes           | external only  | `contained`  |
//!
//! A store assumes it is the only writer of its journal. Two stores on
//! different roots are independent and can run at the same time.

use crate::check;
use crate::error::{IntegrityError, Result};
use crate::fingerprint::NoiseFilter;
use crate::journal::{Journal, DEFAULT_FLUSH_THRESHOLD};
use crate::layout;
use crate::pool::{WorkerPool, DEFAULT_REQUEST_CAPACITY, DEFAULT_RESPONSE_CAPACITY};
use crate::summary::{ContainedSummary, DuplicateSummary, UpsertSummary, VerifySummary};
use crate::types::Options;
use crate::upsert;
use crate::verification;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Integrity store of one tracked directory
///
/// # Examples
///
/// ```rust,no_run
/// use fileintegrity::{IntegrityStore, Options};
/// use std::path::PathBuf;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = IntegrityStore::open(PathBuf::from("./archive"))?;
/// let summary = store.upsert(&Options::default())?;
/// println!("{} new files", summary.new_files);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct IntegrityStore {
    root: PathBuf,
    journal: Journal,
    pool: WorkerPool,
    flush_threshold: u64,
    noise_filter: NoiseFilter,
}

impl IntegrityStore {
    /// Open the store of `root` with default settings
    ///
    /// # Errors
    ///
    /// - [`IntegrityError::DirectoryNotFound`] if `root` does not exist
    /// - [`IntegrityError::NotADirectory`] if `root` is not a directory
    pub fn open(root: PathBuf) -> Result<Self> {
        IntegrityStoreBuilder::new().build(root)
    }

    /// Builder for a store with custom settings
    pub fn builder() -> IntegrityStoreBuilder {
        IntegrityStoreBuilder::new()
    }

    /// Tracked directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Journal of the tracked directory
    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Worker pool used for hashing
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Bytes of hashed content buffered before a journal append
    pub fn flush_threshold(&self) -> u64 {
        self.flush_threshold
    }

    /// Records left out of duplicate and containment analysis
    pub fn noise_filter(&self) -> &NoiseFilter {
        &self.noise_filter
    }

    /// Bring the journal up to date with the disk
    ///
    /// Creates the metadata directory on first use. See [`crate::upsert`](mod@crate::upsert).
    ///
    /// # Errors
    ///
    /// Fails on journal, log, backup or scan I/O errors. A file that cannot
    /// be hashed is not an error; it is counted in
    /// [`UpsertSummary::failed_files`].
    pub fn upsert(&self, options: &Options) -> Result<UpsertSummary> {
        upsert::run(self, options)
    }

    /// Re-check every recorded file
    ///
    /// # Errors
    ///
    /// - [`IntegrityError::MetadataDirMissing`] if the directory was never upserted
    /// - journal or log I/O errors
    pub fn verify(&self, options: &Options) -> Result<VerifySummary> {
        verification::run(self, options)
    }

    /// Report duplicate content within this store
    pub fn find_duplicates(&self, options: &Options) -> Result<DuplicateSummary> {
        check::run_duplicates(self, options)
    }

    /// Report content of `external` that already exists in this store
    ///
    /// `external` is upserted first, with a backup of its journal. With `fix`
    /// set, contained and duplicate files are deleted from `external`.
    pub fn find_contained(
        &self,
        external: &IntegrityStore,
        fix: bool,
        options: &Options,
    ) -> Result<ContainedSummary> {
        check::run_contained(self, external, fix, options)
    }

    /// Like [`IntegrityStore::find_contained`], opening `external` with this
    /// store's settings
    pub fn find_contained_in(
        &self,
        external: PathBuf,
        fix: bool,
        options: &Options,
    ) -> Result<ContainedSummary> {
        let external = IntegrityStoreBuilder::from_store(self).build(external)?;
        self.find_contained(&external, fix, options)
    }
}

/// Builder for [`IntegrityStore`]
#[derive(Debug, Clone)]
pub struct IntegrityStoreBuilder {
    parallel_workers: usize,
    flush_threshold: u64,
    noise_filter: NoiseFilter,
    request_capacity: usize,
    response_capacity: usize,
}

impl IntegrityStoreBuilder {
    /// Create a new builder with default settings
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fileintegrity::IntegrityStoreBuilder;
    ///
    /// let builder = IntegrityStoreBuilder::new();
    /// ```
    pub fn new() -> Self {
        Self {
            parallel_workers: num_cpus::get(),
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            noise_filter: NoiseFilter::default(),
            request_capacity: DEFAULT_REQUEST_CAPACITY,
            response_capacity: DEFAULT_RESPONSE_CAPACITY,
        }
    }

    fn from_store(store: &IntegrityStore) -> Self {
        let (request_capacity, response_capacity) = store.pool.capacities();
        Self {
            parallel_workers: store.pool.workers(),
            flush_threshold: store.flush_threshold,
            noise_filter: store.noise_filter.clone(),
            request_capacity,
            response_capacity,
        }
    }

    /// Set the number of hashing workers
    ///
    /// Defaults to the number of CPU cores; values below one mean one.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fileintegrity::IntegrityStoreBuilder;
    ///
    /// let builder = IntegrityStoreBuilder::new().parallel_workers(4);
    /// ```
    pub fn parallel_workers(mut self, workers: usize) -> Self {
        self.parallel_workers = workers.max(1);
        self
    }

    /// Set how many bytes of hashed content are buffered before the records
    /// are appended to the journal (default 1 GiB)
    pub fn flush_threshold_bytes(mut self, bytes: u64) -> Self {
        self.flush_threshold = bytes;
        self
    }

    /// Set which records duplicate and containment analysis ignore
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fileintegrity::{IntegrityStoreBuilder, NoiseFilter};
    ///
    /// let builder = IntegrityStoreBuilder::new().noise_filter(NoiseFilter {
    ///     max_ignored_size: 0,
    ///     vcs_marker: ".svn".to_string(),
    /// });
    /// ```
    pub fn noise_filter(mut self, filter: NoiseFilter) -> Self {
        self.noise_filter = filter;
        self
    }

    /// Set the capacities of the request and response queues
    /// (defaults 10 and 100)
    pub fn queue_capacities(mut self, requests: usize, responses: usize) -> Self {
        self.request_capacity = requests;
        self.response_capacity = responses;
        self
    }

    /// Build the store of `root`
    ///
    /// # Errors
    ///
    /// - [`IntegrityError::DirectoryNotFound`] / [`IntegrityError::NotADirectory`]
    ///   if `root` is not an existing directory
    /// - [`IntegrityError::InvalidConfiguration`] for zero queue capacities
    pub fn build(self, root: PathBuf) -> Result<IntegrityStore> {
        layout::assert_dir(&root)?;
        if self.request_capacity == 0 || self.response_capacity == 0 {
            return Err(IntegrityError::InvalidConfiguration(
                "queue capacities must be at least 1".to_string(),
            ));
        }

        debug!(
            "Opening integrity store {:?} with {} workers",
            root, self.parallel_workers
        );
        Ok(IntegrityStore {
            journal: Journal::new(&root),
            pool: WorkerPool::new(self.parallel_workers)
                .with_capacities(self.request_capacity, self.response_capacity),
            flush_threshold: self.flush_threshold,
            noise_filter: self.noise_filter,
            root,
        })
    }
}

impl Default for IntegrityStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}
