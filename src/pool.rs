//! Bounded worker pool for hashing
//!
//! The pool runs a batch of [`HashJob`]s on a fixed number of worker threads
//! and hands every outcome to a single aggregator:
//!
//! ```text
//!  caller ──send──▶ [requests: bounded] ──▶ worker 0..N ──▶ [responses: bounded] ──▶ aggregator
//! ```
//!
//! Producers block once the request queue is full, so enumeration never runs
//! far ahead of hashing. Workers share nothing but the two queues. The
//! aggregator is the only place outcomes are consumed, which lets it own the
//! run's record and log buffers without locking. [`WorkerPool::run`] returns
//! only after every worker and the aggregator have finished, so callers can
//! rely on all dispatched work being accounted for.
//!
//! Outcomes arrive in completion order, not dispatch order.
//!
//! The same pool serves both payload kinds:
//!
//! - [`CreateRequest`] hashes a file found on disk ([`CreateResponse`])
//! - [`VerifyRequest`] re-checks a recorded file ([`VerifyResponse`])
//!
//! Failures concerning a single file are data inside the response, never an
//! error of the run.

use crate::error::{IntegrityError, Result};
use crate::record::FileRecord;
use crate::types::DiskFile;
use crate::utils::hash_file_content;
use crossbeam_channel::bounded;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::PathBuf;
use std::thread;
use thiserror::Error;
use tracing::{debug, trace};

/// Default capacity of the request queue
pub const DEFAULT_REQUEST_CAPACITY: usize = 10;

/// Default capacity of the response queue
pub const DEFAULT_RESPONSE_CAPACITY: usize = 100;

/// A unit of work executed on a pool worker
pub trait HashJob: Send {
    /// Result handed to the aggregator
    type Outcome: Send;

    /// Execute the job
    fn run(self) -> Self::Outcome;
}

/// Why a file could not be hashed
#[derive(Debug, Error)]
pub enum HashFailure {
    /// The file could not be opened
    #[error("could not open file for hashing: {0}")]
    Open(#[source] io::Error),
    /// Reading failed part way through
    #[error("error during hashing: {0}")]
    Read(#[source] io::Error),
}

/// Why a recorded file failed verification
#[derive(Debug, Error)]
pub enum VerifyFailure {
    /// Nothing exists at the recorded path
    #[error("file does not exist")]
    Missing,
    /// The path exists but its metadata cannot be read
    #[error("file stat unreadable")]
    StatUnreadable(#[source] io::Error),
    /// Current size differs from the recorded size
    #[error("file size different")]
    SizeDifferent {
        /// Recorded size
        expected: u64,
        /// Size on disk
        actual: u64,
    },
    /// Content digest differs from the recorded hash
    #[error("file hash different")]
    HashDifferent,
    /// The file could not be hashed
    #[error(transparent)]
    Hash(#[from] HashFailure),
}

/// Hash a file found on disk
#[derive(Debug, Clone)]
pub struct CreateRequest {
    /// The file as seen by the scan
    pub file: DiskFile,
}

/// Outcome of a [`CreateRequest`]
#[derive(Debug)]
pub struct CreateResponse {
    /// The file the request was made for
    pub file: DiskFile,
    /// Hex digest or the reason hashing failed
    pub hash: std::result::Result<String, HashFailure>,
}

impl HashJob for CreateRequest {
    type Outcome = CreateResponse;

    fn run(self) -> CreateResponse {
        trace!("Hashing {:?}", self.file.absolute_path);
        let hash = hash_file_content(&self.file.absolute_path);
        CreateResponse {
            file: self.file,
            hash,
        }
    }
}

/// Re-check a recorded file against the disk
#[derive(Debug, Clone)]
pub struct VerifyRequest {
    /// Where the recorded file should be
    pub absolute_path: PathBuf,
    /// The effective journal record
    pub record: FileRecord,
}

/// Outcome of a [`VerifyRequest`]
#[derive(Debug)]
pub struct VerifyResponse {
    /// The record that was verified
    pub record: FileRecord,
    /// `Ok` when size and content still match
    pub result: std::result::Result<(), VerifyFailure>,
}

impl VerifyRequest {
    /// Existence, then size, then content; the first mismatch wins
    fn check(&self) -> std::result::Result<(), VerifyFailure> {
        let metadata = match fs::metadata(&self.absolute_path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(VerifyFailure::Missing),
            Err(e) => return Err(VerifyFailure::StatUnreadable(e)),
        };
        if metadata.len() != self.record.size {
            return Err(VerifyFailure::SizeDifferent {
                expected: self.record.size,
                actual: metadata.len(),
            });
        }
        if hash_file_content(&self.absolute_path)? != self.record.hash {
            return Err(VerifyFailure::HashDifferent);
        }
        Ok(())
    }
}

impl HashJob for VerifyRequest {
    type Outcome = VerifyResponse;

    fn run(self) -> VerifyResponse {
        trace!("Verifying {:?}", self.absolute_path);
        let result = self.check();
        VerifyResponse {
            record: self.record,
            result,
        }
    }
}

/// Fixed-size pool of hashing workers
#[derive(Debug, Clone)]
pub struct WorkerPool {
    workers: usize,
    request_capacity: usize,
    response_capacity: usize,
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(num_cpus::get())
    }
}

impl WorkerPool {
    /// Pool with `workers` threads (at least one) and default queue sizes
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            request_capacity: DEFAULT_REQUEST_CAPACITY,
            response_capacity: DEFAULT_RESPONSE_CAPACITY,
        }
    }

    /// Override the queue capacities (each at least one)
    pub fn with_capacities(mut self, requests: usize, responses: usize) -> Self {
        self.request_capacity = requests.max(1);
        self.response_capacity = responses.max(1);
        self
    }

    /// Number of worker threads
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Request and response queue capacities
    pub fn capacities(&self) -> (usize, usize) {
        (self.request_capacity, self.response_capacity)
    }

    /// Run `jobs` to completion, feeding each outcome to `aggregate`
    ///
    /// `aggregate` runs on its own thread and sees every outcome exactly once.
    /// If it returns an error, remaining work is abandoned: workers stop at
    /// their next send and the producer stops at its next dispatch. Returns
    /// the number of outcomes consumed.
    ///
    /// # Errors
    ///
    /// - [`IntegrityError::ThreadPool`] if a thread cannot be spawned or panics
    /// - whatever `aggregate` returned
    pub fn run<J, I, F>(&self, jobs: I, mut aggregate: F) -> Result<usize>
    where
        J: HashJob,
        I: IntoIterator<Item = J>,
        F: FnMut(J::Outcome) -> Result<()> + Send,
    {
        let (request_tx, request_rx) = bounded::<J>(self.request_capacity);
        let (response_tx, response_rx) = bounded::<J::Outcome>(self.response_capacity);

        thread::scope(|scope| -> Result<usize> {
            let aggregator = thread::Builder::new()
                .name("integrity-aggregator".to_string())
                .spawn_scoped(scope, move || -> Result<usize> {
                    let mut consumed = 0usize;
                    for outcome in response_rx.iter() {
                        aggregate(outcome)?;
                        consumed += 1;
                    }
                    Ok(consumed)
                })
                .map_err(spawn_error)?;

            let mut workers = Vec::with_capacity(self.workers);
            for idx in 0..self.workers {
                let requests = request_rx.clone();
                let responses = response_tx.clone();
                let handle = thread::Builder::new()
                    .name(format!("integrity-worker-{}", idx))
                    .spawn_scoped(scope, move || {
                        for job in requests.iter() {
                            if responses.send(job.run()).is_err() {
                                break;
                            }
                        }
                    })
                    .map_err(spawn_error)?;
                workers.push(handle);
            }
            // Disconnection is driven by the threads from here on
            drop(request_rx);
            drop(response_tx);

            let mut dispatched = 0usize;
            for job in jobs {
                if request_tx.send(job).is_err() {
                    break;
                }
                dispatched += 1;
            }
            drop(request_tx);

            let mut worker_panicked = false;
            for handle in workers {
                worker_panicked |= handle.join().is_err();
            }
            let consumed = aggregator
                .join()
                .map_err(|_| IntegrityError::ThreadPool("aggregator panicked".to_string()))??;
            if worker_panicked {
                return Err(IntegrityError::ThreadPool("worker panicked".to_string()));
            }

            debug!(
                "Worker pool finished: {} dispatched, {} consumed, {} workers",
                dispatched, consumed, self.workers
            );
            Ok(consumed)
        })
    }
}

fn spawn_error(e: io::Error) -> IntegrityError {
    IntegrityError::ThreadPool(format!("could not spawn thread: {}", e))
}
