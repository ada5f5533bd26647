//! Content fingerprints and the analyses built on them
//!
//! A [`FingerprintKey`] is the pair `(hash, size)`: two files with the same
//! key are treated as having the same content. The [`FingerprintIndex`]
//! groups the live records of one store by key, leaving out records the
//! [`NoiseFilter`] rejects (tiny files and version-control internals). Those
//! records still count toward the index totals.
//!
//! ## Analyses
//!
//! - [`find_duplicates`]: every group with more than one record; all but the
//!   first record of a group (by path) are duplicates
//! - [`find_contained`]: external groups whose key also exists in a base
//!   index are contained in the base as a whole; the remaining external
//!   groups are then checked for duplicates
//!
//! Keys are processed in sorted order and records within a group are sorted
//! by path, so reports and deletion candidates are reproducible.
//!
//! ## Example
//!
//! ```rust,ignore
//! use crate::fingerprint::{find_contained, FingerprintIndex, NoiseFilter};
//!
//! let filter = NoiseFilter::default();
//! let base = FingerprintIndex::build(base_state.iter(), &filter);
//! let external = FingerprintIndex::build(external_state.iter(), &filter);
//! let report = find_contained(&base, external);
//! for path in report.removal_candidates() {
//!     println!("can be removed: {}", path);
//! }
//! ```

use crate::record::FileRecord;
use serde::{Deserialize, Serialize};
use std::collections::btree_map::{self, BTreeMap};

/// Default size at or below which records are ignored by the analyses
pub const DEFAULT_MAX_IGNORED_SIZE: u64 = 100;

/// Default path marker of version-control internals
pub const DEFAULT_VCS_MARKER: &str = ".git";

/// Content identity of a record
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FingerprintKey {
    /// Content digest
    pub hash: String,
    /// Content size in bytes
    pub size: u64,
}

impl From<&FileRecord> for FingerprintKey {
    fn from(record: &FileRecord) -> Self {
        Self {
            hash: record.hash.clone(),
            size: record.size,
        }
    }
}

/// Which records the analyses leave out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoiseFilter {
    /// Records of this size or smaller are ignored
    pub max_ignored_size: u64,
    /// Records whose path contains this substring are ignored; empty disables
    pub vcs_marker: String,
}

impl Default for NoiseFilter {
    fn default() -> Self {
        Self {
            max_ignored_size: DEFAULT_MAX_IGNORED_SIZE,
            vcs_marker: DEFAULT_VCS_MARKER.to_string(),
        }
    }
}

impl NoiseFilter {
    /// Whether `record` is excluded from the index
    pub fn is_noise(&self, record: &FileRecord) -> bool {
        record.size <= self.max_ignored_size
            || (!self.vcs_marker.is_empty() && record.relative_path.contains(&self.vcs_marker))
    }
}

/// Records of one store grouped by fingerprint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FingerprintIndex {
    groups: BTreeMap<FingerprintKey, Vec<FileRecord>>,
    total_files: u64,
    total_bytes: u64,
}

impl FingerprintIndex {
    /// Index `records`, skipping noise
    pub fn build<'a>(records: impl IntoIterator<Item = &'a FileRecord>, filter: &NoiseFilter) -> Self {
        let mut index = FingerprintIndex::default();
        for record in records {
            index.total_files += 1;
            index.total_bytes += record.size;
            if filter.is_noise(record) {
                continue;
            }
            index
                .groups
                .entry(FingerprintKey::from(record))
                .or_default()
                .push(record.clone());
        }
        for group in index.groups.values_mut() {
            group.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        }
        index
    }

    /// Every record seen, noise included
    pub fn total_files(&self) -> u64 {
        self.total_files
    }

    /// Size of every record seen, noise included
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Number of distinct fingerprints
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether no record was indexed
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Whether some record has this fingerprint
    pub fn contains_key(&self, key: &FingerprintKey) -> bool {
        self.groups.contains_key(key)
    }

    /// Records with this fingerprint, sorted by path
    pub fn get(&self, key: &FingerprintKey) -> Option<&[FileRecord]> {
        self.groups.get(key).map(Vec::as_slice)
    }

    /// Groups in key order
    pub fn groups(&self) -> btree_map::Iter<'_, FingerprintKey, Vec<FileRecord>> {
        self.groups.iter()
    }

    /// Remove and return a group
    pub fn remove(&mut self, key: &FingerprintKey) -> Option<Vec<FileRecord>> {
        self.groups.remove(key)
    }
}

/// Records sharing one fingerprint, sorted by path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintGroup {
    /// Shared fingerprint
    pub key: FingerprintKey,
    /// Member records
    pub records: Vec<FileRecord>,
}

impl FingerprintGroup {
    /// Member paths in order
    pub fn paths(&self) -> Vec<String> {
        self.records.iter().map(|r| r.relative_path.clone()).collect()
    }

    /// Members after the first one
    pub fn duplicates(&self) -> &[FileRecord] {
        self.records.get(1..).unwrap_or(&[])
    }
}

/// Result of [`find_duplicates`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DuplicateReport {
    /// Groups with more than one member, in key order
    pub groups: Vec<FingerprintGroup>,
    /// Members beyond the first of every group
    pub duplicate_files: u64,
    /// Size of those members
    pub duplicate_bytes: u64,
}

impl DuplicateReport {
    /// Paths of every non-first member, in report order
    pub fn duplicate_paths(&self) -> impl Iterator<Item = &str> {
        self.groups
            .iter()
            .flat_map(|group| group.duplicates())
            .map(|record| record.relative_path.as_str())
    }
}

/// Find groups of identical content within one index
pub fn find_duplicates(index: &FingerprintIndex) -> DuplicateReport {
    let mut report = DuplicateReport::default();
    for (key, records) in index.groups() {
        if records.len() <= 1 {
            continue;
        }
        let group = FingerprintGroup {
            key: key.clone(),
            records: records.clone(),
        };
        for duplicate in group.duplicates() {
            report.duplicate_files += 1;
            report.duplicate_bytes += duplicate.size;
        }
        report.groups.push(group);
    }
    report
}

/// Result of [`find_contained`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainmentReport {
    /// External groups whose content exists in the base, in key order
    pub contained: Vec<FingerprintGroup>,
    /// Every record of those groups
    pub contained_files: u64,
    /// Size of those records
    pub contained_bytes: u64,
    /// Duplicates among the remaining external groups
    pub duplicates: DuplicateReport,
}

impl ContainmentReport {
    /// Every contained path, then every duplicate path
    pub fn removal_candidates(&self) -> Vec<&str> {
        self.contained
            .iter()
            .flat_map(|group| group.records.iter())
            .map(|record| record.relative_path.as_str())
            .chain(self.duplicates.duplicate_paths())
            .collect()
    }
}

/// Classify the external index against a base index
pub fn find_contained(base: &FingerprintIndex, mut external: FingerprintIndex) -> ContainmentReport {
    let mut report = ContainmentReport::default();
    let shared: Vec<FingerprintKey> = external
        .groups()
        .map(|(key, _)| key)
        .filter(|key| base.contains_key(key))
        .cloned()
        .collect();

    for key in shared {
        if let Some(records) = external.remove(&key) {
            report.contained_files += records.len() as u64;
            report.contained_bytes += records.iter().map(|r| r.size).sum::<u64>();
            report.contained.push(FingerprintGroup { key, records });
        }
    }
    report.duplicates = find_duplicates(&external);
    report
}
