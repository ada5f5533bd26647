//! Journal records and their consolidation
//!
//! A [`FileRecord`] is one physical line of the journal. Records are never
//! changed in place: a file that changed gets a newer record, a file that
//! disappeared gets a tombstone (a record whose hash is [`TOMBSTONE_HASH`]).
//! [`ConsolidatedState`] folds an arbitrary record sequence into the one
//! effective record per path.
//!
//! ## Line format
//!
//! ```text
//! <hash>,<created>,<modified>,<size>,<relative_path>
//! ```
//!
//! There is no header and no quoting. Timestamps are RFC 3339 in UTC with the
//! exact sub-second precision of the source value. The relative path is the
//! last field and is taken verbatim after the fourth comma, so it may contain
//! commas itself.

use crate::error::{IntegrityError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::HashMap;

/// Reserved hash marking a path as deleted
pub const TOMBSTONE_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

const FIELD_SEPARATOR: char = ',';
const FIELD_COUNT: usize = 5;

/// One journal entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileRecord {
    /// SHA-256 hex digest of the content, or [`TOMBSTONE_HASH`]
    pub hash: String,
    /// When this record was written
    pub created: DateTime<Utc>,
    /// Modification time of the file when it was hashed
    pub modified: DateTime<Utc>,
    /// File size in bytes
    pub size: u64,
    /// Path relative to the tracked root, `/` separated
    pub relative_path: String,
}

impl FileRecord {
    /// Build a tombstone for a previously recorded file
    pub fn tombstone(previous: &FileRecord, created: DateTime<Utc>) -> Self {
        Self {
            hash: TOMBSTONE_HASH.to_string(),
            created,
            modified: previous.modified,
            size: previous.size,
            relative_path: previous.relative_path.clone(),
        }
    }

    /// Whether this record marks its path as deleted
    pub fn is_tombstone(&self) -> bool {
        self.hash == TOMBSTONE_HASH
    }

    /// Append this record as one journal line (including the newline)
    ///
    /// # Errors
    ///
    /// - [`IntegrityError::Serialization`] if the path contains a line break
    ///   or the hash contains the field separator
    pub fn encode_line(&self, out: &mut String) -> Result<()> {
        if self.relative_path.contains(['\n', '\r']) {
            return Err(IntegrityError::serialization(format!(
                "line break in path {:?}",
                self.relative_path
            )));
        }
        if self.hash.contains(FIELD_SEPARATOR) {
            return Err(IntegrityError::serialization(format!(
                "separator in hash of {:?}",
                self.relative_path
            )));
        }
        out.push_str(&self.hash);
        out.push(FIELD_SEPARATOR);
        out.push_str(&format_timestamp(&self.created));
        out.push(FIELD_SEPARATOR);
        out.push_str(&format_timestamp(&self.modified));
        out.push(FIELD_SEPARATOR);
        out.push_str(&self.size.to_string());
        out.push(FIELD_SEPARATOR);
        out.push_str(&self.relative_path);
        out.push('\n');
        Ok(())
    }

    /// Parse one journal line (without its newline)
    ///
    /// The error is a human readable reason; the journal attaches the line
    /// number.
    pub fn parse_line(line: &str) -> std::result::Result<Self, String> {
        let fields: Vec<&str> = line.splitn(FIELD_COUNT, FIELD_SEPARATOR).collect();
        if fields.len() != FIELD_COUNT {
            return Err(format!(
                "expected {} fields, found {}",
                FIELD_COUNT,
                fields.len()
            ));
        }
        let hash = fields[0];
        if hash.is_empty() {
            return Err("empty hash".to_string());
        }
        let created = parse_timestamp(fields[1]).map_err(|e| format!("created: {}", e))?;
        let modified = parse_timestamp(fields[2]).map_err(|e| format!("modified: {}", e))?;
        let size = fields[3]
            .parse::<u64>()
            .map_err(|e| format!("size {:?}: {}", fields[3], e))?;
        let relative_path = fields[4];
        if relative_path.is_empty() {
            return Err("empty relative path".to_string());
        }

        Ok(Self {
            hash: hash.to_string(),
            created,
            modified,
            size,
            relative_path: relative_path.to_string(),
        })
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_timestamp(s: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|ts| ts.with_timezone(&Utc))
}

/// Serialize records into journal content
pub fn encode_records<'a>(records: impl IntoIterator<Item = &'a FileRecord>) -> Result<String> {
    let mut out = String::new();
    for record in records {
        record.encode_line(&mut out)?;
    }
    Ok(out)
}

/// Parse journal content into records, in file order
///
/// Empty lines are ignored; anything else that does not parse is a
/// [`IntegrityError::MalformedRecord`].
pub fn decode_records(content: &str) -> Result<Vec<FileRecord>> {
    let mut records = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        let record = FileRecord::parse_line(line).map_err(|reason| {
            IntegrityError::MalformedRecord {
                line: idx + 1,
                reason,
            }
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Effective record per relative path
///
/// Built from a full journal by keeping, for each path, the record with the
/// greatest `created` timestamp (the earlier line wins a tie) and then
/// dropping every path whose kept record is a tombstone.
///
/// A tombstone is not final: a live record created after it revives the path,
/// wherever that record sits in the journal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsolidatedState {
    records: HashMap<String, FileRecord>,
}

impl ConsolidatedState {
    /// Consolidate a record sequence in journal order
    pub fn from_records(records: impl IntoIterator<Item = FileRecord>) -> Self {
        let mut latest: HashMap<String, FileRecord> = HashMap::new();
        for record in records {
            match latest.get(&record.relative_path) {
                Some(kept) if record.created <= kept.created => {}
                _ => {
                    latest.insert(record.relative_path.clone(), record);
                }
            }
        }
        latest.retain(|_, record| !record.is_tombstone());
        Self { records: latest }
    }

    /// Effective record for a path
    pub fn get(&self, relative_path: &str) -> Option<&FileRecord> {
        self.records.get(relative_path)
    }

    /// Whether a live record exists for a path
    pub fn contains(&self, relative_path: &str) -> bool {
        self.records.contains_key(relative_path)
    }

    /// Number of live paths
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no live path is recorded
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sum of recorded sizes
    pub fn total_bytes(&self) -> u64 {
        self.records.values().map(|r| r.size).sum()
    }

    /// Iterate over live records in arbitrary order
    pub fn iter(&self) -> impl Iterator<Item = &FileRecord> {
        self.records.values()
    }

    /// Live records sorted by relative path
    pub fn sorted(&self) -> Vec<&FileRecord> {
        let mut records: Vec<&FileRecord> = self.records.values().collect();
        records.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        records
    }

    /// Consume into live records sorted by relative path
    pub fn into_sorted(self) -> Vec<FileRecord> {
        let mut records: Vec<FileRecord> = self.records.into_values().collect();
        records.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        records
    }
}
