//! Integration tests for fileintegrity
//!
//! Runs every operation against real directories and checks the journal,
//! the run logs and the files left on disk.

use ::fileintegrity::layout;
use ::fileintegrity::*;
use filetime::{set_file_mtime, FileTime};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Sample tree used by most tests, with the SHA-256 of each content
pub const SAMPLE_FILES: &[(&str, &str, &str)] = &[
    (
        "a/a1.txt",
        "a1 sample txt",
        "85b883632e34f9f140915c79f1f4d131f50784a1077c0b1516e38fe226f72301",
    ),
    (
        "a/a2.txt",
        "a2 sample txt",
        "2592c50e3d57402c5b5f2293bb2a52dfb38bfc91ae1c9a1f2452b798d53bf7c6",
    ),
    (
        "b/b1.md",
        "b1 sample md",
        "d64783f26f53c1e668cc75b30f29a89b42e0d19ddddb93bffa1fce509a139922",
    ),
    (
        "b/b2.md",
        "b2 sample md",
        "f59d71f706fb095ce60a3babaf1e5cd65521154ab6854b31d0eb93e678ecddc6",
    ),
    (
        "b/bb/bb1.md",
        "bb1 sample md",
        "ff6464b4321e5d9b09ae7cb7ba219cee688099f232ef5b978be5f7c94083cc4b",
    ),
];

/// Test harness owning one tracked directory
pub struct IntegrityTestHarness {
    pub temp_dir: TempDir,
}

impl IntegrityTestHarness {
    /// Empty tracked directory
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
        }
    }

    /// Directory holding [`SAMPLE_FILES`]
    pub fn with_samples() -> Self {
        let harness = Self::new();
        for (path, content, _) in SAMPLE_FILES {
            harness.write(path, content.as_bytes());
        }
        harness
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root().join(relative)
    }

    pub fn write(&self, relative: &str, content: &[u8]) {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    pub fn journal(&self) -> Journal {
        Journal::new(self.root())
    }

    /// Files of the metadata directory whose name ends with `suffix`
    pub fn metadata_files(&self, suffix: &str) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = fs::read_dir(layout::metadata_dir(self.root()))
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .map(|name| name.ends_with(suffix))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();
        files
    }

    /// Every line of every log of `category`
    pub fn log_lines(&self, category: &str) -> Vec<String> {
        self.metadata_files(&format!(".{}.log", category))
            .iter()
            .flat_map(|path| {
                fs::read_to_string(path)
                    .unwrap()
                    .lines()
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Log lines of `category` carrying the `operation` column
    pub fn log_operations(&self, category: &str, operation: &str) -> Vec<String> {
        let marker = format!("  {}  ", operation);
        self.log_lines(category)
            .into_iter()
            .filter(|line| line.contains(&marker))
            .collect()
    }
}

impl Default for IntegrityTestHarness {
    fn default() -> Self {
        Self::new()
    }
}

fn file_only() -> Options {
    Options {
        log_to_console: false,
        log_to_file: true,
        backup_before_run: false,
        show_progress: false,
    }
}

#[test]
fn test_upsert_records_every_file() {
    let harness = IntegrityTestHarness::with_samples();

    let summary = upsert(harness.root(), &file_only()).unwrap();
    assert_eq!(summary.new_files, 5);
    assert_eq!(summary.updated_files, 0);
    assert_eq!(summary.deleted_files, 0);
    assert_eq!(summary.skipped_files, 0);
    assert_eq!(summary.failed_files, 0);
    let total: u64 = SAMPLE_FILES.iter().map(|(_, c, _)| c.len() as u64).sum();
    assert_eq!(summary.total_bytes, total);
    assert_eq!(summary.hashed_bytes, total);

    // Compacted journal: one line per file, sorted by path
    let records = harness.journal().load().unwrap();
    assert_eq!(records.len(), SAMPLE_FILES.len());
    for (record, (path, content, hash)) in records.iter().zip(SAMPLE_FILES) {
        assert_eq!(record.relative_path, *path);
        assert_eq!(record.hash, *hash);
        assert_eq!(record.size, content.len() as u64);
    }

    assert_eq!(harness.log_operations("upsert", "NEW").len(), 5);
    let lines = harness.log_lines("upsert");
    assert!(lines.iter().any(|l| l.starts_with("//// Upsert Summary ")));
}

#[test]
fn test_journal_is_plain_text() {
    let harness = IntegrityTestHarness::with_samples();
    upsert(harness.root(), &Options::disabled()).unwrap();

    let content = fs::read_to_string(layout::journal_path(harness.root())).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 5);
    for (line, (path, content, hash)) in lines.iter().zip(SAMPLE_FILES) {
        let fields: Vec<&str> = line.splitn(5, ',').collect();
        assert_eq!(fields.len(), 5);
        assert_eq!(fields[0], *hash);
        assert!(fields[1].ends_with('Z'));
        assert_eq!(fields[3], content.len().to_string());
        assert_eq!(fields[4], *path);
    }
}

#[test]
fn test_upsert_is_idempotent() {
    let harness = IntegrityTestHarness::with_samples();
    upsert(harness.root(), &Options::disabled()).unwrap();

    let journal_path = layout::journal_path(harness.root());
    let content_before = fs::read(&journal_path).unwrap();
    let mtime_before = fs::metadata(&journal_path).unwrap().modified().unwrap();

    let summary = upsert(harness.root(), &Options::disabled()).unwrap();
    assert_eq!(summary.skipped_files, 5);
    assert_eq!(summary.new_files, 0);
    assert_eq!(summary.hashed_bytes, 0);
    assert!(!summary.has_changes());

    assert_eq!(fs::read(&journal_path).unwrap(), content_before);
    assert_eq!(
        fs::metadata(&journal_path).unwrap().modified().unwrap(),
        mtime_before
    );
}

#[test]
fn test_upsert_detects_update_and_delete() {
    let harness = IntegrityTestHarness::with_samples();
    upsert(harness.root(), &file_only()).unwrap();

    harness.write("a/a1.txt", b"changed content");
    fs::remove_file(harness.path("b/b2.md")).unwrap();

    let summary = upsert(harness.root(), &file_only()).unwrap();
    assert_eq!(summary.updated_files, 1);
    assert_eq!(summary.deleted_files, 1);
    assert_eq!(summary.skipped_files, 3);
    assert_eq!(summary.new_files, 0);

    let state = harness.journal().load_consolidated().unwrap();
    assert_eq!(state.len(), 4);
    assert!(!state.contains("b/b2.md"));
    assert_eq!(
        state.get("a/a1.txt").unwrap().hash,
        "b92d13bbe02db7ca7686a8e7b854de49c7455948c05cf91a47044278395e212e"
    );
    // Tombstones do not survive compaction
    assert_eq!(harness.journal().load().unwrap().len(), 4);

    let updates = harness.log_operations("upsert", "UPDATE");
    assert_eq!(updates.len(), 1);
    assert!(updates[0].ends_with("  UPDATE  a/a1.txt"));
    let deletes = harness.log_operations("upsert", "DELETE");
    assert_eq!(deletes.len(), 1);
    assert!(deletes[0].ends_with("  DELETE  b/b2.md"));
}

#[test]
fn test_upsert_rehashes_touched_file() {
    let harness = IntegrityTestHarness::with_samples();
    upsert(harness.root(), &Options::disabled()).unwrap();

    // Same content, new modification time
    set_file_mtime(harness.path("b/b1.md"), FileTime::from_unix_time(1_000_000_000, 0)).unwrap();

    let summary = upsert(harness.root(), &Options::disabled()).unwrap();
    assert_eq!(summary.updated_files, 1);
    assert_eq!(summary.skipped_files, 4);

    let record = harness
        .journal()
        .load_consolidated()
        .unwrap()
        .get("b/b1.md")
        .cloned()
        .unwrap();
    assert_eq!(record.modified.timestamp(), 1_000_000_000);
    assert_eq!(
        record.hash,
        "d64783f26f53c1e668cc75b30f29a89b42e0d19ddddb93bffa1fce509a139922"
    );
}

#[test]
fn test_upsert_reads_interrupted_journal() {
    let harness = IntegrityTestHarness::with_samples();
    upsert(harness.root(), &Options::disabled()).unwrap();

    // An interrupted run leaves appended records and tombstones behind
    let journal = harness.journal();
    let previous = journal.load_consolidated().unwrap().get("a/a2.txt").cloned().unwrap();
    journal
        .append(&[FileRecord::tombstone(&previous, chrono::Utc::now())])
        .unwrap();
    assert_eq!(journal.load().unwrap().len(), 6);
    assert!(!journal.load_consolidated().unwrap().contains("a/a2.txt"));

    // The next run sees the file again and records it as new
    let summary = upsert(harness.root(), &Options::disabled()).unwrap();
    assert_eq!(summary.new_files, 1);
    assert_eq!(journal.load().unwrap().len(), 5);
}

#[test]
fn test_verify_valid_tree() {
    let harness = IntegrityTestHarness::with_samples();
    upsert(harness.root(), &Options::disabled()).unwrap();

    let summary = verify(harness.root(), &file_only()).unwrap();
    assert!(summary.is_valid());
    assert_eq!(summary.valid_files, 5);
    assert_eq!(summary.invalid_files, 0);

    let ok = harness.log_operations("verify", "OK");
    assert_eq!(ok.len(), 5);
    assert!(harness.log_operations("verify", "ERROR").is_empty());
}

#[test]
fn test_verify_reports_each_failure_kind() {
    let harness = IntegrityTestHarness::with_samples();
    upsert(harness.root(), &Options::disabled()).unwrap();
    let journal_before = fs::read(layout::journal_path(harness.root())).unwrap();

    fs::remove_file(harness.path("a/a2.txt")).unwrap();
    harness.write("b/b1.md", b"b1 sample md, but longer");
    // Same size, different content
    harness.write("a/a1.txt", b"a1 sample TXT");

    let summary = verify(harness.root(), &file_only()).unwrap();
    assert!(!summary.is_valid());
    assert_eq!(summary.valid_files, 2);
    assert_eq!(summary.invalid_files, 3);
    assert!((summary.invalid_percentage() - 60.0).abs() < 1e-9);

    let errors = harness.log_operations("verify", "ERROR");
    assert_eq!(errors.len(), 3);
    let reason = |path: &str| {
        errors
            .iter()
            .find(|line| line.contains(&format!("  {}  ", path)))
            .cloned()
            .unwrap()
    };
    assert!(reason("a/a2.txt").ends_with("file does not exist"));
    assert!(reason("b/b1.md").ends_with("file size different"));
    assert!(reason("a/a1.txt").ends_with("file hash different"));

    // Verification never touches the journal
    assert_eq!(
        fs::read(layout::journal_path(harness.root())).unwrap(),
        journal_before
    );
}

#[test]
fn test_disabled_logs_create_no_file() {
    let harness = IntegrityTestHarness::with_samples();
    upsert(harness.root(), &Options::disabled()).unwrap();
    verify(harness.root(), &Options::disabled()).unwrap();
    find_duplicates(harness.root(), &Options::disabled()).unwrap();

    assert!(harness.metadata_files(".log").is_empty());
}

#[test]
fn test_backup_before_upsert() {
    let harness = IntegrityTestHarness::with_samples();

    // Nothing to back up on the first run
    upsert(harness.root(), &Options::disabled().with_backup()).unwrap();
    assert!(harness.metadata_files(".zip").is_empty());

    harness.write("c/new.txt", b"new");
    upsert(harness.root(), &Options::disabled().with_backup()).unwrap();
    let archives = harness.metadata_files(".zip");
    assert_eq!(archives.len(), 1);

    let mut archive = zip::ZipArchive::new(fs::File::open(&archives[0]).unwrap()).unwrap();
    assert_eq!(archive.len(), 1);
    let mut content = String::new();
    std::io::Read::read_to_string(&mut archive.by_index(0).unwrap(), &mut content).unwrap();
    assert_eq!(content.lines().count(), 5);
    assert!(!content.contains("c/new.txt"));
}

#[test]
fn test_find_duplicates() {
    let harness = IntegrityTestHarness::new();
    let big = vec![b'x'; 500];
    let other = vec![b'y'; 300];
    harness.write("one/big.bin", &big);
    harness.write("two/big copy.bin", &big);
    harness.write("two/big copy 2.bin", &big);
    harness.write("other.bin", &other);
    // Small and version-control files are not analysed
    harness.write("small1.txt", b"tiny");
    harness.write("small2.txt", b"tiny");
    harness.write("repo/.git/objects/aa", &other);
    upsert(harness.root(), &Options::disabled()).unwrap();

    let summary = find_duplicates(harness.root(), &file_only()).unwrap();
    assert_eq!(summary.total_files, 7);
    assert_eq!(summary.duplicate_files, 2);
    assert_eq!(summary.duplicate_bytes, 1000);

    let lines = harness.log_lines("duplicate");
    let header = lines
        .iter()
        .position(|line| line.starts_with("DUPLICATE "))
        .unwrap();
    assert_eq!(lines[header + 1], "one/big.bin");
    assert_eq!(lines[header + 2], "two/big copy 2.bin");
    assert_eq!(lines[header + 3], "two/big copy.bin");
    assert_eq!(
        lines.iter().filter(|l| l.starts_with("DUPLICATE ")).count(),
        1
    );
}

fn containment_fixture() -> (IntegrityTestHarness, IntegrityTestHarness) {
    let base = IntegrityTestHarness::new();
    let external = IntegrityTestHarness::new();
    let shared = vec![b's'; 200];
    let twin = vec![b't'; 300];
    let unique = vec![b'u'; 400];

    base.write("archive/shared.bin", &shared);
    external.write("inbox/shared copy.bin", &shared);
    external.write("inbox/twin a.bin", &twin);
    external.write("inbox/twin b.bin", &twin);
    external.write("inbox/unique.bin", &unique);
    upsert(base.root(), &Options::disabled()).unwrap();
    (base, external)
}

#[test]
fn test_find_contained_reports_only() {
    let (base, external) = containment_fixture();

    let summary = find_contained(base.root(), external.root(), false, &file_only()).unwrap();
    assert_eq!(summary.total_files, 4);
    assert_eq!(summary.contained_files, 1);
    assert_eq!(summary.contained_bytes, 200);
    assert_eq!(summary.duplicate_files, 1);
    assert_eq!(summary.duplicate_bytes, 300);
    assert_eq!(summary.removed_files, 0);

    for path in ["inbox/shared copy.bin", "inbox/twin a.bin", "inbox/twin b.bin", "inbox/unique.bin"] {
        assert!(external.path(path).exists());
    }

    // The external directory was upserted and its journal backed up
    assert_eq!(external.journal().load().unwrap().len(), 4);

    // Contained blocks come before duplicate blocks, in the base's log
    let lines = base.log_lines("contained");
    let contained = lines.iter().position(|l| l.starts_with("CONTAINED ")).unwrap();
    let duplicate = lines.iter().position(|l| l.starts_with("DUPLICATE ")).unwrap();
    assert!(contained < duplicate);
    assert_eq!(lines[contained + 1], "inbox/shared copy.bin");
    assert_eq!(lines[duplicate + 1], "inbox/twin a.bin");
    assert_eq!(lines[duplicate + 2], "inbox/twin b.bin");
}

#[test]
fn test_find_contained_fix_removes_external_files_only() {
    let (base, external) = containment_fixture();

    let summary = find_contained(base.root(), external.root(), true, &Options::disabled()).unwrap();
    assert_eq!(summary.removed_files, 2);

    assert!(!external.path("inbox/shared copy.bin").exists());
    assert!(external.path("inbox/twin a.bin").exists());
    assert!(!external.path("inbox/twin b.bin").exists());
    assert!(external.path("inbox/unique.bin").exists());
    assert!(base.path("archive/shared.bin").exists());

    // A second pass finds nothing left to remove
    let summary = find_contained(base.root(), external.root(), true, &Options::disabled()).unwrap();
    assert_eq!(summary.contained_files, 0);
    assert_eq!(summary.duplicate_files, 0);
    assert_eq!(summary.removed_files, 0);
    assert!(base.path("archive/shared.bin").exists());
}

#[test]
fn test_find_contained_requires_tracked_base() {
    let base = IntegrityTestHarness::new();
    let external = IntegrityTestHarness::with_samples();
    assert!(matches!(
        find_contained(base.root(), external.root(), true, &Options::disabled()),
        Err(IntegrityError::MetadataDirMissing(_))
    ));
    for (path, _, _) in SAMPLE_FILES {
        assert!(external.path(path).exists());
    }
}
