//! Main test module for fileintegrity
//!
//! This module includes all test suites:
//! - Integration tests for complete runs on real directories
//! - Property-based tests for journal and fingerprint invariants

pub mod integration;
pub mod property;

#[cfg(test)]
mod edge_cases {
    use ::fileintegrity::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_empty_directory() {
        let temp_dir = TempDir::new().unwrap();

        let summary = upsert(temp_dir.path(), &Options::disabled()).unwrap();
        assert_eq!(summary.new_files, 0);
        assert_eq!(summary.total_bytes, 0);
        assert!(!summary.has_changes());

        // The journal is only created once there is something to record
        let journal = Journal::new(temp_dir.path());
        assert!(journal.load().unwrap().is_empty());

        let summary = verify(temp_dir.path(), &Options::disabled()).unwrap();
        assert!(summary.is_valid());
        assert_eq!(summary.valid_files, 0);
    }

    #[test]
    fn test_special_filenames() {
        let temp_dir = TempDir::new().unwrap();

        let special_names = vec![
            "file with spaces.txt",
            "file,with,commas.txt",
            "file-with-dashes.txt",
            "file.with.dots.txt",
            "file@with#special$chars.txt",
            "file(with)parens.txt",
        ];
        let mut created = Vec::new();
        for name in &special_names {
            if fs::write(temp_dir.path().join(name), format!("Content of {}", name)).is_ok() {
                created.push(*name);
            }
        }

        let summary = upsert(temp_dir.path(), &Options::disabled()).unwrap();
        assert_eq!(summary.new_files, created.len() as u64);

        let state = Journal::new(temp_dir.path()).load_consolidated().unwrap();
        for name in &created {
            let record = state.get(name).unwrap();
            assert_eq!(record.relative_path, *name);
        }

        let summary = verify(temp_dir.path(), &Options::disabled()).unwrap();
        assert_eq!(summary.valid_files, created.len() as u64);
    }

    #[test]
    fn test_unicode_filenames() {
        let temp_dir = TempDir::new().unwrap();

        let unicode_names = vec!["файл.txt", "文件.txt", "ファイル.txt", "αρχείο.txt", "🚀🌟💾.txt"];
        let mut created = Vec::new();
        for name in &unicode_names {
            match fs::write(temp_dir.path().join(name), format!("Unicode content: {}", name)) {
                Ok(_) => created.push(*name),
                Err(_) => continue,
            }
        }
        if created.is_empty() {
            return;
        }

        upsert(temp_dir.path(), &Options::disabled()).unwrap();
        let state = Journal::new(temp_dir.path()).load_consolidated().unwrap();
        assert_eq!(state.len(), created.len());
        for name in &created {
            assert!(state.contains(name));
        }
    }

    #[test]
    fn test_junk_files_are_not_recorded() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("kept.txt"), "kept").unwrap();
        fs::write(temp_dir.path().join(".DS_Store"), "junk").unwrap();
        fs::write(temp_dir.path().join("~$report.docx"), "lock").unwrap();
        fs::create_dir(temp_dir.path().join("$RECYCLE.BIN")).unwrap();
        fs::write(temp_dir.path().join("$RECYCLE.BIN/old.txt"), "old").unwrap();

        let summary = upsert(temp_dir.path(), &Options::disabled()).unwrap();
        assert_eq!(summary.new_files, 1);
        let state = Journal::new(temp_dir.path()).load_consolidated().unwrap();
        assert!(state.contains("kept.txt"));
    }

    #[test]
    fn test_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing");
        assert!(matches!(
            upsert(&missing, &Options::disabled()),
            Err(IntegrityError::DirectoryNotFound(_))
        ));
        assert!(matches!(
            verify(temp_dir.path(), &Options::disabled()),
            Err(IntegrityError::MetadataDirMissing(_))
        ));
    }
}

#[cfg(test)]
mod stress_tests {
    use ::fileintegrity::*;
    use std::fs;
    use std::thread;
    use tempfile::TempDir;

    #[test]
    fn test_small_flush_threshold() {
        let temp_dir = TempDir::new().unwrap();
        for i in 0..200 {
            fs::write(
                temp_dir.path().join(format!("file_{:03}.txt", i)),
                format!("content {}", i),
            )
            .unwrap();
        }

        let store = IntegrityStore::builder()
            .parallel_workers(3)
            .flush_threshold_bytes(64)
            .queue_capacities(1, 1)
            .build(temp_dir.path().to_path_buf())
            .unwrap();
        let summary = store.upsert(&Options::disabled()).unwrap();
        assert_eq!(summary.new_files, 200);

        // Compaction leaves exactly one line per file
        let lines = store.journal().load().unwrap();
        assert_eq!(lines.len(), 200);
        assert!(store.verify(&Options::disabled()).unwrap().is_valid());
    }

    #[test]
    fn test_independent_stores_in_parallel() {
        let dirs: Vec<TempDir> = (0..4).map(|_| TempDir::new().unwrap()).collect();
        for (n, dir) in dirs.iter().enumerate() {
            for i in 0..50 {
                fs::write(dir.path().join(format!("{}_{}.txt", n, i)), format!("{} {}", n, i)).unwrap();
            }
        }

        thread::scope(|scope| {
            for dir in &dirs {
                scope.spawn(move || {
                    let summary = upsert(dir.path(), &Options::disabled()).unwrap();
                    assert_eq!(summary.new_files, 50);
                    assert!(verify(dir.path(), &Options::disabled()).unwrap().is_valid());
                });
            }
        });
    }
}

// Re-export test utilities for use in integration tests
pub use integration::IntegrityTestHarness;
