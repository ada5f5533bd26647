//! Property-based testing for fileintegrity
//!
//! Uses proptest to check journal consolidation and fingerprint analysis
//! against straightforward models, plus disk-level invariants of upsert.

use ::fileintegrity::fingerprint::{find_contained, find_duplicates};
use ::fileintegrity::record::{decode_records, encode_records};
use ::fileintegrity::*;
use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use tempfile::TempDir;

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// Journal paths, commas and spaces included
fn path_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-c]{1,2}",
        "[a-c]/[a-c]{1,2}\\.txt",
        "[a-c], [a-c]\\.md",
    ]
}

fn record_strategy() -> impl Strategy<Value = FileRecord> {
    (
        path_strategy(),
        prop_oneof![4 => "[0-9a-f]{4}".prop_map(|h| h.repeat(16)), 1 => Just(TOMBSTONE_HASH.to_string())],
        0i64..20,
        0u64..1_000,
    )
        .prop_map(|(path, hash, offset, size)| FileRecord {
            hash,
            created: base_time() + Duration::seconds(offset),
            modified: base_time(),
            size,
            relative_path: path,
        })
}

/// Reference consolidation: last-created record per path, first on ties
fn model_consolidate(records: &[FileRecord]) -> BTreeMap<String, FileRecord> {
    let mut latest: BTreeMap<String, FileRecord> = BTreeMap::new();
    for record in records {
        match latest.get(&record.relative_path) {
            Some(kept) if kept.created >= record.created => {}
            _ => {
                latest.insert(record.relative_path.clone(), record.clone());
            }
        }
    }
    latest.retain(|_, record| !record.is_tombstone());
    latest
}

fn fingerprint_records() -> impl Strategy<Value = Vec<FileRecord>> {
    prop::collection::btree_map("[a-e]/[a-e]{1,3}", (0u8..4, 99u64..104), 0..30).prop_map(|files| {
        files
            .into_iter()
            .map(|(path, (content, size))| FileRecord {
                hash: format!("{:064x}", content),
                created: base_time(),
                modified: base_time(),
                size,
                relative_path: path,
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn prop_consolidation_matches_model(records in prop::collection::vec(record_strategy(), 0..40)) {
        let state = ConsolidatedState::from_records(records.clone());
        let model = model_consolidate(&records);

        prop_assert_eq!(state.len(), model.len());
        for (path, expected) in &model {
            prop_assert_eq!(state.get(path), Some(expected));
        }
        prop_assert!(state.iter().all(|record| !record.is_tombstone()));
    }

    #[test]
    fn prop_compacted_lines_reload_to_same_state(records in prop::collection::vec(record_strategy(), 0..40)) {
        let state = ConsolidatedState::from_records(records);
        let sorted = state.clone().into_sorted();
        let text = encode_records(&sorted).unwrap();
        let reloaded = decode_records(&text).unwrap();

        prop_assert_eq!(&reloaded, &sorted);
        prop_assert_eq!(ConsolidatedState::from_records(reloaded), state);
        let paths: Vec<_> = sorted.iter().map(|r| r.relative_path.clone()).collect();
        let mut expected = paths.clone();
        expected.sort();
        prop_assert_eq!(paths, expected);
    }

    #[test]
    fn prop_duplicates_partition_each_group(records in fingerprint_records()) {
        let filter = NoiseFilter::default();
        let index = FingerprintIndex::build(&records, &filter);
        let report = find_duplicates(&index);

        // Exactly one survivor per fingerprint: duplicates are everything else
        let kept: Vec<_> = records.iter().filter(|r| !filter.is_noise(r)).collect();
        let distinct: BTreeSet<_> = kept.iter().map(|r| FingerprintKey::from(*r)).collect();
        prop_assert_eq!(report.duplicate_files, (kept.len() - distinct.len()) as u64);

        for group in &report.groups {
            prop_assert!(group.records.len() > 1);
            prop_assert!(group.records.iter().all(|r| FingerprintKey::from(r) == group.key));
            let paths = group.paths();
            let mut sorted = paths.clone();
            sorted.sort();
            prop_assert_eq!(paths, sorted);
        }
    }

    #[test]
    fn prop_containment_never_keeps_base_content(
        base in fingerprint_records(),
        external in fingerprint_records(),
    ) {
        let filter = NoiseFilter::default();
        let base_index = FingerprintIndex::build(&base, &filter);
        let external_index = FingerprintIndex::build(&external, &filter);
        let report = find_contained(&base_index, external_index.clone());

        for group in &report.contained {
            prop_assert!(base_index.contains_key(&group.key));
        }
        for group in &report.duplicates.groups {
            prop_assert!(!base_index.contains_key(&group.key));
        }

        // After removing every candidate, each remaining fingerprint is unique
        // and none of them exists in the base
        let candidates: BTreeSet<&str> = report.removal_candidates().into_iter().collect();
        let mut survivors = BTreeSet::new();
        for record in external.iter().filter(|r| !filter.is_noise(r)) {
            if candidates.contains(record.relative_path.as_str()) {
                continue;
            }
            let key = FingerprintKey::from(record);
            prop_assert!(!base_index.contains_key(&key));
            prop_assert!(survivors.insert(key));
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_upsert_journal_matches_disk(
        files in prop::collection::btree_map("[a-c]/[a-d]{1,3}\\.txt", "[a-z]{0,20}", 0..12),
        removed in prop::collection::vec(any::<prop::sample::Index>(), 0..4),
    ) {
        let temp_dir = TempDir::new().unwrap();
        for (path, content) in &files {
            let full = temp_dir.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, content).unwrap();
        }
        upsert(temp_dir.path(), &Options::disabled()).unwrap();

        let mut remaining = files.clone();
        if !files.is_empty() {
            let paths: Vec<_> = files.keys().cloned().collect();
            for index in &removed {
                let path = index.get(&paths);
                if remaining.remove(path).is_some() {
                    fs::remove_file(temp_dir.path().join(path)).unwrap();
                }
            }
        }
        let summary = upsert(temp_dir.path(), &Options::disabled()).unwrap();
        prop_assert_eq!(summary.deleted_files, (files.len() - remaining.len()) as u64);

        let records = Journal::new(temp_dir.path()).load().unwrap();
        let journal_paths: Vec<_> = records.iter().map(|r| r.relative_path.clone()).collect();
        let disk_paths: Vec<_> = remaining.keys().cloned().collect();
        prop_assert_eq!(journal_paths, disk_paths);
        for record in &records {
            prop_assert_eq!(&record.hash, &utils::hash_data(remaining[&record.relative_path].as_bytes()));
        }

        let summary = verify(temp_dir.path(), &Options::disabled()).unwrap();
        prop_assert!(summary.is_valid());
        prop_assert_eq!(summary.valid_files, remaining.len() as u64);
    }
}
