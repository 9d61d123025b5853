//! Snapshot save/load, and recovery from damaged snapshots.

use std::collections::BTreeSet;
use std::fs;

use crate::common::{create_test_index, hashing, reopen, sample_documents, test_settings};
use lexvec::semantic::{IndexPersistence, MANIFEST_FILE_NAME, METADATA_FILE_NAME};
use lexvec::vector::VECTOR_FILE_NAME;
use lexvec::{DocumentIndex, SlotId};
use tempfile::TempDir;

fn active_ids(index: &DocumentIndex) -> BTreeSet<String> {
    index.document_ids().into_iter().collect()
}

#[test]
fn test_round_trip_preserves_count_ids_and_vectors() {
    let (index, dir) = create_test_index();
    for doc in sample_documents::legal_corpus() {
        index
            .add_document(&doc.id, &doc.content, doc.metadata)
            .unwrap();
    }
    index.remove_document("case-002").unwrap();
    index.save().unwrap();

    let before_stats = index.stats();
    let before_ids = active_ids(&index);
    let before_vectors: Vec<Vec<f32>> = (0..before_stats.count)
        .map(|i| index.reconstruct(SlotId::new(i as u32)).unwrap())
        .collect();
    drop(index);

    let loaded = reopen(&dir);
    assert_eq!(loaded.stats(), before_stats);
    assert_eq!(active_ids(&loaded), before_ids);
    for (i, expected) in before_vectors.iter().enumerate() {
        let actual = loaded.reconstruct(SlotId::new(i as u32)).unwrap();
        for (a, b) in actual.iter().zip(expected) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    // Tombstones survive the round trip
    let results = loaded
        .similarity_search(&sample_documents::legal_corpus()[1].content, 5, None)
        .unwrap();
    assert!(results.iter().all(|r| r.document_id != "case-002"));
}

#[test]
fn test_metadata_round_trip() {
    let (index, dir) = create_test_index();
    let doc = sample_documents::legal_corpus().remove(2);
    let mut metadata = doc.metadata.clone();
    metadata.doc_type = "statute".to_string();
    metadata.jurisdiction = "US".to_string();
    metadata.citations = vec!["U.C.C. § 2-201".to_string()];
    metadata
        .tags
        .insert("effective".to_string(), serde_json::json!(1952));
    index
        .add_document(&doc.id, &doc.content, metadata.clone())
        .unwrap();
    drop(index);

    let loaded = reopen(&dir);
    assert_eq!(loaded.document(&doc.id).unwrap().metadata, metadata);
}

#[test]
fn test_snapshot_artifacts_written() {
    let (index, dir) = create_test_index();
    index
        .add_document("a", "text", Default::default())
        .unwrap();

    let base = dir.path().join("index");
    assert!(base.join(VECTOR_FILE_NAME).exists());
    assert!(base.join(METADATA_FILE_NAME).exists());
    assert!(base.join(MANIFEST_FILE_NAME).exists());

    // No temp files left behind by the atomic writes
    let leftovers: Vec<_> = fs::read_dir(&base)
        .unwrap()
        .filter_map(Result::ok)
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| {
            ![VECTOR_FILE_NAME, METADATA_FILE_NAME, MANIFEST_FILE_NAME].contains(&name.as_str())
        })
        .collect();
    assert!(leftovers.is_empty(), "unexpected files: {leftovers:?}");
}

#[test]
fn test_truncated_vector_file_falls_back_to_empty() {
    let (index, dir) = create_test_index();
    for doc in sample_documents::recipes_and_contracts() {
        index
            .add_document(&doc.id, &doc.content, doc.metadata)
            .unwrap();
    }
    drop(index);

    let vectors = dir.path().join("index").join(VECTOR_FILE_NAME);
    let bytes = fs::read(&vectors).unwrap();
    fs::write(&vectors, &bytes[..bytes.len() - 7]).unwrap();

    let persistence = IndexPersistence::new(dir.path().join("index"));
    assert!(persistence.load().is_err());

    let recovered = reopen(&dir);
    assert_eq!(recovered.stats().count, 0);

    // The recovered index is usable and its first save replaces the damage
    recovered
        .add_document("fresh", "rebuilt after corruption", Default::default())
        .unwrap();
    drop(recovered);
    assert_eq!(reopen(&dir).stats().active_count, 1);
}

#[test]
fn test_metadata_pointing_past_index_is_rejected() {
    let (index, dir) = create_test_index();
    index
        .add_document("a", "only document", Default::default())
        .unwrap();
    drop(index);

    let base = dir.path().join("index");
    fs::remove_file(base.join(MANIFEST_FILE_NAME)).unwrap();
    fs::write(
        base.join(METADATA_FILE_NAME),
        r#"{"0": {"document_id": "a"}, "5": {"document_id": "ghost"}}"#,
    )
    .unwrap();

    let persistence = IndexPersistence::new(&base);
    let err = persistence.load().unwrap_err();
    assert_eq!(err.status_code(), "CORRUPT_STATE");
    assert_eq!(reopen(&dir).stats().count, 0);
}

#[test]
fn test_interrupted_save_is_detected() {
    let (index, dir) = create_test_index();
    index
        .add_document("a", "first document", Default::default())
        .unwrap();
    let base = dir.path().join("index");
    let old_metadata = fs::read(base.join(METADATA_FILE_NAME)).unwrap();
    let old_manifest = fs::read(base.join(MANIFEST_FILE_NAME)).unwrap();

    index
        .add_document("b", "second document", Default::default())
        .unwrap();
    drop(index);

    // Crash after the vector file was renamed but before the others were
    fs::write(base.join(METADATA_FILE_NAME), old_metadata).unwrap();
    fs::write(base.join(MANIFEST_FILE_NAME), old_manifest).unwrap();

    assert!(IndexPersistence::new(&base).load().is_err());
}

#[test]
fn test_missing_directory_is_a_fresh_index() {
    let dir = TempDir::new().unwrap();
    let index = DocumentIndex::open(hashing(), &test_settings(dir.path())).unwrap();
    assert_eq!(index.stats().count, 0);
    assert!(!index.is_dirty());
}

#[test]
fn test_non_finite_vector_on_disk_is_rejected() {
    let (index, dir) = create_test_index();
    index
        .add_document("a", "contract law basics", Default::default())
        .unwrap();
    index
        .add_document("b", "apple pie recipe", Default::default())
        .unwrap();
    index.remove_document("b").unwrap();
    drop(index);

    // First value of slot 1, the tombstoned vector
    let vectors = dir.path().join("index").join(VECTOR_FILE_NAME);
    let mut bytes = fs::read(&vectors).unwrap();
    let offset = 28 + 384 * 4;
    bytes[offset..offset + 4].copy_from_slice(&f32::NAN.to_le_bytes());
    fs::write(&vectors, bytes).unwrap();

    let err = IndexPersistence::new(dir.path().join("index"))
        .load()
        .unwrap_err();
    assert_eq!(err.status_code(), "CORRUPT_STATE");

    let recovered = reopen(&dir);
    assert_eq!(recovered.stats().count, 0);
}
