//! Full rebuilds: reclamation, all-or-nothing failure, cancellation.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use crate::common::{FlakyEncoder, create_test_index, reopen, sample_documents, test_settings};
use lexvec::{DocumentIndex, IndexError, SourceDocument};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

#[test]
fn test_reindex_reclaims_tombstones() {
    let (index, _dir) = create_test_index();
    let docs = sample_documents::legal_corpus();
    for doc in &docs {
        index
            .add_document(&doc.id, &doc.content, doc.metadata.clone())
            .unwrap();
    }
    index.remove_document("case-001").unwrap();
    index
        .update_document("case-002", "negligence per se", Default::default())
        .unwrap();
    assert_eq!(index.stats().tombstone_count, 2);

    let authoritative: Vec<SourceDocument> = docs[1..].to_vec();
    let report = index.reindex_all(&authoritative).unwrap();

    assert_eq!(report.documents, authoritative.len());
    assert_eq!(report.previous_count, 6);
    assert_eq!(report.reclaimed, 2);
    assert!(report.persisted);

    let stats = index.stats();
    assert_eq!(stats.count, authoritative.len());
    assert_eq!(stats.active_count, authoritative.len());
    assert_eq!(stats.tombstone_count, 0);

    // The reindexed text replaced the update
    let results = index
        .similarity_search(&docs[1].content, 1, None)
        .unwrap();
    assert_eq!(results[0].document_id, "case-002");
    assert!((results[0].score - 1.0).abs() < 1e-5);
}

#[test]
fn test_reindex_is_persisted() {
    let (index, dir) = create_test_index();
    index
        .add_document("old", "will be dropped", Default::default())
        .unwrap();

    index
        .reindex_all(&sample_documents::recipes_and_contracts())
        .unwrap();
    drop(index);

    let reopened = reopen(&dir);
    assert!(!reopened.contains("old"));
    assert_eq!(reopened.stats().count, 3);
}

#[test]
fn test_encoder_failure_keeps_live_index() {
    let dir = TempDir::new().unwrap();
    let settings = test_settings(dir.path());
    let index = DocumentIndex::open(Arc::new(FlakyEncoder::new("POISON")), &settings).unwrap();
    for doc in sample_documents::recipes_and_contracts() {
        index
            .add_document(&doc.id, &doc.content, doc.metadata)
            .unwrap();
    }
    let before = index.stats();

    let mut docs = sample_documents::legal_corpus();
    docs.push(SourceDocument::new("bad", "this text is POISON to the model"));

    let err = index.reindex_all(&docs).unwrap_err();
    assert!(matches!(err, IndexError::Encoding { .. }));
    assert_eq!(index.stats(), before);
    assert!(index.contains("b"));
    assert!(!index.contains("case-001"));

    // The snapshot on disk is untouched as well
    drop(index);
    let reopened = DocumentIndex::open(Arc::new(FlakyEncoder::new("POISON")), &settings).unwrap();
    assert_eq!(reopened.stats(), before);
}

#[test]
fn test_cancelled_before_start_encodes_nothing() {
    let dir = TempDir::new().unwrap();
    let encoder = Arc::new(FlakyEncoder::new("POISON"));
    let index = DocumentIndex::open(encoder.clone(), &test_settings(dir.path())).unwrap();
    index
        .add_document("keep", "existing document", Default::default())
        .unwrap();
    let calls_before = encoder.calls.load(Ordering::SeqCst);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = index
        .reindex_all_with_cancel(&sample_documents::legal_corpus(), &cancel)
        .unwrap_err();

    assert!(matches!(err, IndexError::Cancelled { .. }));
    assert_eq!(encoder.calls.load(Ordering::SeqCst), calls_before);
    assert!(index.contains("keep"));
    assert_eq!(index.stats().count, 1);
}

#[test]
fn test_invalid_metadata_aborts_reindex() {
    let (index, _dir) = create_test_index();
    index
        .add_document("keep", "existing document", Default::default())
        .unwrap();

    let mut docs = sample_documents::legal_corpus();
    docs[3].metadata.citations.push("   ".to_string());

    let err = index.reindex_all(&docs).unwrap_err();
    assert!(matches!(err, IndexError::Validation { field: "citations", .. }));
    assert!(index.contains("keep"));
}

#[test]
fn test_reindex_from_json_input() {
    let (index, _dir) = create_test_index();
    let json = r#"[
        {"id": "d1", "content": "summary judgment standard", "title": "Celotex", "type": "case_law", "jurisdiction": "US", "date": "1986-06-25", "citations": ["477 U.S. 317"]},
        {"id": "d2", "content": "motion to dismiss plausibility", "title": "Twombly", "date": ""}
    ]"#;
    let docs: Vec<SourceDocument> = serde_json::from_str(json).unwrap();

    index.reindex_all(&docs).unwrap();

    let entry = index.document("d1").unwrap();
    assert_eq!(entry.metadata.doc_type, "case_law");
    assert_eq!(entry.metadata.citations, vec!["477 U.S. 317"]);
    assert!(index.document("d2").unwrap().metadata.date.is_none());
}
