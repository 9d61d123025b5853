//! Add, update, remove, and search through the public `DocumentIndex` API.

use crate::common::{create_test_index, sample_documents};
use lexvec::{DocumentMetadata, IndexError, SlotId};

#[test]
fn test_count_and_reconstruct_after_adds() {
    let (index, _dir) = create_test_index();
    let docs = sample_documents::legal_corpus();

    for doc in &docs {
        index
            .add_document(&doc.id, &doc.content, doc.metadata.clone())
            .unwrap();
    }

    assert_eq!(index.stats().count, docs.len());
    for (i, _) in docs.iter().enumerate() {
        let vector = index.reconstruct(SlotId::new(i as u32)).unwrap();
        assert_eq!(vector.len(), 384);
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5, "stored vectors are unit length");
    }

    assert!(matches!(
        index.reconstruct(SlotId::new(docs.len() as u32)),
        Err(IndexError::SlotOutOfRange { .. })
    ));
}

#[test]
fn test_document_finds_itself_first() {
    let (index, _dir) = create_test_index();
    for doc in sample_documents::legal_corpus() {
        index
            .add_document(&doc.id, &doc.content, doc.metadata)
            .unwrap();
    }

    for doc in sample_documents::legal_corpus() {
        let results = index.similarity_search(&doc.content, 1, None).unwrap();
        assert_eq!(results[0].document_id, doc.id);
        assert!(
            (results[0].score - 1.0).abs() < 1e-5,
            "self-match score was {}",
            results[0].score
        );
    }
}

#[test]
fn test_remove_then_search_never_returns_removed() {
    let (index, _dir) = create_test_index();
    for doc in sample_documents::recipes_and_contracts() {
        index
            .add_document(&doc.id, &doc.content, doc.metadata)
            .unwrap();
    }

    let results = index.similarity_search("contract law", 2, None).unwrap();
    assert_eq!(results[0].document_id, "b");
    assert_eq!(results[0].metadata.title, "Contracts 101");

    index.remove_document("b").unwrap();

    let results = index.similarity_search("contract law", 2, None).unwrap();
    let mut ids: Vec<&str> = results.iter().map(|r| r.document_id.as_str()).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec!["a", "c"]);
}

#[test]
fn test_threshold_above_maximum_returns_empty() {
    let (index, _dir) = create_test_index();
    for doc in sample_documents::legal_corpus() {
        index
            .add_document(&doc.id, &doc.content, doc.metadata)
            .unwrap();
    }

    let exact = &sample_documents::legal_corpus()[0].content;
    assert!(index.similarity_search(exact, 5, Some(1.1)).unwrap().is_empty());
}

#[test]
fn test_update_tombstones_old_slot() {
    let (index, _dir) = create_test_index();
    index
        .add_document("case-1", "original holding on consideration", DocumentMetadata::titled("v1"))
        .unwrap();
    index
        .add_document("case-2", "unrelated matter", DocumentMetadata::default())
        .unwrap();

    let new_slot = index
        .update_document(
            "case-1",
            "revised holding on promissory estoppel",
            DocumentMetadata::titled("v2"),
        )
        .unwrap();
    assert_eq!(new_slot, SlotId::new(2));
    assert_eq!(index.slot_of("case-1").unwrap(), new_slot);

    let stats = index.stats();
    assert_eq!(stats.count, 3);
    assert_eq!(stats.active_count, 2);
    assert_eq!(stats.tombstone_count, 1);

    // The old text no longer matches the document
    let results = index
        .similarity_search("original holding on consideration", 3, Some(0.9))
        .unwrap();
    assert!(results.is_empty());

    let results = index
        .similarity_search("revised holding on promissory estoppel", 1, None)
        .unwrap();
    assert_eq!(results[0].document_id, "case-1");
    assert_eq!(results[0].metadata.title, "v2");
}

#[test]
fn test_find_similar_excludes_source_and_tombstones() {
    let (index, _dir) = create_test_index();
    for (id, text) in [
        ("a", "breach of contract damages"),
        ("b", "breach of contract remedies"),
        ("c", "contract damages calculation"),
        ("d", "criminal procedure"),
    ] {
        index
            .add_document(id, text, DocumentMetadata::default())
            .unwrap();
    }
    index.remove_document("b").unwrap();

    let results = index.find_similar_to_document("a", 10).unwrap();
    let ids: Vec<&str> = results.iter().map(|r| r.document_id.as_str()).collect();
    assert_eq!(ids, vec!["c", "d"]);
}

#[test]
fn test_operations_on_unknown_documents() {
    let (index, _dir) = create_test_index();

    assert!(matches!(
        index.remove_document("missing"),
        Err(IndexError::DocumentNotFound { .. })
    ));
    assert!(matches!(
        index.find_similar_to_document("missing", 3),
        Err(IndexError::DocumentNotFound { .. })
    ));
    assert!(matches!(
        index.document("missing"),
        Err(IndexError::DocumentNotFound { .. })
    ));
}

#[test]
fn test_batch_add_skips_failures() {
    let (index, _dir) = create_test_index();
    let mut docs = sample_documents::legal_corpus();
    docs.push(sample_documents::doc("empty", "", "No text"));
    docs.push(sample_documents::doc("case-001", "duplicate id", "Dup"));

    let report = index.add_documents(&docs);
    assert_eq!(report.added.len(), 5);
    assert_eq!(report.failed.len(), 2);
    assert_eq!(index.stats().active_count, 5);
    assert_eq!(index.document("case-001").unwrap().metadata.title, "Hadley v. Baxendale");
}
