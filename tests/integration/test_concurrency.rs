//! Readers running alongside writers and full rebuilds.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crate::common::{create_test_index, hashing, sample_documents, test_settings};
use lexvec::{DocumentMetadata, SourceDocument, VectorService};
use tempfile::TempDir;

#[test]
fn test_searches_during_concurrent_adds() {
    let (index, _dir) = create_test_index();
    let index = Arc::new(index);
    index
        .add_document("seed", "seed document about contracts", DocumentMetadata::default())
        .unwrap();

    let writers: Vec<_> = (0..4)
        .map(|w| {
            let index = Arc::clone(&index);
            thread::spawn(move || {
                for i in 0..25 {
                    index
                        .add_document(
                            &format!("w{w}-{i}"),
                            &format!("writer {w} document {i} about contracts"),
                            DocumentMetadata::default(),
                        )
                        .unwrap();
                }
            })
        })
        .collect();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let index = Arc::clone(&index);
            thread::spawn(move || {
                let mut last_count = 0;
                for _ in 0..50 {
                    let results = index.similarity_search("contracts", 10, None).unwrap();
                    assert!(!results.is_empty());
                    assert!(results.len() <= 10);
                    assert!(results.windows(2).all(|w| w[0].score >= w[1].score));

                    let count = index.stats().count;
                    assert!(count >= last_count, "index never shrinks under adds");
                    last_count = count;
                }
            })
        })
        .collect();

    for handle in writers.into_iter().chain(readers) {
        handle.join().unwrap();
    }

    let stats = index.stats();
    assert_eq!(stats.count, 101);
    assert_eq!(stats.active_count, 101);
}

#[test]
fn test_readers_see_whole_state_during_reindex() {
    let (index, _dir) = create_test_index();
    let index = Arc::new(index);
    for i in 0..50 {
        index
            .add_document(&format!("old-{i}"), &format!("old document {i}"), DocumentMetadata::default())
            .unwrap();
    }
    let replacement: Vec<SourceDocument> = (0..200)
        .map(|i| SourceDocument::new(format!("new-{i}"), format!("new document {i}")))
        .collect();

    let done = Arc::new(AtomicBool::new(false));
    let reader = {
        let index = Arc::clone(&index);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            while !done.load(Ordering::SeqCst) {
                let results = index.similarity_search("document", 20, None).unwrap();
                let old = results.iter().filter(|r| r.document_id.starts_with("old-")).count();
                let new = results.iter().filter(|r| r.document_id.starts_with("new-")).count();
                assert!(old == 0 || new == 0, "search mixed old and new states");
            }
        })
    };

    let report = index.reindex_all(&replacement).unwrap();
    done.store(true, Ordering::SeqCst);
    reader.join().unwrap();

    assert_eq!(report.documents, 200);
    assert_eq!(report.previous_count, 50);
    assert!(!index.contains("old-0"));
    assert!(index.contains("new-199"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_service_handles_concurrent_requests() {
    let dir = TempDir::new().unwrap();
    let service = VectorService::with_generator(test_settings(dir.path()), hashing())
        .await
        .unwrap();

    let report = service
        .add_documents(sample_documents::legal_corpus())
        .await
        .unwrap();
    assert_eq!(report.added.len(), 5);

    let mut tasks = Vec::new();
    for i in 0..8 {
        let service = service.clone();
        tasks.push(tokio::spawn(async move {
            service
                .add_document(format!("extra-{i}"), format!("extra note {i} on damages"), DocumentMetadata::default())
                .await
                .unwrap();
            service
                .similarity_search("breach of contract damages", Some(3), None)
                .await
                .unwrap()
        }));
    }
    for task in tasks {
        let results = task.await.unwrap();
        assert_eq!(results.len(), 3);
    }

    let stats = service.stats().await.unwrap();
    assert_eq!(stats.active_count, 13);

    service.teardown().await.unwrap();

    // Every add was auto-saved
    let reopened = VectorService::with_generator(test_settings(dir.path()), hashing())
        .await
        .unwrap();
    assert_eq!(reopened.stats().await.unwrap().active_count, 13);
}

#[tokio::test]
async fn test_service_reports_missing_document() {
    let dir = TempDir::new().unwrap();
    let service = VectorService::with_generator(test_settings(dir.path()), hashing())
        .await
        .unwrap();

    let err = service.remove_document("nope").await.unwrap_err();
    assert_eq!(err.status_code(), "DOCUMENT_NOT_FOUND");
}
