//! ACID and crash recovery integration tests for the redb record store.
//!
//! # Crash Simulation
//!
//! We simulate a crash by dropping the store handle without calling
//! `close()`. Since redb durably commits data during `commit()` (not during
//! `close()`), dropping the handle simulates an ungraceful shutdown.
//!
//! redb uses shadow paging (not a WAL), so the store is always in a
//! consistent state: either the commit completed (the record, its embedding,
//! and its index entries are present) or it didn't (all are absent).

use std::sync::Arc;
use std::thread;

use lessonindex::storage::{RecordStore, RedbStore};
use lessonindex::{
    CancellationToken, CompositeKey, Config, ContentIndex, EntityType, IndexRequest,
    IndexedRecord, Metadata, MetadataFilter, SearchScope, ORGANIZATION_ID,
};
use tempfile::tempdir;

const DIM: usize = 384;

/// Helper: open a redb store at the given path with default config.
fn open_store(path: &std::path::Path) -> RedbStore {
    RedbStore::open(path, &Config::default()).unwrap()
}

fn record(id: &str, org: &str, version: u64) -> IndexedRecord {
    let mut metadata = Metadata::new();
    metadata.insert(ORGANIZATION_ID.into(), org.into());
    let mut embedding = vec![0.0; DIM];
    embedding[id.len() % DIM] = 1.0;
    IndexedRecord::new(
        EntityType::Lesson,
        id,
        embedding,
        format!("content of {}", id),
        metadata,
        version,
    )
}

// ============================================================================
// Durability Tests
// ============================================================================

#[test]
fn test_committed_record_survives_crash() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("crash.idx");

    {
        let store = open_store(&path);
        store.upsert(&record("L1", "org-1", 1)).unwrap();
        // NO close() -- simulates crash (drop without flush)
    }

    let store = open_store(&path);
    let key = CompositeKey::new(EntityType::Lesson, "L1");
    let retrieved = store.get(&key).unwrap();
    assert!(
        retrieved.is_some(),
        "Committed record must survive a crash (drop without close)"
    );
    let retrieved = retrieved.unwrap();
    assert_eq!(retrieved.embedding.len(), DIM);
    assert_eq!(retrieved.display_content, "content of L1");
}

#[test]
fn test_bulk_records_survive_crash() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bulk_crash.idx");

    {
        let store = open_store(&path);
        for i in 0..100 {
            store
                .upsert(&record(&format!("L{}", i), "org-1", 1))
                .unwrap();
        }
        // NO close() -- crash
    }

    let store = open_store(&path);
    assert_eq!(store.count().unwrap(), 100, "All 100 records must survive crash");

    // Index entries survived with the records.
    let filter = MetadataFilter::new().with(ORGANIZATION_ID, "org-1");
    let query = vec![1.0; DIM];
    let hits = store
        .nearest_neighbors(&query, &filter, 1000, &CancellationToken::new())
        .unwrap();
    assert_eq!(hits.len(), 100);
}

#[test]
fn test_multiple_crash_cycles() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("multi_crash.idx");

    // Cycle 1: create and crash
    {
        let store = open_store(&path);
        store.upsert(&record("L1", "org-1", 1)).unwrap();
    }

    // Cycle 2: replace, add, delete, crash again
    {
        let store = open_store(&path);
        assert_eq!(store.count().unwrap(), 1);
        store.upsert(&record("L1", "org-2", 2)).unwrap();
        store.upsert(&record("L2", "org-1", 1)).unwrap();
        store.upsert(&record("L3", "org-1", 1)).unwrap();
        assert!(store
            .delete(&CompositeKey::new(EntityType::Lesson, "L3"))
            .unwrap());
    }

    // Cycle 3: verify the end state of cycle 2
    let store = open_store(&path);
    assert_eq!(store.count().unwrap(), 2);
    let l1 = store
        .get(&CompositeKey::new(EntityType::Lesson, "L1"))
        .unwrap()
        .unwrap();
    assert_eq!(l1.version, 2);
    assert_eq!(l1.organization_id(), Some("org-2"));

    // The org index moved with the record.
    let org1 = store
        .nearest_neighbors(
            &vec![1.0; DIM],
            &MetadataFilter::new().with(ORGANIZATION_ID, "org-1"),
            10,
            &CancellationToken::new(),
        )
        .unwrap();
    let ids: Vec<&str> = org1.iter().map(|s| s.record.entity_id.as_str()).collect();
    assert_eq!(ids, vec!["L2"]);
}

#[test]
fn test_rejected_write_leaves_no_trace() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("rejected.idx");

    {
        let store = open_store(&path);
        store.upsert(&record("L1", "org-1", 5)).unwrap();
        assert!(store.upsert(&record("L1", "org-2", 4)).unwrap().is_stale());

        let mut bad = record("L2", "org-1", 1);
        bad.embedding.truncate(10);
        assert!(store.upsert(&bad).is_err());
    }

    let store = open_store(&path);
    assert_eq!(store.count().unwrap(), 1);
    let l1 = store
        .get(&CompositeKey::new(EntityType::Lesson, "L1"))
        .unwrap()
        .unwrap();
    assert_eq!(l1.version, 5);
    assert_eq!(l1.organization_id(), Some("org-1"));
}

// ============================================================================
// Concurrency Tests
// ============================================================================

#[test]
fn test_concurrent_writers_and_readers() {
    let dir = tempdir().unwrap();
    let index = Arc::new(
        ContentIndex::open(dir.path().join("concurrent.idx"), Config::default()).unwrap(),
    );

    let mut handles = Vec::new();
    for writer in 0..4 {
        let index = Arc::clone(&index);
        handles.push(thread::spawn(move || {
            for i in 0..10 {
                index
                    .index(
                        IndexRequest::lesson(
                            format!("W{}-{}", writer, i),
                            format!("writer {} lesson {} on ecosystems", writer, i),
                        )
                        .organization("org-1"),
                    )
                    .unwrap();
            }
        }));
    }
    for _ in 0..4 {
        let index = Arc::clone(&index);
        handles.push(thread::spawn(move || {
            let scope = SearchScope::organization("org-1").unwrap();
            for _ in 0..10 {
                let results = index.search("ecosystems", &scope, 5).unwrap();
                assert!(results.len() <= 5);
                assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(index.count().unwrap(), 40);
}

#[test]
fn test_racing_updates_settle_on_highest_version() {
    let dir = tempdir().unwrap();
    let index = Arc::new(
        ContentIndex::open(dir.path().join("race.idx"), Config::default()).unwrap(),
    );

    let handles: Vec<_> = (1..=20u64)
        .map(|version| {
            let index = Arc::clone(&index);
            thread::spawn(move || {
                index
                    .update(
                        IndexRequest::lesson("L1", format!("revision {}", version))
                            .organization("org-1")
                            .with_version(version),
                    )
                    .unwrap()
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let record = index
        .indexer()
        .get(EntityType::Lesson, "L1")
        .unwrap()
        .unwrap();
    assert_eq!(record.version, 20);
    assert_eq!(record.display_content, "revision 20");
    assert_eq!(index.count().unwrap(), 1);
}
