//! Integration tests for the shared queue
//!
//! These tests open real database files so that several connections, one per
//! simulated worker process, contend for the same rows.

use pagewell::storage::{ClaimStrategy, EnqueueOutcome, QueueStore, SqliteStorage};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::thread;
use tempfile::TempDir;
use url::Url;

fn create_queue(dir: &TempDir, prefixes: &[&str], urls: &[String]) -> PathBuf {
    let db_path = dir.path().join("queue.db");
    let storage = SqliteStorage::new(&db_path).expect("Failed to open queue");
    for prefix in prefixes {
        storage.add_url_base(prefix).expect("Failed to add url base");
    }
    for url in urls {
        let url = Url::parse(url).expect("Failed to parse URL");
        storage.enqueue(&url).expect("Failed to enqueue");
    }
    db_path
}

fn claim_all(db_path: &Path, strategy: ClaimStrategy, holder: &str) -> Vec<i64> {
    let storage = SqliteStorage::new(db_path).expect("Failed to open queue");
    let mut claimed = Vec::new();
    while let Some(target) = storage.claim(strategy, holder).expect("Claim failed") {
        claimed.push(target.id);
    }
    claimed
}

#[test]
fn test_concurrent_claims_never_share_a_row() {
    let dir = TempDir::new().unwrap();
    let urls: Vec<String> = (0..200)
        .map(|i| format!("https://example.com/page/{}", i))
        .chain((0..100).map(|i| format!("https://docs.example.org/guide/{}", i)))
        .collect();
    let db_path = create_queue(&dir, &["example.com", "docs.example.org"], &urls);

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let db_path = db_path.clone();
            let strategy = if worker % 2 == 0 {
                ClaimStrategy::Random
            } else {
                ClaimStrategy::RandomByBase
            };
            thread::spawn(move || claim_all(&db_path, strategy, &format!("pid:{}", worker)))
        })
        .collect();

    let mut seen = HashSet::new();
    let mut total = 0;
    for handle in handles {
        for id in handle.join().expect("Worker thread panicked") {
            assert!(seen.insert(id), "Row {} was claimed twice", id);
            total += 1;
        }
    }
    assert_eq!(total, 300);

    let storage = SqliteStorage::new(&db_path).unwrap();
    let stats = storage.queue_stats().unwrap();
    assert_eq!(stats.locked, 300);
    assert_eq!(stats.pending, 0);
}

#[test]
fn test_claim_records_holder_and_joins_prefix() {
    let dir = TempDir::new().unwrap();
    let db_path = create_queue(
        &dir,
        &["example.com/docs"],
        &["https://example.com/docs/intro?lang=en#top".to_string()],
    );
    let storage = SqliteStorage::new(&db_path).unwrap();

    let target = storage
        .claim(ClaimStrategy::RandomByBase, "worker-a")
        .unwrap()
        .expect("one eligible row");
    assert_eq!(target.url_prefix, "example.com/docs");
    assert_eq!(target.path, "/docs/intro?lang=en");

    let lock = target.lock.expect("row is locked");
    assert_eq!(lock.holder, "worker-a");

    // A second connection sees the lock
    let other = SqliteStorage::new(&db_path).unwrap();
    assert!(other.claim(ClaimStrategy::Random, "worker-b").unwrap().is_none());

    other.release(target.id).unwrap();
    let again = storage
        .claim(ClaimStrategy::Random, "worker-c")
        .unwrap()
        .expect("released row is claimable");
    assert_eq!(again.id, target.id);
}

#[test]
fn test_checked_rows_are_not_reclaimed() {
    let dir = TempDir::new().unwrap();
    let db_path = create_queue(
        &dir,
        &["example.com"],
        &[
            "https://example.com/a".to_string(),
            "https://example.com/b".to_string(),
        ],
    );
    let storage = SqliteStorage::new(&db_path).unwrap();

    while let Some(target) = storage.claim(ClaimStrategy::Random, "pid:1").unwrap() {
        storage.record_check(target.id, 404, None).unwrap();
        storage.release(target.id).unwrap();
    }

    let stats = storage.queue_stats().unwrap();
    assert_eq!(stats.checked, 2);
    assert_eq!(stats.locked, 0);
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.by_status, vec![(404, 2)]);
}

#[test]
fn test_enqueue_uses_longest_matching_prefix() {
    let dir = TempDir::new().unwrap();
    let db_path = create_queue(&dir, &["example.com", "example.com/blog"], &[]);
    let storage = SqliteStorage::new(&db_path).unwrap();
    let bases = storage.list_url_bases().unwrap();
    let site = bases.iter().find(|b| b.url_prefix == "example.com").unwrap().id;
    let blog = bases
        .iter()
        .find(|b| b.url_prefix == "example.com/blog")
        .unwrap()
        .id;

    let enqueue = |url: &str| storage.enqueue(&Url::parse(url).unwrap()).unwrap();

    assert!(matches!(
        enqueue("https://example.com/blog/post-1"),
        EnqueueOutcome::Inserted { url_base_id, .. } if url_base_id == blog
    ));
    assert!(matches!(
        enqueue("https://example.com/about"),
        EnqueueOutcome::Inserted { url_base_id, .. } if url_base_id == site
    ));
    assert_eq!(
        enqueue("https://example.com/blog/post-1"),
        EnqueueOutcome::AlreadyQueued
    );
    assert_eq!(
        enqueue("https://elsewhere.net/blog"),
        EnqueueOutcome::NoMatchingBase
    );

    // Fragments do not create separate rows
    assert_eq!(
        enqueue("https://example.com/about#team"),
        EnqueueOutcome::AlreadyQueued
    );
}

#[test]
fn test_within_base_only_claims_that_base() {
    let dir = TempDir::new().unwrap();
    let db_path = create_queue(
        &dir,
        &["a.example", "b.example"],
        &[
            "https://a.example/1".to_string(),
            "https://a.example/2".to_string(),
            "https://b.example/1".to_string(),
        ],
    );
    let storage = SqliteStorage::new(&db_path).unwrap();
    let b = storage
        .list_url_bases()
        .unwrap()
        .into_iter()
        .find(|base| base.url_prefix == "b.example")
        .unwrap()
        .id;

    let claimed = claim_all(&db_path, ClaimStrategy::WithinBase(b), "pid:1");
    assert_eq!(claimed.len(), 1);
    assert_eq!(storage.get_target(claimed[0]).unwrap().unwrap().url_base_id, b);
    assert_eq!(storage.queue_stats().unwrap().pending, 2);
}

#[test]
fn test_enqueue_rejects_lookalike_hosts() {
    let dir = TempDir::new().unwrap();
    let db_path = create_queue(&dir, &["example.com", "example.org/blog"], &[]);
    let storage = SqliteStorage::new(&db_path).unwrap();

    let enqueue = |url: &str| storage.enqueue(&Url::parse(url).unwrap()).unwrap();

    assert_eq!(
        enqueue("https://example.com.evil.net/page"),
        EnqueueOutcome::NoMatchingBase
    );
    assert_eq!(
        enqueue("https://example.community/x"),
        EnqueueOutcome::NoMatchingBase
    );
    assert_eq!(
        enqueue("https://example.org.evil.net/blog/post"),
        EnqueueOutcome::NoMatchingBase
    );
    assert_eq!(storage.queue_stats().unwrap().total, 0);

    // The registered hosts themselves still match
    assert!(matches!(
        enqueue("https://example.com/page"),
        EnqueueOutcome::Inserted { .. }
    ));
    assert!(matches!(
        enqueue("https://example.org/blog/post"),
        EnqueueOutcome::Inserted { .. }
    ));
}
