//! Unit tests for the file-backed snapshot store
//!
//! Tests entry round trips, missing accounts, corrupt entry tolerance, and
//! concurrent writers to distinct keys.

use regwatch::{FileSnapshotStore, ImageKey, SnapshotStore};
use std::sync::Arc;

fn key(account: &str, repo: &str, tag: &str) -> ImageKey {
    ImageKey::new(account, "registry.example.com", repo, tag)
}

#[tokio::test]
async fn test_set_and_get_digest() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = FileSnapshotStore::new(temp_dir.path().to_path_buf()).unwrap();

    let key = key("prod", "svc", "v1");
    assert_eq!(store.get_digest(&key).await.unwrap(), None);

    store.set_digest(&key, Some("sha256:abc")).await.unwrap();
    assert_eq!(
        store.get_digest(&key).await.unwrap(),
        Some("sha256:abc".to_string())
    );

    // Overwrite moves the baseline
    store.set_digest(&key, Some("sha256:def")).await.unwrap();
    assert_eq!(
        store.get_digest(&key).await.unwrap(),
        Some("sha256:def".to_string())
    );
}

#[tokio::test]
async fn test_null_digest_is_recorded() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = FileSnapshotStore::new(temp_dir.path().to_path_buf()).unwrap();

    let key = key("prod", "svc", "v1");
    store.set_digest(&key, None).await.unwrap();

    // The key is known even though no digest could be resolved
    let keys = store.keys_for_account("prod").await.unwrap();
    assert!(keys.contains(&key));
    assert_eq!(store.get_digest(&key).await.unwrap(), None);
}

#[tokio::test]
async fn test_keys_for_unknown_account_is_empty() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = FileSnapshotStore::new(temp_dir.path().to_path_buf()).unwrap();

    let keys = store.keys_for_account("never-seen").await.unwrap();
    assert!(keys.is_empty());
}

#[tokio::test]
async fn test_keys_are_scoped_per_account() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = FileSnapshotStore::new(temp_dir.path().to_path_buf()).unwrap();

    let prod = key("prod", "svc", "v1");
    let staging = key("staging", "svc", "v1");
    store.set_digest(&prod, Some("sha256:abc")).await.unwrap();
    store.set_digest(&staging, Some("sha256:def")).await.unwrap();

    let prod_keys = store.keys_for_account("prod").await.unwrap();
    assert_eq!(prod_keys.len(), 1);
    assert!(prod_keys.contains(&prod));
    assert!(!prod_keys.contains(&staging));
}

#[tokio::test]
async fn test_corrupt_entry_is_skipped() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = FileSnapshotStore::new(temp_dir.path().to_path_buf()).unwrap();

    let good = key("prod", "svc", "v1");
    store.set_digest(&good, Some("sha256:abc")).await.unwrap();

    // Drop a garbage file into the account directory
    let account_dir = store.account_dir("prod");
    std::fs::write(account_dir.join("zzzz.json"), b"{ not json").unwrap();

    let keys = store.keys_for_account("prod").await.unwrap();
    assert_eq!(keys.len(), 1);
    assert!(keys.contains(&good));
}

#[tokio::test]
async fn test_concurrent_writers_to_distinct_keys() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileSnapshotStore::new(temp_dir.path().to_path_buf()).unwrap());

    let mut handles = Vec::new();
    for i in 0..8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let key = ImageKey::new("prod", "registry.example.com", "svc", format!("v{}", i));
            store
                .set_digest(&key, Some(&format!("sha256:{}", i)))
                .await
                .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let keys = store.keys_for_account("prod").await.unwrap();
    assert_eq!(keys.len(), 8);
}

#[tokio::test]
async fn test_account_names_are_path_safe() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = FileSnapshotStore::new(temp_dir.path().to_path_buf()).unwrap();

    let key = ImageKey::new("team/prod..", "registry.example.com", "svc", "v1");
    store.set_digest(&key, Some("sha256:abc")).await.unwrap();

    let keys = store.keys_for_account("team/prod..").await.unwrap();
    assert!(keys.contains(&key));

    // Nothing may be written outside the snapshots directory
    assert!(store.account_dir("team/prod..").starts_with(temp_dir.path()));
}
