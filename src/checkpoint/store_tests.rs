//! Tests for CheckpointStore

use super::store::temp_path_for;
use super::*;
use crate::error::Error;
use tempfile::tempdir;

// ============================================================================
// Construction Tests
// ============================================================================

#[test]
fn test_store_new() {
    let store = CheckpointStore::new("/tmp/job.checkpoint.json");
    assert!(!store.is_in_memory());
    assert_eq!(
        store.path().unwrap().to_str().unwrap(),
        "/tmp/job.checkpoint.json"
    );
}

#[test]
fn test_store_in_memory() {
    let store = CheckpointStore::in_memory();
    assert!(store.is_in_memory());
    assert!(store.path().is_none());
}

#[test]
fn test_temp_path_is_sibling() {
    let temp = temp_path_for(std::path::Path::new("/data/run/job.json"));
    assert_eq!(temp.to_str().unwrap(), "/data/run/job.json.tmp");
}

// ============================================================================
// Load Tests
// ============================================================================

#[tokio::test]
async fn test_load_missing_file_is_empty() {
    let dir = tempdir().unwrap();
    let store = CheckpointStore::new(dir.path().join("absent.json"));

    let checkpoint = store.load().await.unwrap();
    assert!(checkpoint.is_empty());
}

#[tokio::test]
async fn test_load_corrupt_file_fails() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("job.json");
    std::fs::write(&path, "{ \"entries\": { \"a\": ").unwrap();

    let err = CheckpointStore::new(&path).load().await.unwrap_err();
    assert!(matches!(err, Error::CorruptCheckpoint { .. }));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_load_empty_file_is_corrupt() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("job.json");
    std::fs::write(&path, "").unwrap();

    let err = CheckpointStore::new(&path).load().await.unwrap_err();
    assert!(matches!(err, Error::CorruptCheckpoint { .. }));
}

#[tokio::test]
async fn test_load_future_version_is_corrupt() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("job.json");
    std::fs::write(&path, r#"{"version": 99, "entries": {}}"#).unwrap();

    let err = CheckpointStore::new(&path).load().await.unwrap_err();
    assert!(err.to_string().contains("unsupported version 99"));
}

#[tokio::test]
async fn test_in_memory_load_is_empty() {
    let checkpoint = CheckpointStore::in_memory().load().await.unwrap();
    assert!(checkpoint.is_empty());
}

// ============================================================================
// Save Tests
// ============================================================================

#[tokio::test]
async fn test_save_and_reload() {
    let dir = tempdir().unwrap();
    let store = CheckpointStore::new(dir.path().join("job.json"));

    let mut checkpoint = Checkpoint::new();
    checkpoint.record_success("a", None);
    checkpoint.record_failure("b", "HTTP 500");
    checkpoint.mark_unit("race/2024", UnitStatus::Complete, None);
    store.save(&checkpoint).await.unwrap();

    let restored = store.load().await.unwrap();
    assert_eq!(restored, checkpoint);
}

#[tokio::test]
async fn test_save_leaves_no_temp_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("job.json");
    let store = CheckpointStore::new(&path);

    store.save(&Checkpoint::new()).await.unwrap();

    assert!(path.exists());
    assert!(!temp_path_for(&path).exists());
}

#[tokio::test]
async fn test_stale_temp_file_does_not_affect_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("job.json");
    let store = CheckpointStore::new(&path);

    let mut checkpoint = Checkpoint::new();
    checkpoint.record_success("kept", None);
    store.save(&checkpoint).await.unwrap();

    // A writer that died mid-write leaves a truncated temp file behind
    std::fs::write(temp_path_for(&path), "{ \"entries\": ").unwrap();

    let restored = store.load().await.unwrap();
    assert!(restored.contains("kept"));

    // The next save replaces the stale temp file
    checkpoint.record_success("next", None);
    store.save(&checkpoint).await.unwrap();
    assert!(store.load().await.unwrap().contains("next"));
    assert!(!temp_path_for(&path).exists());
}

#[tokio::test]
async fn test_save_creates_parent_directories() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested/deeper/job.json");
    let store = CheckpointStore::new(&path);

    store.save(&Checkpoint::new()).await.unwrap();
    assert!(path.exists());
}

#[tokio::test]
async fn test_save_overwrites_previous() {
    let dir = tempdir().unwrap();
    let store = CheckpointStore::new(dir.path().join("job.json"));

    let mut first = Checkpoint::new();
    first.record_success("one", None);
    store.save(&first).await.unwrap();

    let mut second = Checkpoint::new();
    second.record_success("two", None);
    store.save(&second).await.unwrap();

    let restored = store.load().await.unwrap();
    assert!(!restored.contains("one"));
    assert!(restored.contains("two"));
}

#[tokio::test]
async fn test_in_memory_save_is_noop() {
    let store = CheckpointStore::in_memory();
    let mut checkpoint = Checkpoint::new();
    checkpoint.record_success("a", None);

    store.save(&checkpoint).await.unwrap();
    assert!(store.load().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_saved_file_is_key_ordered() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("job.json");
    let store = CheckpointStore::new(&path);

    let mut checkpoint = Checkpoint::new();
    checkpoint.record_success("zeta", None);
    checkpoint.record_success("alpha", None);
    store.save(&checkpoint).await.unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.find("alpha").unwrap() < text.find("zeta").unwrap());
}
