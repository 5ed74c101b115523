use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use watchvault_core::{
    decode_collection, encode_collection, Category, Item, ItemDraft, ItemRepository,
    KeyValueStore, MemoryKvStore, RepoError, RepositoryOptions, SqliteKvStore, StoreError,
    StoreResult, VaultRepository, WatchStatus, WriteMode, STORAGE_KEY,
};

#[test]
fn reopen_from_sqlite_file_restores_identical_collection() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("watchvault.sqlite3");

    let before = {
        let store = Arc::new(SqliteKvStore::open(&path).unwrap());
        let repo = VaultRepository::open(store).unwrap();
        repo.add(
            ItemDraft::new("Arrival", Category::Movie)
                .with_status(WatchStatus::Completed)
                .with_notes("linguistics")
                .with_rating(9),
        )
        .unwrap();
        repo.add(ItemDraft::new("Severance", Category::Series))
            .unwrap();
        repo.add(ItemDraft::new("Mushishi", Category::Anime).with_notes(""))
            .unwrap();
        repo.list()
    };

    let store = Arc::new(SqliteKvStore::open(&path).unwrap());
    let reopened = VaultRepository::open(store).unwrap();
    assert_eq!(reopened.list(), before);
}

#[test]
fn persisted_blob_reencodes_byte_for_byte() {
    let store = Arc::new(MemoryKvStore::new());
    let repo = VaultRepository::open(store.clone()).unwrap();
    repo.add(ItemDraft::new("Paprika", Category::Anime).with_rating(8))
        .unwrap();
    repo.add(ItemDraft::new("Blue Eye Samurai", Category::Series).with_notes("s2?"))
        .unwrap();

    let blob = store.get(STORAGE_KEY).unwrap().unwrap();
    let decoded = decode_collection(&blob).unwrap();
    assert_eq!(encode_collection(&decoded).unwrap(), blob);
}

#[test]
fn legacy_blob_with_out_of_range_rating_still_opens() {
    let blob = r#"[{"id":"3f1c","title":"Old Entry","type":"Movies","status":"Watching","notes":"","rating":99}]"#;
    let store = Arc::new(MemoryKvStore::with_value(STORAGE_KEY, blob));

    let repo = VaultRepository::open(store).unwrap();
    let items = repo.list();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].category, Category::Movie);
    assert_eq!(items[0].notes.as_deref(), Some(""));
    assert_eq!(items[0].rating, Some(99));
}

#[test]
fn legacy_blob_with_non_integer_ratings_still_opens() {
    let blob = r#"[
        {"id":"r1","title":"Negative","type":"Movie","status":"Completed","rating":-1},
        {"id":"r2","title":"Half","type":"Series","status":"Watching","rating":0.5},
        {"id":"r3","title":"Seven And A Half","type":"Anime","status":"Completed","rating":7.5},
        {"id":"r4","title":"Zero","type":"Movie","status":"Completed","rating":0},
        {"id":"r5","title":"Huge","type":"Movie","status":"Completed","rating":1000},
        {"id":"r6","title":"Whole Float","type":"Movie","status":"Completed","rating":9.0}
    ]"#;
    let store = Arc::new(MemoryKvStore::with_value(STORAGE_KEY, blob));

    let repo = VaultRepository::open(store.clone()).unwrap();
    let ratings: Vec<Option<u8>> = repo.list().into_iter().map(|item| item.rating).collect();
    assert_eq!(
        ratings,
        vec![None, Some(1), Some(8), Some(0), None, Some(9)]
    );

    // Loading alone never rewrites the stored blob.
    assert_eq!(store.write_count(), 0);
    assert_eq!(store.get(STORAGE_KEY).unwrap().as_deref(), Some(blob));
}

#[test]
fn corrupt_blob_is_reported_and_left_untouched() {
    let store = Arc::new(MemoryKvStore::with_value(STORAGE_KEY, "{not json"));

    let err = VaultRepository::open(store.clone()).err().unwrap();
    assert!(matches!(err, RepoError::InvalidData(_)));
    assert_eq!(
        store.get(STORAGE_KEY).unwrap().as_deref(),
        Some("{not json")
    );
}

#[test]
fn custom_storage_key_is_honored() {
    let store = Arc::new(MemoryKvStore::new());
    let options = RepositoryOptions {
        storage_key: "watchVault.test".to_string(),
        ..RepositoryOptions::default()
    };
    let repo = VaultRepository::open_with(store.clone(), options).unwrap();
    repo.add(ItemDraft::new("Tenet", Category::Movie)).unwrap();

    assert!(store.get(STORAGE_KEY).unwrap().is_none());
    assert!(store.get("watchVault.test").unwrap().is_some());
}

#[test]
fn storage_failure_keeps_memory_state_and_can_be_retried() {
    let store = Arc::new(MemoryKvStore::new());
    let repo = VaultRepository::open(store.clone()).unwrap();
    repo.add(ItemDraft::new("Saved", Category::Movie)).unwrap();

    store.set_fail_writes(true);
    let err = repo
        .add(ItemDraft::new("Unsaved", Category::Movie))
        .unwrap_err();
    match err {
        RepoError::Storage(failure) => assert_eq!(failure.revision, 2),
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(repo.list().len(), 2);
    let status = repo.persistence_status();
    assert_eq!(status.revision, 2);
    assert_eq!(status.durable_revision, 1);
    assert!(!status.is_durable());
    assert!(status.last_error.is_some());
    assert!(matches!(repo.flush(), Err(RepoError::Storage(_))));
    assert!(matches!(repo.retry_persist(), Err(RepoError::Storage(_))));

    store.set_fail_writes(false);
    repo.retry_persist().unwrap();

    let status = repo.persistence_status();
    assert!(status.is_durable());
    assert_eq!(status.last_error, None);
    let durable = decode_collection(&store.get(STORAGE_KEY).unwrap().unwrap()).unwrap();
    assert_eq!(durable, repo.list());
}

/// Store that records every blob and sleeps on each write.
struct SlowRecordingStore {
    delay: Duration,
    writes: Mutex<Vec<String>>,
}

impl SlowRecordingStore {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            writes: Mutex::new(Vec::new()),
        }
    }

    fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }
}

impl KeyValueStore for SlowRecordingStore {
    fn get(&self, _key: &str) -> StoreResult<Option<String>> {
        Ok(self.writes.lock().unwrap().last().cloned())
    }

    fn set(&self, _key: &str, value: &str) -> StoreResult<()> {
        thread::sleep(self.delay);
        self.writes.lock().unwrap().push(value.to_string());
        Ok(())
    }
}

fn background_options() -> RepositoryOptions {
    RepositoryOptions {
        write_mode: WriteMode::Background,
        ..RepositoryOptions::default()
    }
}

#[test]
fn background_writes_never_regress_and_last_snapshot_wins() {
    let store = Arc::new(SlowRecordingStore::new(Duration::from_millis(5)));
    let repo = VaultRepository::open_with(store.clone(), background_options()).unwrap();
    assert_eq!(repo.write_mode(), WriteMode::Background);

    for idx in 0..40 {
        repo.add(ItemDraft::new(format!("entry {idx}"), Category::Anime))
            .unwrap();
    }
    // Reads see the newest state even before the writer catches up.
    assert_eq!(repo.list().len(), 40);

    repo.flush().unwrap();
    assert!(repo.persistence_status().is_durable());

    let writes = store.writes();
    assert!(!writes.is_empty());
    assert!(writes.len() <= 40);
    let sizes: Vec<usize> = writes
        .iter()
        .map(|blob| decode_collection(blob).unwrap().len())
        .collect();
    assert!(sizes.windows(2).all(|pair| pair[0] < pair[1]));

    let last: Vec<Item> = decode_collection(writes.last().unwrap()).unwrap();
    assert_eq!(last, repo.list());
}

#[test]
fn dropping_background_repository_drains_pending_snapshots() {
    let store = Arc::new(SlowRecordingStore::new(Duration::from_millis(2)));
    let expected = {
        let repo = VaultRepository::open_with(store.clone(), background_options()).unwrap();
        for idx in 0..10 {
            repo.add(ItemDraft::new(format!("show {idx}"), Category::Series))
                .unwrap();
        }
        repo.list()
    };

    let last = store.writes().last().cloned().unwrap();
    assert_eq!(decode_collection(&last).unwrap(), expected);
}

#[test]
fn background_retry_is_judged_by_its_own_write() {
    let store = Arc::new(MemoryKvStore::new());
    store.set_fail_writes(true);
    let repo = VaultRepository::open_with(store.clone(), background_options()).unwrap();

    repo.add(ItemDraft::new("Retry Me", Category::Movie)).unwrap();
    assert!(matches!(repo.flush(), Err(RepoError::Storage(_))));
    // The store still rejects writes, so this retry fails on its own attempt.
    assert!(matches!(repo.retry_persist(), Err(RepoError::Storage(_))));

    store.set_fail_writes(false);
    repo.retry_persist().unwrap();

    let status = repo.persistence_status();
    assert!(status.is_durable());
    assert_eq!(status.last_error, None);
    repo.flush().unwrap();
    let durable = decode_collection(&store.get(STORAGE_KEY).unwrap().unwrap()).unwrap();
    assert_eq!(durable, repo.list());
}

/// Store whose writes always fail.
struct BrokenStore;

impl KeyValueStore for BrokenStore {
    fn get(&self, _key: &str) -> StoreResult<Option<String>> {
        Ok(None)
    }

    fn set(&self, _key: &str, _value: &str) -> StoreResult<()> {
        Err(StoreError::Unavailable("disk full".to_string()))
    }
}

#[test]
fn background_write_failure_surfaces_on_flush() {
    let repo = VaultRepository::open_with(Arc::new(BrokenStore), background_options()).unwrap();

    // The mutation itself succeeds; the write happens later.
    repo.add(ItemDraft::new("Doomed", Category::Movie)).unwrap();

    let err = repo.flush().unwrap_err();
    assert!(err.to_string().contains("disk full"), "unexpected error: {err}");
    assert_eq!(repo.list().len(), 1);
    assert_eq!(
        repo.persistence_status().last_error.as_deref(),
        Some("store unavailable: disk full")
    );
}
