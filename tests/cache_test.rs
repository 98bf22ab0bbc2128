//! Integration tests for the two-tier result cache and its stores.

use std::sync::Arc;
use std::time::Duration;

use edubuddy::cache::default_store_path;
use edubuddy::{
    CacheConfig, EduBuddyError, FileStore, LocalStore, ManualClock, MemoryStore, ResultCache,
};

fn one_minute() -> Duration {
    Duration::from_secs(60)
}

#[test]
fn one_minute_ttl_expires_after_sixty_seconds() {
    let clock = Arc::new(ManualClock::new(5_000));
    let cache: ResultCache<String> =
        ResultCache::new("lesson", &CacheConfig::default(), None, clock.clone());

    cache.put("fp", "lesson body".to_string(), one_minute());
    assert_eq!(cache.get("fp").as_deref(), Some("lesson body"));

    clock.advance(Duration::from_secs(59));
    assert!(cache.get("fp").is_some());

    clock.advance(Duration::from_secs(1));
    assert_eq!(cache.get("fp"), None);
}

#[test]
fn put_replaces_previous_entry() {
    let clock = Arc::new(ManualClock::new(0));
    let cache: ResultCache<u32> =
        ResultCache::new("quiz", &CacheConfig::default(), None, clock);

    cache.put("fp", 1, one_minute());
    cache.put("fp", 2, one_minute());
    assert_eq!(cache.get("fp"), Some(2));
    assert_eq!(cache.len(), 1);
}

#[test]
fn invalidate_and_clear_drop_both_tiers() {
    let clock = Arc::new(ManualClock::new(0));
    let store = Arc::new(MemoryStore::new());
    let cache: ResultCache<String> =
        ResultCache::new("game", &CacheConfig::default(), Some(store.clone()), clock);

    cache.put("a", "1".to_string(), one_minute());
    cache.put("b", "2".to_string(), one_minute());
    assert_eq!(store.len(), 2);

    cache.invalidate("a");
    assert_eq!(cache.get("a"), None);
    assert_eq!(store.len(), 1);

    cache.clear();
    assert!(cache.is_empty());
    assert!(store.is_empty());
}

#[test]
fn namespaces_do_not_collide_in_a_shared_store() {
    let clock = Arc::new(ManualClock::new(0));
    let store: Arc<dyn LocalStore> = Arc::new(MemoryStore::new());
    let lessons: ResultCache<String> = ResultCache::new(
        "lesson",
        &CacheConfig::default(),
        Some(store.clone()),
        clock.clone(),
    );
    let quizzes: ResultCache<String> =
        ResultCache::new("quiz", &CacheConfig::default(), Some(store), clock);

    lessons.put("fp", "lesson".to_string(), one_minute());
    assert_eq!(quizzes.get("fp"), None);
}

#[test]
fn corrupt_persisted_entry_is_a_miss_and_removed() {
    let clock = Arc::new(ManualClock::new(0));
    let store = Arc::new(MemoryStore::new());
    store.set("edubuddy:lesson:fp", "{not json").unwrap();

    let cache: ResultCache<String> =
        ResultCache::new("lesson", &CacheConfig::default(), Some(store.clone()), clock);
    assert_eq!(cache.get("fp"), None);
    assert!(store.is_empty());
}

#[test]
fn file_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("store.json");
    let clock = Arc::new(ManualClock::new(0));

    {
        let store = Arc::new(FileStore::open(&path).unwrap());
        let cache: ResultCache<String> =
            ResultCache::new("lesson", &CacheConfig::default(), Some(store), clock.clone());
        cache.put("fp", "persisted".to_string(), one_minute());
    }

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert!(raw.get("edubuddy:lesson:fp").is_some());

    let store = Arc::new(FileStore::open(&path).unwrap());
    let cache: ResultCache<String> =
        ResultCache::new("lesson", &CacheConfig::default(), Some(store), clock);
    assert_eq!(cache.get("fp").as_deref(), Some("persisted"));
}

#[test]
fn expired_entries_of_a_previous_session_are_swept_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    let clock = Arc::new(ManualClock::new(0));

    {
        let store = Arc::new(FileStore::open(&path).unwrap());
        let cache: ResultCache<String> =
            ResultCache::new("lesson", &CacheConfig::default(), Some(store), clock.clone());
        cache.put("old", "stale lesson".to_string(), one_minute());
    }

    clock.advance(Duration::from_secs(3_600));

    let store = Arc::new(FileStore::open(&path).unwrap());
    let cache: ResultCache<String> =
        ResultCache::new("lesson", &CacheConfig::default(), Some(store), clock);
    // "old" is never read in this session; the write alone must evict it.
    cache.put("new", "fresh lesson".to_string(), one_minute());

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert!(raw.get("edubuddy:lesson:old").is_none());
    assert!(raw.get("edubuddy:lesson:new").is_some());
}

#[test]
fn corrupt_store_file_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    std::fs::write(&path, "garbage").unwrap();

    let store = FileStore::open(&path).unwrap();
    assert_eq!(store.get("anything").unwrap(), None);
}

#[test]
fn quota_exceeded_write_is_a_storage_error() {
    let store = MemoryStore::with_quota(16);
    assert!(store.set("k", "small").is_ok());
    assert!(matches!(
        store.set("k2", "this value does not fit"),
        Err(EduBuddyError::StorageWrite(_))
    ));
    assert_eq!(store.get("k2").unwrap(), None);
}

#[test]
fn default_store_path_is_under_edubuddy() {
    let path = default_store_path();
    assert!(path.ends_with("edubuddy/store.json"));
}
