//! Two-tier TTL cache for generated content.
//!
//! [`ResultCache`] keys previously produced results by request fingerprint.
//! Reads check an in-process moka cache first, then the optional
//! [`LocalStore`], promoting persistent hits back into memory.
//!
//! # Expiry
//!
//! Every entry carries its own `expires_at` (epoch millis, from the cache's
//! [`Clock`]), so a TTL can differ per write and survives a round trip
//! through the persistent tier. Expired entries are dropped lazily when
//! read; every `put` additionally sweeps expired entries out of memory and
//! out of this namespace's keys in the persistent store, including entries
//! left behind by an earlier session.
//! moka's capacity bound only guards against runaway growth; there is no
//! time-based eviction on moka's own clock.
//!
//! # Persistence failures
//!
//! Writes to the persistent tier are best-effort. Failures are logged and
//! counted, never returned: the in-process tier stays authoritative for the
//! rest of the session.

use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::store::LocalStore;
use crate::clock::{Clock, duration_millis};
use crate::telemetry;
use crate::{EduBuddyError, Result};

/// Configuration for a result cache.
///
/// ```rust
/// # use edubuddy::CacheConfig;
/// let config = CacheConfig::new().max_entries(500).persistent(false);
/// assert_eq!(config.max_entries, 500);
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Upper bound on in-memory entries. Default: 1,000.
    pub max_entries: u64,
    /// Whether to mirror entries into the persistent store. Default: true.
    pub persistent: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1_000,
            persistent: true,
        }
    }
}

impl CacheConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the in-memory capacity bound.
    pub fn max_entries(mut self, n: u64) -> Self {
        self.max_entries = n;
        self
    }

    /// Enable or disable the persistent tier.
    pub fn persistent(mut self, enabled: bool) -> Self {
        self.persistent = enabled;
        self
    }
}

/// A cached result with its validity window.
///
/// Valid iff `now < expires_at`; `expires_at = stored_at + ttl`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<V> {
    pub fingerprint: String,
    pub result: V,
    pub stored_at: u64,
    pub expires_at: u64,
}

impl<V> CacheEntry<V> {
    pub fn is_valid_at(&self, now_millis: u64) -> bool {
        now_millis < self.expires_at
    }
}

/// Just the expiry of a persisted entry, read without decoding the result.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedExpiry {
    expires_at: u64,
}

/// Fingerprint-keyed TTL cache with an optional persistent tier.
pub struct ResultCache<V> {
    namespace: String,
    memory: Cache<String, CacheEntry<V>>,
    store: Option<Arc<dyn LocalStore>>,
    clock: Arc<dyn Clock>,
}

impl<V> ResultCache<V>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Create a cache. `namespace` scopes persistent keys and labels metrics;
    /// `store` is ignored unless `config.persistent` is set.
    pub fn new(
        namespace: impl Into<String>,
        config: &CacheConfig,
        store: Option<Arc<dyn LocalStore>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            memory: Cache::builder().max_capacity(config.max_entries).build(),
            store: store.filter(|_| config.persistent),
            clock,
        }
    }

    /// Look up a valid result.
    ///
    /// Returns `None` on miss or expiry. Emits cache hit/miss metrics.
    pub fn get(&self, fingerprint: &str) -> Option<V> {
        let now = self.clock.now_millis();

        if let Some(entry) = self.memory.get(fingerprint) {
            if entry.is_valid_at(now) {
                self.record_hit("memory");
                return Some(entry.result);
            }
            debug!(namespace = %self.namespace, "dropping expired cache entry");
            self.memory.invalidate(fingerprint);
            self.remove_persisted(fingerprint);
            self.record_miss();
            return None;
        }

        match self.load_persisted(fingerprint, now) {
            Some(entry) => {
                let result = entry.result.clone();
                self.memory.insert(fingerprint.to_string(), entry);
                self.record_hit("persistent");
                Some(result)
            }
            None => {
                self.record_miss();
                None
            }
        }
    }

    /// Store a result for `ttl`, replacing any previous entry.
    ///
    /// Sweeps expired entries from both tiers first.
    pub fn put(&self, fingerprint: &str, result: V, ttl: Duration) {
        let now = self.clock.now_millis();
        self.sweep(now);

        let entry = CacheEntry {
            fingerprint: fingerprint.to_string(),
            result,
            stored_at: now,
            expires_at: now.saturating_add(duration_millis(ttl)),
        };

        if let Err(e) = self.persist(&entry) {
            warn!(namespace = %self.namespace, error = %e, "persistent cache write failed, keeping in-memory copy only");
            metrics::counter!(telemetry::STORAGE_WRITE_FAILURES_TOTAL, "category" => self.namespace.clone())
                .increment(1);
        }
        self.memory.insert(fingerprint.to_string(), entry);
    }

    /// Drop one entry from both tiers.
    pub fn invalidate(&self, fingerprint: &str) {
        self.memory.invalidate(fingerprint);
        self.remove_persisted(fingerprint);
    }

    /// Drop every in-memory entry, and the persistent copies of those entries.
    pub fn clear(&self) {
        for (key, _) in self.memory.iter() {
            self.remove_persisted(&key);
        }
        self.memory.invalidate_all();
        self.memory.run_pending_tasks();
    }

    /// Number of in-memory entries (valid or not yet swept).
    pub fn len(&self) -> u64 {
        self.memory.run_pending_tasks();
        self.memory.entry_count()
    }

    /// Whether the in-memory tier is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn sweep(&self, now: u64) {
        let expired: Vec<Arc<String>> = self
            .memory
            .iter()
            .filter(|(_, entry)| !entry.is_valid_at(now))
            .map(|(key, _)| key)
            .collect();
        if !expired.is_empty() {
            debug!(namespace = %self.namespace, count = expired.len(), "sweeping expired cache entries");
            for key in expired {
                self.memory.invalidate(key.as_str());
            }
        }
        self.sweep_persisted(now);
    }

    /// Remove expired or unreadable entries under this namespace's prefix.
    fn sweep_persisted(&self, now: u64) {
        let Some(store) = &self.store else {
            return;
        };
        let keys = match store.keys_with_prefix(&self.store_key("")) {
            Ok(keys) => keys,
            Err(e) => {
                warn!(namespace = %self.namespace, error = %e, "failed to list persistent cache entries");
                return;
            }
        };

        let mut removed = 0usize;
        for key in keys {
            let stale = match store.get(&key) {
                Ok(Some(raw)) => !serde_json::from_str::<PersistedExpiry>(&raw)
                    .is_ok_and(|entry| now < entry.expires_at),
                Ok(None) => false,
                Err(e) => {
                    warn!(namespace = %self.namespace, error = %e, "persistent cache read failed");
                    false
                }
            };
            if !stale {
                continue;
            }
            match store.remove(&key) {
                Ok(()) => removed += 1,
                Err(e) => {
                    warn!(namespace = %self.namespace, error = %e, "failed to remove persistent cache entry");
                }
            }
        }
        if removed > 0 {
            debug!(namespace = %self.namespace, count = removed, "swept expired persistent entries");
        }
    }

    fn store_key(&self, fingerprint: &str) -> String {
        format!("edubuddy:{}:{fingerprint}", self.namespace)
    }

    fn persist(&self, entry: &CacheEntry<V>) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let json = serde_json::to_string(entry)
            .map_err(|e| EduBuddyError::StorageWrite(format!("failed to serialize entry: {e}")))?;
        store.set(&self.store_key(&entry.fingerprint), &json)
    }

    fn load_persisted(&self, fingerprint: &str, now: u64) -> Option<CacheEntry<V>> {
        let store = self.store.as_ref()?;
        let key = self.store_key(fingerprint);
        let raw = match store.get(&key) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(namespace = %self.namespace, error = %e, "persistent cache read failed");
                return None;
            }
        };
        match serde_json::from_str::<CacheEntry<V>>(&raw) {
            Ok(entry) if entry.is_valid_at(now) => Some(entry),
            Ok(_) => {
                self.remove_persisted(fingerprint);
                None
            }
            Err(e) => {
                warn!(namespace = %self.namespace, error = %e, "corrupt persistent cache entry, removing");
                self.remove_persisted(fingerprint);
                None
            }
        }
    }

    fn remove_persisted(&self, fingerprint: &str) {
        if let Some(store) = &self.store
            && let Err(e) = store.remove(&self.store_key(fingerprint))
        {
            warn!(namespace = %self.namespace, error = %e, "failed to remove persistent cache entry");
        }
    }

    fn record_hit(&self, tier: &'static str) {
        metrics::counter!(telemetry::CACHE_HITS_TOTAL,
            "category" => self.namespace.clone(),
            "tier" => tier,
        )
        .increment(1);
    }

    fn record_miss(&self) {
        metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "category" => self.namespace.clone())
            .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::clock::ManualClock;

    fn cache_with(
        store: Option<Arc<dyn LocalStore>>,
        clock: Arc<ManualClock>,
    ) -> ResultCache<String> {
        ResultCache::new("test", &CacheConfig::default(), store, clock)
    }

    #[test]
    fn entry_validity_is_exclusive_of_expiry() {
        let entry = CacheEntry {
            fingerprint: "fp".to_string(),
            result: (),
            stored_at: 0,
            expires_at: 100,
        };
        assert!(entry.is_valid_at(99));
        assert!(!entry.is_valid_at(100));
    }

    #[test]
    fn expires_after_ttl() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = cache_with(None, clock.clone());

        cache.put("fp", "value".to_string(), Duration::from_secs(60));
        assert_eq!(cache.get("fp").as_deref(), Some("value"));

        clock.advance(Duration::from_secs(61));
        assert_eq!(cache.get("fp"), None);
    }

    #[test]
    fn put_sweeps_expired_entries() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = cache_with(None, clock.clone());

        cache.put("old", "a".to_string(), Duration::from_secs(1));
        clock.advance(Duration::from_secs(2));
        cache.put("new", "b".to_string(), Duration::from_secs(60));

        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn persistent_tier_survives_new_instance() {
        let clock = Arc::new(ManualClock::new(0));
        let store: Arc<dyn LocalStore> = Arc::new(MemoryStore::new());

        let first = cache_with(Some(store.clone()), clock.clone());
        first.put("fp", "kept".to_string(), Duration::from_secs(60));

        let second = cache_with(Some(store), clock);
        assert!(second.is_empty());
        assert_eq!(second.get("fp").as_deref(), Some("kept"));
        // Promoted into memory.
        assert_eq!(second.len(), 1);
    }

    #[test]
    fn expired_persistent_entry_is_removed() {
        let clock = Arc::new(ManualClock::new(0));
        let store = Arc::new(MemoryStore::new());

        let first = cache_with(Some(store.clone()), clock.clone());
        first.put("fp", "old".to_string(), Duration::from_secs(60));
        clock.advance(Duration::from_secs(120));

        let second = cache_with(Some(store.clone()), clock);
        assert_eq!(second.get("fp"), None);
        assert!(store.is_empty());
    }

    #[test]
    fn put_sweeps_expired_entries_of_earlier_sessions() {
        let clock = Arc::new(ManualClock::new(0));
        let store = Arc::new(MemoryStore::new());
        store.set("edubuddy:test:corrupt", "not json").unwrap();
        store.set("edubuddy:other:fp", "not json").unwrap();

        let first = cache_with(Some(store.clone()), clock.clone());
        first.put("stale", "old".to_string(), Duration::from_secs(60));
        first.put("fresh", "kept".to_string(), Duration::from_secs(7_200));
        clock.advance(Duration::from_secs(3_600));

        let second = cache_with(Some(store.clone()), clock);
        second.put("new", "v".to_string(), Duration::from_secs(60));

        let mut keys = store.keys_with_prefix("edubuddy:").unwrap();
        keys.sort();
        assert_eq!(
            keys,
            vec!["edubuddy:other:fp", "edubuddy:test:fresh", "edubuddy:test:new"]
        );
    }

    #[test]
    fn storage_write_failure_is_swallowed() {
        let clock = Arc::new(ManualClock::new(0));
        let store: Arc<dyn LocalStore> = Arc::new(MemoryStore::with_quota(8));
        let cache = cache_with(Some(store), clock);

        cache.put("fp", "a value far larger than the quota".to_string(), Duration::from_secs(60));
        assert!(cache.get("fp").is_some());
    }

    #[test]
    fn non_persistent_config_ignores_store() {
        let clock = Arc::new(ManualClock::new(0));
        let store = Arc::new(MemoryStore::new());
        let cache: ResultCache<String> = ResultCache::new(
            "test",
            &CacheConfig::new().persistent(false),
            Some(store.clone()),
            clock,
        );
        cache.put("fp", "v".to_string(), Duration::from_secs(60));
        assert!(store.is_empty());
    }
}
