//! Query cache storage.
//!
//! One LRU map from key to entry. Values are type-erased; the client
//! downcasts them back to the type the caller asked for.

use std::any::Any;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use lru::LruCache;
use serde::Serialize;
use time::OffsetDateTime;

use super::config::CacheConfig;
use super::keys::QueryKey;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

pub type AnyValue = Arc<dyn Any + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    Idle,
    Loading,
    Success,
    Error,
}

#[derive(Clone)]
pub(crate) struct Entry {
    pub data: Option<AnyValue>,
    pub status: FetchStatus,
    pub error: Option<String>,
    pub stale: bool,
    pub updated_at: Option<OffsetDateTime>,
    fetched_at: Option<Instant>,
    /// Bumped by every invalidation so a fetch that started earlier settles
    /// as stale.
    version: u64,
}

impl Entry {
    fn empty() -> Self {
        Self {
            data: None,
            status: FetchStatus::Idle,
            error: None,
            stale: true,
            updated_at: None,
            fetched_at: None,
            version: 0,
        }
    }

    pub fn is_fresh(&self, stale_after: Duration) -> bool {
        self.data.is_some()
            && !self.stale
            && self.status == FetchStatus::Success
            && self
                .fetched_at
                .is_some_and(|fetched| fetched.elapsed() < stale_after)
    }
}

pub struct QueryStore {
    entries: RwLock<LruCache<QueryKey, Entry>>,
}

impl QueryStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.capacity_non_zero())),
        }
    }

    /// Returns a snapshot of the entry and marks it recently used.
    pub(crate) fn lookup(&self, key: &QueryKey) -> Option<Entry> {
        rw_write(&self.entries, SOURCE, "lookup").get(key).cloned()
    }

    /// Snapshot without touching LRU order.
    pub(crate) fn peek(&self, key: &QueryKey) -> Option<Entry> {
        rw_read(&self.entries, SOURCE, "peek").peek(key).cloned()
    }

    /// Marks the entry as loading and returns the version the fetch observed.
    pub(crate) fn begin_fetch(&self, key: &QueryKey) -> u64 {
        let mut entries = rw_write(&self.entries, SOURCE, "begin_fetch");
        let entry = entries.get_or_insert_mut(key.clone(), Entry::empty);
        entry.status = FetchStatus::Loading;
        entry.version
    }

    /// Records the outcome of a fetch that started at `version`.
    ///
    /// Success replaces the data and clears the error. Failure keeps the
    /// previous data and records the message.
    pub(crate) fn settle(&self, key: &QueryKey, version: u64, outcome: &Result<AnyValue, String>) {
        let mut entries = rw_write(&self.entries, SOURCE, "settle");
        let entry = entries.get_or_insert_mut(key.clone(), Entry::empty);
        let invalidated_meanwhile = entry.version != version;
        match outcome {
            Ok(value) => {
                entry.data = Some(value.clone());
                entry.status = FetchStatus::Success;
                entry.error = None;
                entry.stale = invalidated_meanwhile;
                entry.updated_at = Some(OffsetDateTime::now_utc());
                entry.fetched_at = Some(Instant::now());
            }
            Err(message) => {
                entry.status = FetchStatus::Error;
                entry.error = Some(message.clone());
                entry.stale = true;
            }
        }
    }

    /// Marks every entry under `prefix` stale. Returns how many matched.
    pub fn invalidate(&self, prefix: &QueryKey) -> usize {
        let mut entries = rw_write(&self.entries, SOURCE, "invalidate");
        let mut count = 0;
        for (key, entry) in entries.iter_mut() {
            if key.starts_with(prefix) {
                entry.stale = true;
                entry.version = entry.version.wrapping_add(1);
                count += 1;
            }
        }
        count
    }

    /// Drops every entry. Returns how many were held.
    pub fn clear(&self) -> usize {
        let mut entries = rw_write(&self.entries, SOURCE, "clear");
        let count = entries.len();
        entries.clear();
        count
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::keys::Resource;

    fn store(capacity: usize) -> QueryStore {
        QueryStore::new(&CacheConfig {
            capacity,
            ..CacheConfig::default()
        })
    }

    fn value(n: u32) -> AnyValue {
        Arc::new(n)
    }

    #[test]
    fn success_then_failure_keeps_data() {
        let store = store(8);
        let key = QueryKey::prefix(Resource::Dashboard);

        let version = store.begin_fetch(&key);
        store.settle(&key, version, &Ok(value(1)));
        let entry = store.peek(&key).expect("entry");
        assert_eq!(entry.status, FetchStatus::Success);
        assert!(entry.is_fresh(Duration::from_secs(60)));

        let version = store.begin_fetch(&key);
        store.settle(&key, version, &Err("db down".to_string()));
        let entry = store.peek(&key).expect("entry");
        assert_eq!(entry.status, FetchStatus::Error);
        assert_eq!(entry.error.as_deref(), Some("db down"));
        let data = entry.data.expect("previous data kept");
        assert_eq!(data.downcast_ref::<u32>(), Some(&1));
    }

    #[test]
    fn invalidation_during_fetch_settles_stale() {
        let store = store(8);
        let key = QueryKey::prefix(Resource::Hymns).with("sort", "title");

        let version = store.begin_fetch(&key);
        assert_eq!(store.invalidate(&QueryKey::prefix(Resource::Hymns)), 1);
        store.settle(&key, version, &Ok(value(7)));

        let entry = store.peek(&key).expect("entry");
        assert!(entry.stale);
        assert!(!entry.is_fresh(Duration::from_secs(60)));
    }

    #[test]
    fn invalidate_only_touches_matching_prefix() {
        let store = store(8);
        let a = QueryKey::prefix(Resource::Favorites).with("user", "a");
        let b = QueryKey::prefix(Resource::Favorites).with("user", "b");
        for key in [&a, &b] {
            let version = store.begin_fetch(key);
            store.settle(key, version, &Ok(value(0)));
        }

        assert_eq!(store.invalidate(&a), 1);
        assert!(store.peek(&a).expect("a").stale);
        assert!(!store.peek(&b).expect("b").stale);
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let store = store(2);
        let keys: Vec<QueryKey> = (0..3)
            .map(|i| QueryKey::prefix(Resource::Hymn).with("id", i))
            .collect();
        for key in &keys {
            let version = store.begin_fetch(key);
            store.settle(key, version, &Ok(value(0)));
        }

        assert_eq!(store.len(), 2);
        assert!(store.peek(&keys[0]).is_none());
        assert_eq!(store.clear(), 2);
        assert!(store.is_empty());
    }
}
