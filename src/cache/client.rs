//! Query client: cached reads with in-flight deduplication.
//!
//! `fetch` returns a fresh cached value when one exists. Otherwise it runs
//! the fetcher, or joins the fetch another caller already started for the
//! same key. Fetches run on their own task, so a caller that goes away never
//! cancels the fetch for the others.

use std::any::type_name;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry as MapEntry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use metrics::{counter, histogram};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, warn};

use super::config::CacheConfig;
use super::keys::QueryKey;
use super::store::{AnyValue, Entry, FetchStatus, QueryStore};

pub const METRIC_HIT: &str = "hymnary_query_cache_hit_total";
pub const METRIC_MISS: &str = "hymnary_query_cache_miss_total";
pub const METRIC_DEDUP: &str = "hymnary_query_cache_dedup_total";
pub const METRIC_FETCH_ERROR: &str = "hymnary_query_cache_fetch_error_total";
pub const METRIC_INVALIDATED: &str = "hymnary_query_cache_invalidated_total";
pub const METRIC_FETCH_MS: &str = "hymnary_query_cache_fetch_ms";

type FetchOutcome = Result<AnyValue, String>;

struct InFlight {
    id: u64,
    fetch: Shared<BoxFuture<'static, FetchOutcome>>,
}

/// What a caller sees for one key.
#[derive(Debug)]
pub struct QueryState<T> {
    pub data: Option<Arc<T>>,
    pub status: FetchStatus,
    pub error: Option<String>,
    pub stale: bool,
    pub updated_at: Option<OffsetDateTime>,
}

impl<T> Clone for QueryState<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            status: self.status,
            error: self.error.clone(),
            stale: self.stale,
            updated_at: self.updated_at,
        }
    }
}

impl<T> QueryState<T> {
    pub fn idle() -> Self {
        Self {
            data: None,
            status: FetchStatus::Idle,
            error: None,
            stale: true,
            updated_at: None,
        }
    }

    fn success(data: Arc<T>) -> Self {
        Self {
            data: Some(data),
            status: FetchStatus::Success,
            error: None,
            stale: false,
            updated_at: Some(OffsetDateTime::now_utc()),
        }
    }

    fn failure(message: String, previous: Option<Arc<T>>, updated_at: Option<OffsetDateTime>) -> Self {
        Self {
            data: previous,
            status: FetchStatus::Error,
            error: Some(message),
            stale: true,
            updated_at,
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == FetchStatus::Error
    }

    /// Resolves the state into a value for the caller: the data, flagged
    /// when it is served despite a failed refresh, or an error when there is
    /// nothing to serve.
    pub fn into_loaded(self) -> Result<Loaded<T>, QueryError> {
        match (self.data, self.error) {
            (Some(value), error) => Ok(Loaded {
                value,
                stale_error: error,
            }),
            (None, Some(message)) => Err(QueryError::Failed { message }),
            (None, None) => Err(QueryError::Failed {
                message: "no data available".to_string(),
            }),
        }
    }
}

/// A value ready to be returned to a client.
#[derive(Debug)]
pub struct Loaded<T> {
    pub value: Arc<T>,
    /// Set when the latest refresh failed and `value` is the last good copy.
    pub stale_error: Option<String>,
}

impl<T> Loaded<T> {
    pub fn fresh(value: T) -> Self {
        Self {
            value: Arc::new(value),
            stale_error: None,
        }
    }

    pub fn is_stale(&self) -> bool {
        self.stale_error.is_some()
    }

    /// Transforms the value, keeping the staleness flag.
    pub fn map<U>(self, f: impl FnOnce(&T) -> U) -> Loaded<U> {
        Loaded {
            value: Arc::new(f(&self.value)),
            stale_error: self.stale_error,
        }
    }
}

impl<T: Clone> Loaded<Option<T>> {
    /// `None` when the cached read found no record.
    pub fn transpose(self) -> Option<Loaded<T>> {
        let value = self.value.as_ref().clone()?;
        Some(Loaded {
            value: Arc::new(value),
            stale_error: self.stale_error,
        })
    }
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("query failed: {message}")]
    Failed { message: String },
}

pub struct QueryClient {
    config: CacheConfig,
    store: Arc<QueryStore>,
    inflight: Arc<DashMap<QueryKey, InFlight>>,
    next_fetch_id: AtomicU64,
}

impl QueryClient {
    pub fn new(config: CacheConfig) -> Self {
        let store = Arc::new(QueryStore::new(&config));
        Self {
            config,
            store,
            inflight: Arc::new(DashMap::new()),
            next_fetch_id: AtomicU64::new(0),
        }
    }

    /// A client that never caches; every read goes to the fetcher.
    pub fn disabled() -> Self {
        Self::new(CacheConfig::disabled())
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub async fn fetch<T, F, Fut, E>(&self, key: QueryKey, fetcher: F) -> QueryState<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let resource = key.resource().as_str();

        if !self.config.is_enabled() {
            return run_uncached(fetcher).await;
        }

        if let Some(entry) = self.store.lookup(&key)
            && entry.is_fresh(self.config.stale_after())
        {
            match downcast::<T>(&entry) {
                Some(data) => {
                    counter!(METRIC_HIT, "resource" => resource).increment(1);
                    return QueryState {
                        data: Some(data),
                        status: entry.status,
                        error: None,
                        stale: false,
                        updated_at: entry.updated_at,
                    };
                }
                None => warn!(
                    target: "hymnary::cache",
                    key = %key,
                    expected = type_name::<T>(),
                    "Cached value has a different type, refetching"
                ),
            }
        }

        counter!(METRIC_MISS, "resource" => resource).increment(1);
        let fetch = self.join_or_start(&key, fetcher);

        match fetch.await {
            Ok(value) => match value.downcast::<T>() {
                Ok(data) => QueryState::success(data),
                Err(_) => QueryState::failure(
                    format!("value for `{key}` is not a {}", type_name::<T>()),
                    None,
                    None,
                ),
            },
            Err(message) => {
                counter!(METRIC_FETCH_ERROR, "resource" => resource).increment(1);
                let previous = self.store.peek(&key);
                let updated_at = previous.as_ref().and_then(|entry| entry.updated_at);
                let data = previous.as_ref().and_then(downcast::<T>);
                QueryState::failure(message, data, updated_at)
            }
        }
    }

    fn join_or_start<T, F, Fut, E>(
        &self,
        key: &QueryKey,
        fetcher: F,
    ) -> Shared<BoxFuture<'static, FetchOutcome>>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        match self.inflight.entry(key.clone()) {
            MapEntry::Occupied(existing) => {
                counter!(METRIC_DEDUP, "resource" => key.resource().as_str()).increment(1);
                debug!(target: "hymnary::cache", key = %key, "Joining in-flight fetch");
                existing.get().fetch.clone()
            }
            MapEntry::Vacant(slot) => {
                let id = self.next_fetch_id.fetch_add(1, Ordering::Relaxed);
                let version = self.store.begin_fetch(key);
                let store = self.store.clone();
                let inflight = self.inflight.clone();
                let task_key = key.clone();
                let future = fetcher();

                let handle = tokio::spawn(async move {
                    let started_at = Instant::now();
                    let outcome = match AssertUnwindSafe(future).catch_unwind().await {
                        Ok(Ok(value)) => Ok(Arc::new(value) as AnyValue),
                        Ok(Err(err)) => Err(err.to_string()),
                        Err(_) => Err(format!("fetch for `{task_key}` panicked")),
                    };
                    histogram!(METRIC_FETCH_MS, "resource" => task_key.resource().as_str())
                        .record(started_at.elapsed().as_secs_f64() * 1000.0);

                    store.settle(&task_key, version, &outcome);
                    inflight.remove_if(&task_key, |_, current| current.id == id);
                    outcome
                });

                let fetch = async move {
                    handle
                        .await
                        .unwrap_or_else(|err| Err(format!("fetch task failed: {err}")))
                }
                .boxed()
                .shared();

                slot.insert(InFlight {
                    id,
                    fetch: fetch.clone(),
                });
                fetch
            }
        }
    }

    /// Current state for `key` without fetching.
    pub fn peek<T: Send + Sync + 'static>(&self, key: &QueryKey) -> QueryState<T> {
        match self.store.peek(key) {
            Some(entry) => QueryState {
                data: downcast::<T>(&entry),
                status: entry.status,
                error: entry.error.clone(),
                stale: entry.stale,
                updated_at: entry.updated_at,
            },
            None => QueryState::idle(),
        }
    }

    /// Marks every key under `prefix` stale and detaches in-flight fetches
    /// under it, so the next read starts a new fetch.
    pub fn invalidate(&self, prefix: &QueryKey) -> usize {
        self.inflight.retain(|key, _| !key.starts_with(prefix));
        let count = self.store.invalidate(prefix);
        counter!(METRIC_INVALIDATED, "resource" => prefix.resource().as_str())
            .increment(count as u64);
        count
    }

    /// Drops every cached entry.
    pub fn clear(&self) -> usize {
        self.inflight.clear();
        self.store.clear()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

fn downcast<T: Send + Sync + 'static>(entry: &Entry) -> Option<Arc<T>> {
    entry.data.clone()?.downcast::<T>().ok()
}

async fn run_uncached<T, F, Fut, E>(fetcher: F) -> QueryState<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    match AssertUnwindSafe(fetcher()).catch_unwind().await {
        Ok(Ok(value)) => QueryState::success(Arc::new(value)),
        Ok(Err(err)) => QueryState::failure(err.to_string(), None, None),
        Err(_) => QueryState::failure("fetch panicked".to_string(), None, None),
    }
}
