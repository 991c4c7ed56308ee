use crate::utils::error::{PulseError, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Fetch function of one cache key. Results are stored as JSON values.
pub type QueryFn = Arc<dyn Fn() -> BoxFuture<Result<Value>> + Send + Sync>;

/// Write function of one mutation key.
pub type MutationFn = Arc<dyn Fn() -> BoxFuture<Result<Value>> + Send + Sync>;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Wraps a typed async closure into a [`QueryFn`].
pub fn query_fn<F, Fut, T>(f: F) -> QueryFn
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
    T: Serialize + Send + 'static,
{
    Arc::new(move || -> BoxFuture<Result<Value>> {
        let fut = f();
        Box::pin(async move {
            let value = fut.await?;
            Ok(serde_json::to_value(value)?)
        })
    })
}

/// Same shape as [`query_fn`], for mutations.
pub fn mutation_fn<F, Fut, T>(f: F) -> MutationFn
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
    T: Serialize + Send + 'static,
{
    query_fn(f)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// No data and no error yet.
    Pending,
    Error,
    Success,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Fetching,
    Idle,
}

/// Combined view of status and fetch status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryLifecycle {
    Idle,
    Pending,
    Resolved,
    Failed,
    /// Resolved data is shown but was invalidated and is not being refetched.
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationStatus {
    Idle,
    Pending,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryEvent {
    Invalidated { key: String },
    FetchStarted { key: String },
    FetchSucceeded { key: String },
    FetchFailed { key: String },
    DataSet { key: String },
    MutationStarted { key: String },
    MutationSucceeded { key: String },
    MutationFailed { key: String },
}

impl QueryEvent {
    pub fn key(&self) -> &str {
        match self {
            QueryEvent::Invalidated { key }
            | QueryEvent::FetchStarted { key }
            | QueryEvent::FetchSucceeded { key }
            | QueryEvent::FetchFailed { key }
            | QueryEvent::DataSet { key }
            | QueryEvent::MutationStarted { key }
            | QueryEvent::MutationSucceeded { key }
            | QueryEvent::MutationFailed { key } => key,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Refetch in the background when a key is invalidated.
    pub refetch_on_invalidate: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            refetch_on_invalidate: true,
        }
    }
}

/// Snapshot of one cache entry.
#[derive(Debug, Clone)]
pub struct QueryState {
    pub key: String,
    pub status: QueryStatus,
    pub fetch_status: FetchStatus,
    pub data: Option<Value>,
    pub error: Option<Arc<PulseError>>,
    pub is_invalidated: bool,
    pub data_updated_at: Option<DateTime<Utc>>,
    pub fetch_count: u64,
}

impl QueryState {
    pub fn is_pending(&self) -> bool {
        self.status == QueryStatus::Pending
    }

    /// First load: nothing cached and a fetch running.
    pub fn is_loading(&self) -> bool {
        self.is_pending() && self.is_fetching()
    }

    pub fn is_fetching(&self) -> bool {
        self.fetch_status == FetchStatus::Fetching
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    pub fn is_stale(&self) -> bool {
        self.data.is_some() && self.is_invalidated
    }

    pub fn lifecycle(&self) -> QueryLifecycle {
        if self.is_fetching() {
            QueryLifecycle::Pending
        } else if self.is_error() {
            QueryLifecycle::Failed
        } else if self.is_stale() {
            QueryLifecycle::Stale
        } else if self.is_success() {
            QueryLifecycle::Resolved
        } else {
            QueryLifecycle::Idle
        }
    }

    /// Decodes the cached data into `T`.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        match &self.data {
            Some(value) => Ok(Some(T::deserialize(value)?)),
            None => Ok(None),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MutationState {
    pub key: String,
    pub status: MutationStatus,
    pub data: Option<Value>,
    pub error: Option<Arc<PulseError>>,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl MutationState {
    pub fn is_idle(&self) -> bool {
        self.status == MutationStatus::Idle
    }

    pub fn is_pending(&self) -> bool {
        self.status == MutationStatus::Pending
    }

    pub fn is_success(&self) -> bool {
        self.status == MutationStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == MutationStatus::Error
    }
}

struct QueryEntry {
    query_fn: QueryFn,
    data: Option<Value>,
    error: Option<Arc<PulseError>>,
    data_updated_at: Option<DateTime<Utc>>,
    in_flight: usize,
    invalidated: bool,
    // 抓取進行中又被 invalidate，完成後再抓一次
    refetch_queued: bool,
    fetch_count: u64,
}

impl QueryEntry {
    fn new(query_fn: QueryFn) -> Self {
        Self {
            query_fn,
            data: None,
            error: None,
            data_updated_at: None,
            in_flight: 0,
            invalidated: false,
            refetch_queued: false,
            fetch_count: 0,
        }
    }

    fn snapshot(&self, key: &str) -> QueryState {
        let status = if self.error.is_some() {
            QueryStatus::Error
        } else if self.data.is_some() {
            QueryStatus::Success
        } else {
            QueryStatus::Pending
        };

        QueryState {
            key: key.to_string(),
            status,
            fetch_status: if self.in_flight > 0 {
                FetchStatus::Fetching
            } else {
                FetchStatus::Idle
            },
            data: self.data.clone(),
            error: self.error.clone(),
            is_invalidated: self.invalidated,
            data_updated_at: self.data_updated_at,
            fetch_count: self.fetch_count,
        }
    }

    fn store_data(&mut self, value: Value) {
        self.data = Some(value);
        self.error = None;
        self.invalidated = false;
        self.data_updated_at = Some(Utc::now());
    }

    /// Ends one fetch. Returns `true` when a refetch was queued while it ran
    /// and no other fetch is left to pick it up.
    fn finish_fetch(&mut self) -> bool {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.in_flight == 0 && std::mem::take(&mut self.refetch_queued)
    }
}

/// Keeps `in_flight` balanced when a fetch future is dropped before it
/// completes.
struct InFlightGuard<'a> {
    client: &'a QueryClient,
    key: &'a str,
    armed: bool,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let requeue = self
            .client
            .queries()
            .get_mut(self.key)
            .map(QueryEntry::finish_fetch)
            .unwrap_or(false);
        tracing::debug!("Fetch of '{}' abandoned before completion", self.key);
        if requeue {
            self.client.spawn_fetch(self.key);
        }
    }
}

struct MutationEntry {
    mutation_fn: MutationFn,
    status: MutationStatus,
    data: Option<Value>,
    error: Option<Arc<PulseError>>,
    submitted_at: Option<DateTime<Utc>>,
}

impl MutationEntry {
    fn snapshot(&self, key: &str) -> MutationState {
        MutationState {
            key: key.to_string(),
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            submitted_at: self.submitted_at,
        }
    }
}

struct ClientInner {
    queries: Mutex<HashMap<String, QueryEntry>>,
    mutations: Mutex<HashMap<String, MutationEntry>>,
    events: broadcast::Sender<QueryEvent>,
    options: QueryOptions,
}

/// Keyed query cache with invalidation and mutations.
///
/// Cloning is cheap and every clone shares the same cache.
#[derive(Clone)]
pub struct QueryClient {
    inner: Arc<ClientInner>,
}

impl QueryClient {
    pub fn new() -> Self {
        Self::with_options(QueryOptions::default())
    }

    pub fn with_options(options: QueryOptions) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(ClientInner {
                queries: Mutex::new(HashMap::new()),
                mutations: Mutex::new(HashMap::new()),
                events,
                options,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueryEvent> {
        self.inner.events.subscribe()
    }

    /// Registers the fetch function of `key`. Replacing keeps cached data.
    pub fn register_query(&self, key: &str, query_fn: QueryFn) {
        let mut queries = self.queries();
        match queries.get_mut(key) {
            Some(entry) => entry.query_fn = query_fn,
            None => {
                queries.insert(key.to_string(), QueryEntry::new(query_fn));
            }
        }
        tracing::debug!("Registered query '{}'", key);
    }

    pub fn register_mutation(&self, key: &str, mutation_fn: MutationFn) {
        self.mutations().insert(
            key.to_string(),
            MutationEntry {
                mutation_fn,
                status: MutationStatus::Idle,
                data: None,
                error: None,
                submitted_at: None,
            },
        );
        tracing::debug!("Registered mutation '{}'", key);
    }

    pub fn get_status(&self, key: &str) -> Option<QueryState> {
        self.queries().get(key).map(|entry| entry.snapshot(key))
    }

    pub fn mutation_status(&self, key: &str) -> Option<MutationState> {
        self.mutations().get(key).map(|entry| entry.snapshot(key))
    }

    /// Runs the fetch function of `key` and records the outcome.
    ///
    /// A failed fetch keeps previously cached data. Results are written in
    /// completion order, so a slow fetch can overwrite a newer one. Dropping
    /// the returned future abandons the fetch and leaves the entry idle.
    pub async fn fetch_query(&self, key: &str) -> Result<Value> {
        let query_fn = {
            let mut queries = self.queries();
            let entry = queries
                .get_mut(key)
                .ok_or_else(|| PulseError::UnknownQueryError {
                    key: key.to_string(),
                })?;
            entry.in_flight += 1;
            entry.fetch_count += 1;
            // 這次抓取已涵蓋先前排隊的重抓
            entry.refetch_queued = false;
            Arc::clone(&entry.query_fn)
        };
        let mut guard = InFlightGuard {
            client: self,
            key,
            armed: true,
        };
        self.emit(QueryEvent::FetchStarted {
            key: key.to_string(),
        });

        let outcome = query_fn().await;

        let mut queries = self.queries();
        let entry = queries.get_mut(key);
        guard.armed = false;
        let (result, event, requeue) = match outcome {
            Ok(value) => {
                let requeue = match entry {
                    Some(entry) => {
                        // 抓取期間被 invalidate 的資料仍算過期
                        let invalidated_meanwhile = entry.refetch_queued;
                        entry.store_data(value.clone());
                        entry.invalidated = invalidated_meanwhile;
                        entry.finish_fetch()
                    }
                    None => false,
                };
                tracing::debug!("Query '{}' resolved", key);
                (
                    Ok(value),
                    QueryEvent::FetchSucceeded {
                        key: key.to_string(),
                    },
                    requeue,
                )
            }
            Err(e) => {
                let source = Arc::new(e);
                let requeue = match entry {
                    Some(entry) => {
                        entry.error = Some(Arc::clone(&source));
                        entry.finish_fetch()
                    }
                    None => false,
                };
                tracing::warn!("Query '{}' failed: {}", key, source);
                (
                    Err(PulseError::QueryFailed {
                        key: key.to_string(),
                        source,
                    }),
                    QueryEvent::FetchFailed {
                        key: key.to_string(),
                    },
                    requeue,
                )
            }
        };
        drop(queries);

        self.emit(event);
        if requeue {
            tracing::debug!("Refetching '{}' invalidated during the last fetch", key);
            self.spawn_fetch(key);
        }
        result
    }

    /// Cached data when present and not invalidated, otherwise a fetch.
    pub async fn ensure_query_data(&self, key: &str) -> Result<Value> {
        {
            let queries = self.queries();
            let entry = queries
                .get(key)
                .ok_or_else(|| PulseError::UnknownQueryError {
                    key: key.to_string(),
                })?;
            if let (Some(data), false) = (&entry.data, entry.invalidated) {
                return Ok(data.clone());
            }
        }
        self.fetch_query(key).await
    }

    /// Starts a background fetch. Returns `false` when no tokio runtime is
    /// available or the key is unknown.
    pub fn spawn_fetch(&self, key: &str) -> bool {
        if !self.queries().contains_key(key) {
            return false;
        }

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::warn!("No async runtime available, skipping fetch of '{}'", key);
                return false;
            }
        };

        let client = self.clone();
        let key = key.to_string();
        handle.spawn(async move {
            // 失敗已記錄在快取裡
            let _ = client.fetch_query(&key).await;
        });
        true
    }

    /// Marks `key` stale and, unless disabled, refetches it in the
    /// background. Unknown keys are ignored.
    ///
    /// While a fetch of `key` is running no second one is started; a single
    /// refetch is queued to run after it finishes.
    pub fn invalidate(&self, key: &str) -> bool {
        let refetch = self.inner.options.refetch_on_invalidate;
        let start_now = {
            let mut queries = self.queries();
            let Some(entry) = queries.get_mut(key) else {
                return false;
            };
            entry.invalidated = true;
            if refetch && entry.in_flight > 0 {
                entry.refetch_queued = true;
                false
            } else {
                refetch
            }
        };

        tracing::debug!("Invalidated query '{}'", key);
        self.emit(QueryEvent::Invalidated {
            key: key.to_string(),
        });

        if start_now {
            self.spawn_fetch(key);
        }
        true
    }

    /// Writes `value` straight into the cache without calling the fetch
    /// function.
    pub fn set_query_data<T: Serialize>(&self, key: &str, value: T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        {
            let mut queries = self.queries();
            let entry = queries
                .get_mut(key)
                .ok_or_else(|| PulseError::UnknownQueryError {
                    key: key.to_string(),
                })?;
            entry.store_data(value);
        }
        self.emit(QueryEvent::DataSet {
            key: key.to_string(),
        });
        Ok(())
    }

    pub async fn mutate(&self, key: &str) -> Result<Value> {
        let mutation_fn = {
            let mut mutations = self.mutations();
            let entry = mutations
                .get_mut(key)
                .ok_or_else(|| PulseError::UnknownMutationError {
                    key: key.to_string(),
                })?;
            entry.status = MutationStatus::Pending;
            entry.submitted_at = Some(Utc::now());
            Arc::clone(&entry.mutation_fn)
        };
        self.emit(QueryEvent::MutationStarted {
            key: key.to_string(),
        });

        let outcome = mutation_fn().await;

        let mut mutations = self.mutations();
        let entry = mutations.get_mut(key);
        match outcome {
            Ok(value) => {
                if let Some(entry) = entry {
                    entry.status = MutationStatus::Success;
                    entry.data = Some(value.clone());
                    entry.error = None;
                }
                drop(mutations);
                tracing::debug!("Mutation '{}' succeeded", key);
                self.emit(QueryEvent::MutationSucceeded {
                    key: key.to_string(),
                });
                Ok(value)
            }
            Err(e) => {
                let source = Arc::new(e);
                if let Some(entry) = entry {
                    entry.status = MutationStatus::Error;
                    entry.error = Some(Arc::clone(&source));
                }
                drop(mutations);
                tracing::warn!("Mutation '{}' failed: {}", key, source);
                self.emit(QueryEvent::MutationFailed {
                    key: key.to_string(),
                });
                Err(PulseError::MutationFailed {
                    key: key.to_string(),
                    source,
                })
            }
        }
    }

    fn emit(&self, event: QueryEvent) {
        // 沒有訂閱者時 send 會失敗，忽略即可
        let _ = self.inner.events.send(event);
    }

    fn queries(&self) -> MutexGuard<'_, HashMap<String, QueryEntry>> {
        self.inner
            .queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn mutations(&self) -> MutexGuard<'_, HashMap<String, MutationEntry>> {
        self.inner
            .mutations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for QueryClient {
    fn default() -> Self {
        Self::new()
    }
}
