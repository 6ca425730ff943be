//! Key-indexed query cache
//!
//! Each logical key owns exactly one cache entry. All subscribers of a key
//! observe the same phase and value through a `watch` channel.
//!
//! # Write ownership
//!
//! - The live fetch writes on success and on final failure
//! - `set_value` writes directly and detaches any live fetch
//! - `invalidate` never writes a value, it only starts a fetch
//!
//! Every fetch start and every `set_value` bumps the entry generation. A
//! fetch only commits if its generation is still the live one, so a stale
//! fetch can never clobber a confirmed `set_value`.

use crate::error::QueryError;
use crate::retry::RetryPolicy;
use crate::TaskFn;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Weak};
use tokio::sync::watch;

/// Logical resource identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryKey(String);

impl QueryKey {
    /// Create key
    #[inline]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QueryKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for QueryKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// Discrete phase of a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueryPhase {
    /// Fetch in progress, no fresh result yet
    Loading,
    /// Value available
    Success,
    /// Fetch failed after automatic retries
    Error,
}

/// Observable state of one cache entry
///
/// `value` may hold the last known value while `Loading` or `Error`;
/// consumers decide on `phase` first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryState<T> {
    /// Current phase
    pub phase: QueryPhase,
    /// Last committed value
    pub value: Option<T>,
    /// Failure message when `phase` is `Error`
    pub error: Option<String>,
    /// Failed attempts in the current fetch
    pub failure_count: u32,
    /// Time of the last committed value
    pub updated_at: Option<DateTime<Utc>>,
}

impl<T> QueryState<T> {
    /// Fresh loading state without a value
    #[inline]
    #[must_use]
    pub fn loading() -> Self {
        Self {
            phase: QueryPhase::Loading,
            value: None,
            error: None,
            failure_count: 0,
            updated_at: None,
        }
    }

    /// Success state holding `value`
    #[inline]
    #[must_use]
    pub fn success(value: T) -> Self {
        Self {
            phase: QueryPhase::Success,
            value: Some(value),
            error: None,
            failure_count: 0,
            updated_at: Some(Utc::now()),
        }
    }

    /// Error state carrying `message`
    #[inline]
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            phase: QueryPhase::Error,
            value: None,
            error: Some(message.into()),
            failure_count: 0,
            updated_at: None,
        }
    }

    /// Check if loading
    #[inline]
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.phase == QueryPhase::Loading
    }

    /// Check if settled in error
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.phase == QueryPhase::Error
    }

    /// Check if a value is available
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.phase == QueryPhase::Success
    }
}

struct EntryControl<T> {
    fetcher: Option<TaskFn<T>>,
    generation: u64,
    in_flight: Option<u64>,
    observers: usize,
}

struct QueryEntry<T> {
    key: QueryKey,
    state: watch::Sender<QueryState<T>>,
    control: Mutex<EntryControl<T>>,
}

impl<T> QueryEntry<T> {
    fn new(key: QueryKey) -> Self {
        Self {
            key,
            state: watch::Sender::new(QueryState::loading()),
            control: Mutex::new(EntryControl {
                fetcher: None,
                generation: 0,
                in_flight: None,
                observers: 0,
            }),
        }
    }
}

struct ClientInner<T> {
    entries: DashMap<QueryKey, Arc<QueryEntry<T>>>,
    policy: RetryPolicy,
}

/// Query cache shared by every consumer of a process or session
///
/// Cheap to clone; clones share the same store. Operations that start a
/// fetch spawn onto the current Tokio runtime.
pub struct QueryClient<T> {
    inner: Arc<ClientInner<T>>,
}

impl<T> Clone for QueryClient<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for QueryClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryClient")
            .field("entries", &self.inner.entries.len())
            .field("policy", &self.inner.policy)
            .finish()
    }
}

impl<T> Default for QueryClient<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl<T> QueryClient<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create empty cache with the given retry policy
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                entries: DashMap::new(),
                policy,
            }),
        }
    }

    /// Retry policy applied to every fetch
    #[inline]
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        self.inner.policy
    }

    /// Subscribe to `key`, registering `fetcher` as its data source
    ///
    /// Starts a fetch when none is in flight and no value is cached.
    ///
    /// # Panics
    /// Panics if a fetch must start outside a Tokio runtime.
    pub fn subscribe(&self, key: impl Into<QueryKey>, fetcher: TaskFn<T>) -> QuerySubscription<T> {
        let entry = self.entry(key.into());

        let mut control = entry.control.lock();
        control.fetcher = Some(fetcher);
        control.observers += 1;

        let has_value = entry.state.borrow().value.is_some();
        if control.in_flight.is_none() && !has_value {
            self.start_fetch(&entry, &mut control);
        }
        let receiver = entry.state.subscribe();
        drop(control);

        QuerySubscription {
            key: entry.key.clone(),
            entry: Arc::downgrade(&entry),
            receiver,
        }
    }

    /// Mark `key` stale and refetch it
    ///
    /// Coalesces with a fetch that is already in flight.
    ///
    /// # Errors
    /// - `QueryError::UnknownKey` if nothing was cached under `key`
    /// - `QueryError::NoFetcher` if no subscriber registered a fetcher
    pub fn invalidate(&self, key: &QueryKey) -> Result<(), QueryError> {
        let entry = self
            .get_entry(key)
            .ok_or_else(|| QueryError::UnknownKey(key.to_string()))?;

        let mut control = entry.control.lock();
        if control.fetcher.is_none() {
            return Err(QueryError::NoFetcher(key.to_string()));
        }
        if control.in_flight.is_some() {
            tracing::debug!(key = %key, "invalidation coalesced with in-flight fetch");
            return Ok(());
        }

        tracing::debug!(key = %key, "invalidated");
        self.start_fetch(&entry, &mut control);
        Ok(())
    }

    /// Write `value` under `key` without fetching
    ///
    /// Authoritative over any fetch in flight for the key. A key that was
    /// never cached, or was torn down by `remove`/`clear`, gets a fresh
    /// entry holding `value`: subscriptions to the old entry stay closed and
    /// later subscribers are served the value without a fetch.
    pub fn set_value(&self, key: &QueryKey, value: T) {
        let entry = self.entry(key.clone());

        let mut control = entry.control.lock();
        control.generation += 1;
        if control.in_flight.take().is_some() {
            tracing::debug!(key = %key, "in-flight fetch detached by direct write");
        }
        entry.state.send_replace(QueryState::success(value));
        drop(control);

        tracing::info!(key = %key, "cache value set");
    }

    /// Current state of `key`
    #[must_use]
    pub fn state(&self, key: &QueryKey) -> Option<QueryState<T>> {
        self.get_entry(key).map(|entry| entry.state.borrow().clone())
    }

    /// Last committed value of `key`
    #[must_use]
    pub fn get_value(&self, key: &QueryKey) -> Option<T> {
        self.get_entry(key)
            .and_then(|entry| entry.state.borrow().value.clone())
    }

    /// Whether a live fetch is running for `key`
    #[must_use]
    pub fn is_fetching(&self, key: &QueryKey) -> bool {
        self.get_entry(key)
            .is_some_and(|entry| entry.control.lock().in_flight.is_some())
    }

    /// Number of live subscriptions on `key`
    #[must_use]
    pub fn observer_count(&self, key: &QueryKey) -> usize {
        self.get_entry(key)
            .map_or(0, |entry| entry.control.lock().observers)
    }

    /// Number of cached keys
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    /// Check if nothing is cached
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// Drop the entry for `key`; fetches still running for it are discarded
    pub fn remove(&self, key: &QueryKey) -> bool {
        self.inner.entries.remove(key).is_some()
    }

    /// Tear down every entry
    pub fn clear(&self) {
        self.inner.entries.clear();
        tracing::debug!("query cache cleared");
    }

    fn get_entry(&self, key: &QueryKey) -> Option<Arc<QueryEntry<T>>> {
        self.inner.entries.get(key).map(|entry| Arc::clone(&entry))
    }

    fn entry(&self, key: QueryKey) -> Arc<QueryEntry<T>> {
        let entry = self
            .inner
            .entries
            .entry(key.clone())
            .or_insert_with(|| Arc::new(QueryEntry::new(key)));
        Arc::clone(&entry)
    }

    fn start_fetch(&self, entry: &Arc<QueryEntry<T>>, control: &mut EntryControl<T>) {
        let Some(fetcher) = control.fetcher.clone() else {
            return;
        };

        control.generation += 1;
        let generation = control.generation;
        control.in_flight = Some(generation);

        entry.state.send_modify(|state| {
            state.phase = QueryPhase::Loading;
            state.error = None;
            state.failure_count = 0;
        });

        tracing::debug!(key = %entry.key, generation, "fetch started");
        tokio::spawn(run_fetch(
            Arc::downgrade(entry),
            fetcher,
            self.inner.policy,
            generation,
        ));
    }
}

async fn run_fetch<T>(
    entry: Weak<QueryEntry<T>>,
    fetcher: TaskFn<T>,
    policy: RetryPolicy,
    generation: u64,
) where
    T: Clone + Send + Sync + 'static,
{
    let mut failures = 0u32;

    let outcome = loop {
        match fetcher().await {
            Ok(value) => break Ok(value),
            Err(err) => {
                let message = err.to_string();
                failures += 1;

                let Some(live) = entry.upgrade() else {
                    return;
                };
                {
                    let control = live.control.lock();
                    if control.in_flight != Some(generation) {
                        return;
                    }
                    live.state.send_modify(|state| state.failure_count = failures);
                }

                if !policy.should_retry(failures) {
                    break Err(message);
                }

                let delay = policy.backoff(failures - 1);
                tracing::warn!(
                    key = %live.key,
                    attempt = failures,
                    error = %message,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "fetch failed, retrying"
                );
                drop(live);
                tokio::time::sleep(delay).await;
            }
        }
    };

    let Some(live) = entry.upgrade() else {
        tracing::debug!(generation, "fetch resolved after teardown, discarded");
        return;
    };

    let mut control = live.control.lock();
    if control.in_flight != Some(generation) {
        tracing::debug!(key = %live.key, generation, "stale fetch result discarded");
        return;
    }
    control.in_flight = None;

    match outcome {
        Ok(value) => {
            tracing::debug!(key = %live.key, "fetch succeeded");
            live.state.send_modify(|state| {
                state.phase = QueryPhase::Success;
                state.value = Some(value);
                state.error = None;
                state.failure_count = 0;
                state.updated_at = Some(Utc::now());
            });
        }
        Err(message) => {
            tracing::warn!(key = %live.key, attempts = failures, error = %message, "fetch failed");
            live.state.send_modify(|state| {
                state.phase = QueryPhase::Error;
                state.error = Some(message);
            });
        }
    }
}

/// Live observation of one cache entry
///
/// Dropping the subscription releases its observer slot.
pub struct QuerySubscription<T> {
    key: QueryKey,
    entry: Weak<QueryEntry<T>>,
    receiver: watch::Receiver<QueryState<T>>,
}

impl<T: Clone> QuerySubscription<T> {
    /// Observed key
    #[inline]
    #[must_use]
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Snapshot of the current state
    #[must_use]
    pub fn state(&self) -> QueryState<T> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next state change
    ///
    /// # Errors
    /// `QueryError::Closed` once the entry has been torn down.
    pub async fn changed(&mut self) -> Result<(), QueryError> {
        self.receiver
            .changed()
            .await
            .map_err(|_| QueryError::Closed(self.key.to_string()))
    }
}

impl<T> fmt::Debug for QuerySubscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuerySubscription")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl<T> Drop for QuerySubscription<T> {
    fn drop(&mut self) {
        if let Some(entry) = self.entry.upgrade() {
            let mut control = entry.control.lock();
            control.observers = control.observers.saturating_sub(1);
        }
    }
}
