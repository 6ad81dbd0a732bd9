//! Keyed revalidating cache for list queries.
//!
//! The cache is owned by the calling layer and keyed by request URL. A
//! `RevalidationPolicy` decides when a cached entry must be refetched on
//! access; per-entry `QueryOptions` decide whether a window-focus event
//! refetches it. A failed refetch keeps the last good data next to the
//! error.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::ApiResult;

/// Decides whether a cached entry of a given age must be refetched.
pub trait RevalidationPolicy {
    fn is_stale(&self, age: Duration) -> bool;
}

/// Refetch on every access, serving the previous data if the fetch fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysRevalidate;

impl RevalidationPolicy for AlwaysRevalidate {
    fn is_stale(&self, _age: Duration) -> bool {
        true
    }
}

/// Serve cached entries younger than the given age.
#[derive(Debug, Clone, Copy)]
pub struct MaxAge(pub Duration);

impl RevalidationPolicy for MaxAge {
    fn is_stale(&self, age: Duration) -> bool {
        age >= self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    pub revalidate_on_focus: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            revalidate_on_focus: true,
        }
    }
}

/// Snapshot of a query: loading means neither data nor error yet.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<T> {
    pub data: Option<T>,
    pub error: Option<String>,
    pub is_loading: bool,
}

impl<T> QueryState<T> {
    fn new(data: Option<T>, error: Option<String>) -> Self {
        let is_loading = data.is_none() && error.is_none();
        Self {
            data,
            error,
            is_loading,
        }
    }
}

impl QueryState<Value> {
    /// Deserialize the cached JSON; a shape mismatch becomes the error.
    pub fn into_typed<T: DeserializeOwned>(self) -> QueryState<T> {
        match self.data {
            None | Some(Value::Null) => QueryState::new(None, self.error),
            Some(value) => match serde_json::from_value(value) {
                Ok(data) => QueryState::new(Some(data), self.error),
                Err(e) => QueryState::new(None, Some(e.to_string())),
            },
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    data: Option<Value>,
    error: Option<String>,
    fetched_at: Option<Instant>,
    options: QueryOptions,
}

impl Entry {
    fn state(&self) -> QueryState<Value> {
        QueryState::new(self.data.clone(), self.error.clone())
    }

    fn store(&mut self, result: ApiResult<Value>) {
        match result {
            Ok(data) => {
                self.data = Some(data);
                self.error = None;
            }
            Err(e) => self.error = Some(e.to_string()),
        }
        self.fetched_at = Some(Instant::now());
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryCache<P = AlwaysRevalidate> {
    entries: HashMap<String, Entry>,
    policy: P,
}

impl QueryCache<AlwaysRevalidate> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<P: RevalidationPolicy> QueryCache<P> {
    pub fn with_policy(policy: P) -> Self {
        Self {
            entries: HashMap::new(),
            policy,
        }
    }

    /// Return the entry for `key`, running `fetch` first if it is missing
    /// or stale. `options` replace the entry's stored options.
    pub fn query<F>(&mut self, key: &str, options: QueryOptions, fetch: F) -> QueryState<Value>
    where
        F: FnOnce() -> ApiResult<Value>,
    {
        let entry = self.entries.entry(key.to_string()).or_insert_with(|| Entry {
            data: None,
            error: None,
            fetched_at: None,
            options,
        });
        entry.options = options;

        let stale = match entry.fetched_at {
            None => true,
            Some(at) => self.policy.is_stale(at.elapsed()),
        };
        if stale {
            debug!(key, "revalidating query");
            entry.store(fetch());
        }
        entry.state()
    }

    /// Refetch every entry that opted into focus revalidation; returns the
    /// keys that were refetched.
    pub fn revalidate_on_focus<F>(&mut self, mut fetch: F) -> Vec<String>
    where
        F: FnMut(&str) -> ApiResult<Value>,
    {
        let mut refreshed = Vec::new();
        for (key, entry) in &mut self.entries {
            if entry.options.revalidate_on_focus {
                entry.store(fetch(key));
                refreshed.push(key.clone());
            }
        }
        refreshed.sort();
        refreshed
    }

    /// Current state without fetching.
    pub fn peek(&self, key: &str) -> QueryState<Value> {
        self.entries
            .get(key)
            .map(Entry::state)
            .unwrap_or_else(|| QueryState::new(None, None))
    }

    /// Replace cached data, e.g. after a local edit; the entry counts as
    /// freshly fetched.
    pub fn mutate(&mut self, key: &str, data: Value) {
        let entry = self.entries.entry(key.to_string()).or_insert_with(|| Entry {
            data: None,
            error: None,
            fetched_at: None,
            options: QueryOptions::default(),
        });
        entry.store(Ok(data));
    }

    pub fn invalidate(&mut self, key: &str) {
        self.entries.remove(key);
    }
}
