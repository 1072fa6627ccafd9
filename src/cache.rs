//! Query cache keyed by semantic tags, backed by moka.
//!
//! Entries are grouped by a tag such as `"products"` plus an optional scope (an id, or
//! `"live"`). Mutations invalidate whole tags; the next read refetches.

use moka::future::Cache;
use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use crate::Result;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub tag: &'static str,
    pub scope: Option<String>,
}

impl QueryKey {
    pub fn list(tag: &'static str) -> Self { Self { tag, scope: None } }
    pub fn scoped(tag: &'static str, scope: impl Into<String>) -> Self { Self { tag, scope: Some(scope.into()) } }
}

#[derive(Clone)]
pub struct QueryCache {
    inner: Cache<QueryKey, Arc<dyn Any + Send + Sync>>,
    retries: u32,
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache").field("entries", &self.inner.entry_count()).field("retries", &self.retries).finish()
    }
}

impl QueryCache {
    #[must_use]
    pub fn new(max_capacity: u64, ttl: Duration, retries: u32) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .support_invalidation_closures()
                .build(),
            retries,
        }
    }

    pub fn retries(&self) -> u32 { self.retries }

    pub async fn get<T: Clone + Send + Sync + 'static>(&self, key: &QueryKey) -> Option<T> {
        self.inner.get(key).await.and_then(|v| v.downcast_ref::<T>().cloned())
    }

    pub async fn insert<T: Send + Sync + 'static>(&self, key: QueryKey, value: T) {
        self.inner.insert(key, Arc::new(value)).await;
    }

    pub async fn remove(&self, key: &QueryKey) { self.inner.invalidate(key).await; }

    /// Drops every entry under `tag`, whatever its scope.
    pub fn invalidate_tag(&self, tag: &'static str) {
        if let Err(e) = self.inner.invalidate_entries_if(move |k, _| k.tag == tag) {
            tracing::warn!(tag, error = %e, "tag invalidation unavailable, clearing cache");
            self.inner.invalidate_all();
        }
    }

    /// Read-through fetch without retries.
    pub async fn fetch<T, F, Fut>(&self, key: QueryKey, f: F) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.fetch_with_retries(key, 0, f).await
    }

    /// Read-through fetch using the configured retry count.
    pub async fn fetch_retried<T, F, Fut>(&self, key: QueryKey, f: F) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.fetch_with_retries(key, self.retries, f).await
    }

    async fn fetch_with_retries<T, F, Fut>(&self, key: QueryKey, retries: u32, f: F) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(hit) = self.get::<T>(&key).await {
            tracing::debug!(tag = key.tag, scope = ?key.scope, "cache hit");
            return Ok(hit);
        }
        let mut attempt = 0;
        let value = loop {
            match f().await {
                Ok(value) => break value,
                Err(e) if attempt < retries => {
                    attempt += 1;
                    tracing::debug!(tag = key.tag, attempt, error = %e, "retrying query");
                }
                Err(e) => return Err(e),
            }
        };
        self.insert(key, value.clone()).await;
        Ok(value)
    }
}
