//! Validity checks deciding whether a cached value may still be served.
//!
//! A policy answers "does this entry need a renewal?". An `Err` is never
//! propagated to readers: the keeper turns it into "needs renew" so that a
//! broken freshness probe degrades to always-refresh instead of wedging the
//! cache. Policies that must be strict should be infallible.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{TimeDelta, Utc};

use crate::keeper::entry::CacheEntry;

#[async_trait]
pub trait RenewPolicy<T>: Send + Sync {
    async fn needs_renew(&self, entry: &CacheEntry<T>) -> Result<bool>;
}

/// Valid as long as there is a cache.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysValid;

#[async_trait]
impl<T: Send + Sync> RenewPolicy<T> for AlwaysValid {
    async fn needs_renew(&self, entry: &CacheEntry<T>) -> Result<bool> {
        Ok(!entry.has_cache)
    }
}

/// Stale once the last successful refresh is older than the given duration.
/// An entry without a refresh date (seeded without one) counts as stale.
#[derive(Debug, Clone, Copy)]
pub struct ExpiresAfter(pub Duration);

#[async_trait]
impl<T: Send + Sync> RenewPolicy<T> for ExpiresAfter {
    async fn needs_renew(&self, entry: &CacheEntry<T>) -> Result<bool> {
        if !entry.has_cache {
            return Ok(true);
        }
        let max_age = TimeDelta::from_std(self.0).unwrap_or(TimeDelta::MAX);
        Ok(match entry.refresh_date {
            Some(refreshed) => Utc::now() - refreshed >= max_age,
            None => true,
        })
    }
}

type ExpiredFn<T> =
    dyn Fn(CacheEntry<T>) -> Pin<Box<dyn Future<Output = Result<bool>> + Send>> + Send + Sync;

/// Stale when an externally supplied predicate says so.
pub struct ExpiredWhen<T> {
    predicate: Arc<ExpiredFn<T>>,
}

impl<T> ExpiredWhen<T> {
    pub fn new<F, Fut>(predicate: F) -> Self
    where
        F: Fn(CacheEntry<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool>> + Send + 'static,
    {
        Self {
            predicate: Arc::new(move |entry| Box::pin(predicate(entry))),
        }
    }
}

#[async_trait]
impl<T: Clone + Send + Sync> RenewPolicy<T> for ExpiredWhen<T> {
    async fn needs_renew(&self, entry: &CacheEntry<T>) -> Result<bool> {
        if !entry.has_cache {
            return Ok(true);
        }
        (self.predicate)(entry.clone()).await
    }
}
