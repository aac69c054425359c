use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use tokio::sync::{broadcast, Mutex};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::helpers::time::next_refresh_date;
use crate::keeper::entry::{CacheEntry, KeeperEvent, Renewal};
use crate::keeper::error::{KeeperError, KeeperResult};
use crate::keeper::policy::{AlwaysValid, RenewPolicy};
use crate::observability::metrics::get_metrics;
use crate::scheduler::renew_timer::{RenewTimer, TimerConfig};
use crate::utils::constants::{DEFAULT_EVENT_CAPACITY, DEFAULT_KEEPER_NAME};

/// Asynchronous, argument-less operation producing a fresh value.
pub type Resolver<T> = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<T>> + Send + Sync>;

/// Wraps an async closure into a [`Resolver`].
pub fn resolver<T, F, Fut>(resolve: F) -> Resolver<T>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
{
    Arc::new(move || Box::pin(resolve()))
}

struct State<T> {
    entry: CacheEntry<T>,
    renewing: bool,
    /// id of the most recently started attempt
    attempt: u64,
    /// id of the most recent successful attempt, 0 if none
    last_success: u64,
    last_failure: Option<(u64, KeeperError)>,
}

/// What a caller saw when it entered `get`/`renew`.
struct Observed<T> {
    entry: CacheEntry<T>,
    renewing: bool,
    attempt: u64,
    last_success: u64,
}

/// Holder of one lazily resolved value with single-flight renewal.
///
/// Reads of a valid cache are served from a snapshot without touching the
/// coordination token. Everything that may resolve goes through the token, so
/// at most one resolve operation runs at any time. Callers that arrive while
/// an attempt is in flight wait for it and receive its outcome, success or
/// failure, instead of starting their own.
///
/// Successful renewals and failed attempts are published on a broadcast
/// channel (see [`subscribe`](Self::subscribe)) after the token is released,
/// so subscribers may call back into the keeper.
pub struct SingletonKeeper<T> {
    name: String,
    resolver: Option<Resolver<T>>,
    policy: Box<dyn RenewPolicy<T>>,
    state: RwLock<State<T>>,
    token: Mutex<()>,
    events: broadcast::Sender<KeeperEvent<T>>,
}

impl<T> SingletonKeeper<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Empty keeper; the first `get` resolves.
    pub fn new<F, Fut>(resolve: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        Self::build(Some(resolver(resolve)), CacheEntry::empty())
    }

    /// Keeper pre-seeded with a value and no resolver. Renewals hand back the
    /// seeded value unchanged.
    pub fn with_cache(value: T, refresh_date: Option<DateTime<Utc>>) -> Self {
        Self::build(None, CacheEntry::seeded(value, refresh_date))
    }

    pub fn with_resolver_and_cache<F, Fut>(
        resolve: F,
        value: T,
        refresh_date: Option<DateTime<Utc>>,
    ) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        Self::build(Some(resolver(resolve)), CacheEntry::seeded(value, refresh_date))
    }

    pub fn from_resolver(resolver: Resolver<T>) -> Self {
        Self::build(Some(resolver), CacheEntry::empty())
    }

    fn build(resolver: Option<Resolver<T>>, entry: CacheEntry<T>) -> Self {
        let (events, _) = broadcast::channel(DEFAULT_EVENT_CAPACITY);
        Self {
            name: DEFAULT_KEEPER_NAME.to_owned(),
            resolver,
            policy: Box::new(AlwaysValid),
            state: RwLock::new(State {
                entry,
                renewing: false,
                attempt: 0,
                last_success: 0,
                last_failure: None,
            }),
            token: Mutex::new(()),
            events,
        }
    }

    /// Label used in logs and metrics.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_policy(mut self, policy: impl RenewPolicy<T> + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        self.events = events;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cached value, if there is one that may be served.
    pub fn cache(&self) -> Option<T> {
        self.read_state().entry.cached().cloned()
    }

    pub fn has_cache(&self) -> bool {
        self.read_state().entry.has_cache
    }

    pub fn refresh_date(&self) -> Option<DateTime<Utc>> {
        self.read_state().entry.refresh_date
    }

    /// Consistent snapshot of value, flag and timestamp.
    pub fn entry(&self) -> CacheEntry<T> {
        self.read_state().entry.clone()
    }

    /// Whether a resolve operation is currently running.
    pub fn is_renewing(&self) -> bool {
        self.read_state().renewing
    }

    pub fn subscribe(&self) -> broadcast::Receiver<KeeperEvent<T>> {
        self.events.subscribe()
    }

    /// Returns the cached value when it is still valid, otherwise renews.
    pub async fn get(&self) -> KeeperResult<T> {
        self.acquire(false).await
    }

    /// Resolves a new value regardless of the validity check. Overlapping an
    /// in-flight attempt yields that attempt's outcome.
    pub async fn renew(&self) -> KeeperResult<T> {
        self.acquire(true).await
    }

    /// Marks the cache as not servable. The old value is kept for the next
    /// renewal notification; an in-flight attempt is left running.
    pub fn clear_cache(&self) {
        self.write_state().entry.has_cache = false;
        debug!(keeper = %self.name, "cache cleared");
    }

    /// Timer renewing this keeper on a cadence unless `is_paused` says
    /// otherwise. Must be called inside a tokio runtime.
    pub fn create_renew_timer<P>(self: &Arc<Self>, config: TimerConfig, is_paused: P) -> RenewTimer
    where
        P: Fn() -> bool + Send + Sync + 'static,
    {
        RenewTimer::spawn(Arc::clone(self), config, is_paused)
    }

    async fn acquire(&self, force: bool) -> KeeperResult<T> {
        let seen = self.observe();

        // generation judged stale on the fast path
        let mut stale_at = None;
        if !seen.renewing && !force && seen.entry.has_cache {
            if !self.needs_renew(&seen.entry).await {
                if let Some(value) = &seen.entry.value {
                    debug!(keeper = %self.name, "serving cached value");
                    get_metrics().await.cache_hits.with_label_values(&[self.name.as_str()]).inc();
                    return Ok(value.clone());
                }
            }
            stale_at = Some(seen.last_success);
        }

        let (result, event) = {
            let _token = self.token.lock().await;
            self.acquire_locked(force, &seen, stale_at).await
        };

        if let Some(event) = event {
            // no receivers is fine
            let _ = self.events.send(event);
        }
        result
    }

    async fn acquire_locked(
        &self,
        force: bool,
        seen: &Observed<T>,
        stale_at: Option<u64>,
    ) -> (KeeperResult<T>, Option<KeeperEvent<T>>) {
        let current = self.observe();

        if seen.renewing {
            match self.outcome_since(seen.attempt) {
                Some(Err(_)) if !force && current.entry.has_cache => {
                    // a failed attempt leaves the cache servable for plain reads
                    if let Some(value) = &current.entry.value {
                        debug!(keeper = %self.name, attempt = seen.attempt, "joined renewal failed, serving cache");
                        return (Ok(value.clone()), None);
                    }
                }
                Some(outcome) => {
                    debug!(keeper = %self.name, attempt = seen.attempt, "joined in-flight renewal");
                    return (outcome, None);
                }
                None => {}
            }
        }

        if !force && current.entry.has_cache {
            let valid = match stale_at {
                Some(generation) if generation == current.last_success => false,
                Some(_) => true,
                None => !self.needs_renew(&current.entry).await,
            };
            if valid {
                if let Some(value) = &current.entry.value {
                    return (Ok(value.clone()), None);
                }
            }
        }

        self.resolve_locked(current.entry).await
    }

    /// Outcome of attempt `attempt` or of a later one, if any has finished.
    fn outcome_since(&self, attempt: u64) -> Option<KeeperResult<T>> {
        let state = self.read_state();
        if state.last_success >= attempt {
            if let Some(value) = state.entry.cached() {
                return Some(Ok(value.clone()));
            }
        }
        match &state.last_failure {
            Some((failed, error)) if *failed >= attempt && *failed > state.last_success => {
                Some(Err(error.clone()))
            }
            _ => None,
        }
    }

    async fn resolve_locked(
        &self,
        entry: CacheEntry<T>,
    ) -> (KeeperResult<T>, Option<KeeperEvent<T>>) {
        let Some(resolve) = &self.resolver else {
            debug!(keeper = %self.name, "no resolver, keeping current value");
            return (entry.value.ok_or(KeeperError::Empty), None);
        };

        let attempt = {
            let mut state = self.write_state();
            state.attempt += 1;
            state.renewing = true;
            state.attempt
        };
        let mut in_flight = InFlight {
            state: &self.state,
            armed: true,
        };

        let metrics = get_metrics().await;
        metrics.resolve_attempts.with_label_values(&[self.name.as_str()]).inc();
        let start = Instant::now();
        let outcome = resolve().await;
        metrics
            .resolve_duration
            .with_label_values(&[self.name.as_str()])
            .observe(start.elapsed().as_secs_f64());

        match outcome {
            Ok(value) => {
                let (previous, refreshed_at) = {
                    let mut state = self.write_state();
                    let refreshed_at = next_refresh_date(state.entry.refresh_date);
                    let previous = state.entry.value.replace(value.clone());
                    state.entry.has_cache = true;
                    state.entry.refresh_date = Some(refreshed_at);
                    state.last_success = attempt;
                    state.renewing = false;
                    (previous, refreshed_at)
                };
                in_flight.armed = false;

                metrics
                    .refresh_timestamp
                    .with_label_values(&[self.name.as_str()])
                    .set(refreshed_at.timestamp());
                info!(keeper = %self.name, attempt, refreshed_at = %refreshed_at, "cache renewed");

                let event = KeeperEvent::Renewed(Renewal {
                    previous,
                    current: value.clone(),
                    refreshed_at,
                });
                (Ok(value), Some(event))
            }
            Err(err) => {
                let error = KeeperError::resolve(err);
                {
                    let mut state = self.write_state();
                    state.last_failure = Some((attempt, error.clone()));
                    state.renewing = false;
                }
                in_flight.armed = false;

                metrics.resolve_failures.with_label_values(&[self.name.as_str()]).inc();
                warn!(keeper = %self.name, attempt, error = %error, "resolve failed");

                let event = KeeperEvent::Failed {
                    attempt,
                    error: error.clone(),
                };
                (Err(error), Some(event))
            }
        }
    }

    /// Validity check with errors mapped to "needs renew".
    async fn needs_renew(&self, entry: &CacheEntry<T>) -> bool {
        match self.policy.needs_renew(entry).await {
            Ok(needs) => needs,
            Err(err) => {
                get_metrics()
                    .await
                    .validity_check_failures
                    .with_label_values(&[self.name.as_str()])
                    .inc();
                warn!(keeper = %self.name, error = %err, "validity check failed, renewing");
                true
            }
        }
    }

    fn observe(&self) -> Observed<T> {
        let state = self.read_state();
        Observed {
            entry: state.entry.clone(),
            renewing: state.renewing,
            attempt: state.attempt,
            last_success: state.last_success,
        }
    }
}

impl<T> SingletonKeeper<T> {
    // the lock is never held across user code, a poisoned guard still holds a
    // consistent state
    fn read_state(&self) -> RwLockReadGuard<'_, State<T>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, State<T>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the in-flight flag when a resolving future is dropped mid-way.
struct InFlight<'a, T> {
    state: &'a RwLock<State<T>>,
    armed: bool,
}

impl<T> Drop for InFlight<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            self.state
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .renewing = false;
        }
    }
}
