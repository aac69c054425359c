use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::info;

use crate::keeper::{CacheEntry, KeeperEvent, KeeperResult, SingletonKeeper};
use crate::observability::metrics::get_metrics;
use crate::scheduler::renew_timer::{RenewTimer, TimerConfig};

/// Keeper plus a pausable background renew timer.
///
/// Dropping the scheduler (or calling [`dispose`](Self::dispose)) cancels the
/// timer. The keeper itself is shared and keeps working for whoever else
/// holds it.
pub struct RenewScheduler<T> {
    keeper: Arc<SingletonKeeper<T>>,
    paused: Arc<AtomicBool>,
    timer: RenewTimer,
}

impl<T> RenewScheduler<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(keeper: Arc<SingletonKeeper<T>>, config: TimerConfig) -> Self {
        let paused = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&paused);
        let timer = keeper.create_renew_timer(config, move || flag.load(Ordering::Acquire));
        info!(
            keeper = %keeper.name(),
            initial_delay = ?config.initial_delay,
            interval = ?config.interval,
            "renew scheduler started"
        );
        Self {
            keeper,
            paused,
            timer,
        }
    }

    pub fn from_resolver<F, Fut>(resolve: F, config: TimerConfig) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        Self::new(Arc::new(SingletonKeeper::new(resolve)), config)
    }

    pub fn from_resolver_with_cache<F, Fut>(
        resolve: F,
        config: TimerConfig,
        value: T,
        refresh_date: Option<DateTime<Utc>>,
    ) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let keeper = SingletonKeeper::with_resolver_and_cache(resolve, value, refresh_date);
        Self::new(Arc::new(keeper), config)
    }

    pub async fn pause(&self) {
        self.set_paused(true).await;
    }

    pub async fn resume(&self) {
        self.set_paused(false).await;
    }

    async fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
        get_metrics()
            .await
            .paused
            .with_label_values(&[self.keeper.name()])
            .set(i64::from(paused));
        info!(keeper = %self.keeper.name(), paused, "renew scheduler pause toggled");
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub fn keeper(&self) -> &Arc<SingletonKeeper<T>> {
        &self.keeper
    }

    pub fn timer_active(&self) -> bool {
        self.timer.is_active()
    }

    pub async fn get(&self) -> KeeperResult<T> {
        self.keeper.get().await
    }

    pub async fn renew(&self) -> KeeperResult<T> {
        self.keeper.renew().await
    }

    pub fn clear_cache(&self) {
        self.keeper.clear_cache()
    }

    pub fn cache(&self) -> Option<T> {
        self.keeper.cache()
    }

    pub fn has_cache(&self) -> bool {
        self.keeper.has_cache()
    }

    pub fn refresh_date(&self) -> Option<DateTime<Utc>> {
        self.keeper.refresh_date()
    }

    pub fn entry(&self) -> CacheEntry<T> {
        self.keeper.entry()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<KeeperEvent<T>> {
        self.keeper.subscribe()
    }

    /// Stops the timer and hands the keeper back.
    pub fn dispose(mut self) -> Arc<SingletonKeeper<T>> {
        self.timer.cancel();
        info!(keeper = %self.keeper.name(), "renew scheduler disposed");
        Arc::clone(&self.keeper)
    }
}
