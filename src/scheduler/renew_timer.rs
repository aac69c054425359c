use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{sleep, MissedTickBehavior};
use tracing::{debug, warn};

use crate::keeper::SingletonKeeper;
use crate::observability::metrics::get_metrics;

static PAUSED_MSG: &str = "paused";
static RENEWED_MSG: &str = "renewed";
static ERROR_MSG: &str = "error";

/// Cadence of a renew timer.
///
/// `initial_delay: None` means the timer never starts on its own,
/// `interval: None` (or zero) means it fires once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerConfig {
    pub initial_delay: Option<Duration>,
    pub interval: Option<Duration>,
}

impl TimerConfig {
    pub fn new(initial_delay: Option<Duration>, interval: Option<Duration>) -> Self {
        Self {
            initial_delay,
            interval: interval.filter(|interval| !interval.is_zero()),
        }
    }

    /// Fires right away, then every `interval`.
    pub fn periodic(interval: Duration) -> Self {
        Self::new(Some(Duration::ZERO), Some(interval))
    }

    pub fn once_after(delay: Duration) -> Self {
        Self::new(Some(delay), None)
    }

    pub fn disabled() -> Self {
        Self::new(None, None)
    }

    /// Millisecond form where a negative number stands for "not set".
    pub fn from_millis(initial_delay_ms: i64, interval_ms: i64) -> Self {
        let to_duration = |ms: i64| u64::try_from(ms).ok().map(Duration::from_millis);
        Self::new(to_duration(initial_delay_ms), to_duration(interval_ms))
    }
}

/// Handle on a background task renewing a keeper.
///
/// The task is aborted by [`cancel`](Self::cancel) or when the handle is
/// dropped; no tick fires afterwards. A renewal interrupted by cancellation
/// leaves the keeper's state as it was.
pub struct RenewTimer {
    handle: Option<JoinHandle<()>>,
}

impl RenewTimer {
    pub(crate) fn spawn<T, P>(keeper: Arc<SingletonKeeper<T>>, config: TimerConfig, is_paused: P) -> Self
    where
        T: Clone + Send + Sync + 'static,
        P: Fn() -> bool + Send + Sync + 'static,
    {
        let Some(initial_delay) = config.initial_delay else {
            debug!(keeper = %keeper.name(), "renew timer configured to never start");
            return Self { handle: None };
        };

        let handle = tokio::spawn(async move {
            sleep(initial_delay).await;
            match config.interval {
                None => tick(&keeper, &is_paused).await,
                Some(period) => {
                    let mut ticker = tokio::time::interval(period);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    loop {
                        ticker.tick().await;
                        tick(&keeper, &is_paused).await;
                    }
                }
            }
        });

        Self {
            handle: Some(handle),
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for RenewTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Nobody awaits a timer renewal, so failures stop here. They are still
/// published as `KeeperEvent::Failed` by the keeper.
async fn tick<T, P>(keeper: &SingletonKeeper<T>, is_paused: &P)
where
    T: Clone + Send + Sync + 'static,
    P: Fn() -> bool,
{
    let metrics = get_metrics().await;
    if is_paused() {
        debug!(keeper = %keeper.name(), "renew tick skipped, paused");
        metrics
            .timer_ticks
            .with_label_values(&[keeper.name(), PAUSED_MSG])
            .inc();
        return;
    }

    match keeper.renew().await {
        Ok(_) => {
            metrics
                .timer_ticks
                .with_label_values(&[keeper.name(), RENEWED_MSG])
                .inc();
        }
        Err(err) => {
            warn!(keeper = %keeper.name(), error = %err, "scheduled renewal failed");
            metrics
                .timer_ticks
                .with_label_values(&[keeper.name(), ERROR_MSG])
                .inc();
        }
    }
}
