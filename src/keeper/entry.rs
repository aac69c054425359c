use chrono::{DateTime, Utc};

use crate::keeper::error::KeeperError;

/// Consistent snapshot of a keeper's cached state.
///
/// `value` survives [`clear_cache`](crate::keeper::SingletonKeeper::clear_cache):
/// it stays addressable but `has_cache` tells whether it may be served.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: Option<T>,
    pub has_cache: bool,
    pub refresh_date: Option<DateTime<Utc>>,
}

impl<T> CacheEntry<T> {
    pub fn empty() -> Self {
        Self {
            value: None,
            has_cache: false,
            refresh_date: None,
        }
    }

    pub fn seeded(value: T, refresh_date: Option<DateTime<Utc>>) -> Self {
        Self {
            value: Some(value),
            has_cache: true,
            refresh_date,
        }
    }

    /// Value that may be served right now.
    pub fn cached(&self) -> Option<&T> {
        if self.has_cache {
            self.value.as_ref()
        } else {
            None
        }
    }

    /// Seconds elapsed since the last successful refresh.
    pub fn age_seconds(&self) -> Option<i64> {
        self.refresh_date
            .map(|date| (Utc::now() - date).num_seconds().max(0))
    }
}

/// Payload of a successful renewal.
#[derive(Debug, Clone)]
pub struct Renewal<T> {
    pub previous: Option<T>,
    pub current: T,
    pub refreshed_at: DateTime<Utc>,
}

/// Published on the keeper's broadcast channel once the state is committed
/// and the coordination token released.
#[derive(Debug, Clone)]
pub enum KeeperEvent<T> {
    Renewed(Renewal<T>),
    Failed { attempt: u64, error: KeeperError },
}

impl<T> KeeperEvent<T> {
    pub fn renewal(&self) -> Option<&Renewal<T>> {
        match self {
            KeeperEvent::Renewed(renewal) => Some(renewal),
            KeeperEvent::Failed { .. } => None,
        }
    }
}
