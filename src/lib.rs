//! # Singleton Keeper Library
//!
//! Keeps one expensive-to-obtain value (an access token, a configuration
//! snapshot) cached, renews it with at most one resolution in flight, and
//! optionally refreshes it in the background on a pausable timer.
//!
//! Modules:
//! - `keeper`: single-flight cache, validity policies, change events
//! - `scheduler`: renew timer and pausable renew scheduler
//! - `sources`: HTTP resolve operation
//! - `config`: service configuration for the binary
//! - `server`: HTTP read/control surface

pub mod config;
pub mod helpers;
pub mod keeper;
pub mod observability;
pub mod resilience;
pub mod scheduler;
pub mod server;
pub mod sources;
pub mod utils;

#[cfg(test)]
pub mod tests;

pub use crate::config::ServiceConfig;
pub use crate::keeper::{
    CacheEntry, KeeperError, KeeperEvent, KeeperResult, RenewPolicy, Renewal, SingletonKeeper,
};
pub use crate::scheduler::{RenewScheduler, RenewTimer, TimerConfig};
