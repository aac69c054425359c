//! Keeper module
//!
//! Single-value cache with single-flight renewal, pluggable validity checks
//! and change notifications.

pub mod entry;
pub mod error;
pub mod policy;
pub mod singleton_keeper;

pub use entry::{CacheEntry, KeeperEvent, Renewal};
pub use error::{KeeperError, KeeperResult};
pub use policy::{AlwaysValid, ExpiredWhen, ExpiresAfter, RenewPolicy};
pub use singleton_keeper::{resolver, Resolver, SingletonKeeper};
