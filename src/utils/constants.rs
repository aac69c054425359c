//! Shared constants and defaults

pub const DEFAULT_KEEPER_NAME: &str = "default";
pub const DEFAULT_EVENT_CAPACITY: usize = 16;

pub const METRICS_NAMESPACE: &str = "singletonkeeper";
pub const DEFAULT_METRICS_PATH: &str = "/metrics";

pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 200;
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 1000;
