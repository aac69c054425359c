pub mod renew_scheduler;
pub mod renew_timer;

pub use renew_scheduler::RenewScheduler;
pub use renew_timer::{RenewTimer, TimerConfig};
