use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use serde_json::Value;
use singleton_keeper::config::loader::file_to_config;
use singleton_keeper::keeper::{ExpiresAfter, KeeperEvent, SingletonKeeper};
use singleton_keeper::resilience::retry::RetrySettings;
use singleton_keeper::scheduler::RenewScheduler;
use singleton_keeper::server;
use singleton_keeper::sources::HttpSource;
use singleton_keeper::utils::logging::{self, LogLevel};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "CONFIG", default_value = "singleton-keeper.yaml")]
    config: String,
    #[arg(long, env = "LOG_LEVEL", value_enum)]
    log_level: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // -------------------------------
    // 1. Load YAML config, init logging
    // -------------------------------

    let args = Args::parse();
    let service_config = file_to_config(Path::new(&args.config)).await?;
    logging::run(&service_config, args.log_level);

    // -------------------------------
    // 2. Build resolve operation and keeper
    // -------------------------------

    let keeper_config = &service_config.keeper;
    let retry = service_config
        .settings
        .retry
        .as_ref()
        .map(RetrySettings::from)
        .unwrap_or_default();
    let source = HttpSource::new(keeper_config.name.clone(), keeper_config.source.clone())?;

    let mut keeper = SingletonKeeper::from_resolver(source.into_resolver(retry))
        .with_name(keeper_config.name.clone());
    if let Some(max_age) = keeper_config.expires_after() {
        keeper = keeper.with_policy(ExpiresAfter(max_age));
    }
    let keeper = Arc::new(keeper);

    // -------------------------------
    // 3. Log renewal events
    // -------------------------------

    let mut events = keeper.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(KeeperEvent::Renewed(renewal)) => {
                    info!(
                        refreshed_at = %renewal.refreshed_at,
                        changed = renewal.previous.as_ref() != Some(&renewal.current),
                        "value renewed"
                    );
                }
                Ok(KeeperEvent::Failed { attempt, error }) => {
                    warn!(attempt, error = %error, "renewal failed");
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event subscriber lagging");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // -------------------------------
    // 4. Start renew scheduler and http server
    // -------------------------------

    let scheduler: Arc<RenewScheduler<Value>> =
        Arc::new(RenewScheduler::new(keeper, keeper_config.timer()));

    info!("Service starting...");
    server::server::start(&service_config.settings, scheduler).await
}
