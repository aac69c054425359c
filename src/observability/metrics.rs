use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

use crate::utils::constants::METRICS_NAMESPACE;

static METRICS_INSTANCE: OnceCell<Arc<Metrics>> = OnceCell::const_new();

/// Gets the process-wide metrics, creating them on first use.
pub async fn get_metrics() -> &'static Arc<Metrics> {
    METRICS_INSTANCE
        .get_or_init(|| async {
            info!("Initializing Metrics ...");
            Metrics::new()
        })
        .await
}

#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Keeper metrics
    pub resolve_attempts: IntCounterVec,
    pub resolve_failures: IntCounterVec,
    pub resolve_duration: HistogramVec,
    pub cache_hits: IntCounterVec,
    pub validity_check_failures: IntCounterVec,
    pub refresh_timestamp: IntGaugeVec,

    // Scheduler metrics
    pub timer_ticks: IntCounterVec,
    pub paused: IntGaugeVec,

    // Config/runtime
    pub config_validation_errors: IntGauge,
    pub up: IntGauge,
}

impl Metrics {
    fn new() -> Arc<Self> {
        let registry = Registry::new_custom(Some(METRICS_NAMESPACE.into()), None).unwrap();

        let metrics: Arc<Metrics> = Arc::new(Self {
            // Keeper
            resolve_attempts: IntCounterVec::new(Opts::new("keeper_resolve_attempts_total", "Resolve operations started"), &["keeper"]).unwrap(),
            resolve_failures: IntCounterVec::new(Opts::new("keeper_resolve_failures_total", "Resolve operations that failed"), &["keeper"]).unwrap(),
            resolve_duration: HistogramVec::new(HistogramOpts::new("keeper_resolve_duration_seconds", "Resolve duration seconds").buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]), &["keeper"]).unwrap(),
            cache_hits: IntCounterVec::new(Opts::new("keeper_cache_hits_total", "Reads served from cache without coordination"), &["keeper"]).unwrap(),
            validity_check_failures: IntCounterVec::new(Opts::new("keeper_validity_check_failures_total", "Validity checks that errored and forced a renewal"), &["keeper"]).unwrap(),
            refresh_timestamp: IntGaugeVec::new(Opts::new("keeper_refresh_timestamp_seconds", "Last successful refresh (UNIX seconds)"), &["keeper"]).unwrap(),

            // Scheduler
            timer_ticks: IntCounterVec::new(Opts::new("keeper_timer_ticks_total", "Renew timer ticks by outcome"), &["keeper", "outcome"]).unwrap(),
            paused: IntGaugeVec::new(Opts::new("keeper_paused", "1 if the renew scheduler is paused"), &["keeper"]).unwrap(),

            // Config/runtime
            config_validation_errors: IntGauge::new("config_validation_errors", "Validation errors found in the last loaded config").unwrap(),
            up: IntGauge::new("up", "1 if service is healthy").unwrap(),

            registry,
        });

        // Register all metrics in the registry
        let reg = &metrics.registry;
        reg.register(Box::new(metrics.resolve_attempts.clone())).unwrap();
        reg.register(Box::new(metrics.resolve_failures.clone())).unwrap();
        reg.register(Box::new(metrics.resolve_duration.clone())).unwrap();
        reg.register(Box::new(metrics.cache_hits.clone())).unwrap();
        reg.register(Box::new(metrics.validity_check_failures.clone())).unwrap();
        reg.register(Box::new(metrics.refresh_timestamp.clone())).unwrap();
        reg.register(Box::new(metrics.timer_ticks.clone())).unwrap();
        reg.register(Box::new(metrics.paused.clone())).unwrap();
        reg.register(Box::new(metrics.config_validation_errors.clone())).unwrap();
        reg.register(Box::new(metrics.up.clone())).unwrap();

        metrics
    }
}
