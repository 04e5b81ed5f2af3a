//! Subscriber installation for binaries and tools.

use tracing_subscriber::{EnvFilter, Layer, filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    config::AppConfig, exporters::ConsoleExporter, recorder::{MetricExporter, MetricsLayer}
};

/// Build the filter for `config`, silencing the `metrics` target unless console metrics are on.
pub fn filter_for(config: &AppConfig) -> EnvFilter {
    let metrics = if config.enable_console_metrics { "info" } else { "off" };
    EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(config.log_level).into())
        .parse_lossy(format!("metrics={metrics}"))
}

/// Install the global fmt subscriber. Returns false when one was already installed.
pub fn init_logging(config: &AppConfig) -> bool {
    let exporters: Vec<Box<dyn MetricExporter>> = if config.enable_console_metrics {
        vec![Box::new(ConsoleExporter)]
    } else {
        Vec::new()
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_filter(filter_for(config));

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(MetricsLayer::new(exporters))
        .try_init()
        .is_ok()
}
