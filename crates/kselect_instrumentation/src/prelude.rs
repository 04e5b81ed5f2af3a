//! Convenience re-exports for instrumentation consumers.

pub use crate::config::{AppConfig, AppConfigError};
pub use crate::event::MetricEvent;
pub use crate::exporters::{ChannelExporter, ConsoleExporter};
pub use crate::record_metric;
pub use crate::recorder::{EnrichedMetricEvent, MetricExporter, MetricsLayer};

pub use kselect_env::{EnvVar, EnvVarError, EnvVarGuard, Environment, InstrumentEnvVar, LOG_LEVEL, METRICS_CONSOLE, SelectorEnvVar};

pub use tracing::{Level, info, info_span, subscriber};
pub use tracing_subscriber::{self, layer::SubscriberExt};
