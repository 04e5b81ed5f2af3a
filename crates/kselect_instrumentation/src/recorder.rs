//! The tracing layer that turns `record_metric!` events into exported metrics.

use std::{fmt, sync::Arc};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{
    Event, Subscriber, field::{Field, Visit}
};
use tracing_subscriber::{Layer, layer::Context, registry::LookupSpan};

use crate::event::MetricEvent;

/// Target `record_metric!` emits on.
pub const METRICS_TARGET: &str = "metrics";

/// A metric plus where and when it was recorded.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichedMetricEvent {
    pub timestamp: DateTime<Utc>,
    pub span_id: Option<u64>,
    /// Innermost span, e.g. `select` or `calibrate`.
    pub span_name: Option<String>,
    pub event: MetricEvent,
}

pub trait MetricExporter: Send + Sync {
    fn export(&self, event: &EnrichedMetricEvent);
}

/// Decodes `metrics`-target events back into [`MetricEvent`]s and fans them
/// out to every exporter.
#[derive(Clone)]
pub struct MetricsLayer {
    exporters: Arc<[Box<dyn MetricExporter>]>,
}

impl MetricsLayer {
    pub fn new(exporters: Vec<Box<dyn MetricExporter>>) -> Self {
        Self {
            exporters: exporters.into(),
        }
    }
}

impl<S> Layer<S> for MetricsLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        if event.metadata().target() != METRICS_TARGET || self.exporters.is_empty() {
            return;
        }
        let mut payload = MetricPayload(None);
        event.record(&mut payload);
        let Some(json) = payload.0 else {
            return;
        };
        let metric = match serde_json::from_str::<MetricEvent>(&json) {
            Ok(metric) => metric,
            Err(error) => {
                tracing::error!(target: "instrument", %error, "dropping undecodable metric");
                return;
            }
        };

        let span = ctx.lookup_current();
        let enriched = EnrichedMetricEvent {
            timestamp: Utc::now(),
            span_id: span.as_ref().map(|s| s.id().into_u64()),
            span_name: span.as_ref().map(|s| s.name().to_string()),
            event: metric,
        };
        self.exporters.iter().for_each(|exporter| exporter.export(&enriched));
    }
}

/// The `metric` field of an event. `%json` arrives through `record_debug`.
struct MetricPayload(Option<String>);

impl Visit for MetricPayload {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "metric" {
            self.0 = Some(format!("{value:?}"));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "metric" {
            self.0 = Some(value.to_owned());
        }
    }
}
