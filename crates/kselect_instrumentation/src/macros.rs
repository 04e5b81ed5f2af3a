//! Developer-facing macros for emitting structured metric events.

/// Serialise a [`MetricEvent`](crate::MetricEvent) and emit it on the `metrics` target.
#[macro_export]
macro_rules! record_metric {
    ($event:expr) => {{
        if let Ok(__metric_json) = $crate::__private::serde_json::to_string(&$event) {
            $crate::__private::tracing::event!(
                target: "metrics",
                $crate::__private::tracing::Level::INFO,
                metric = %__metric_json
            );
        }
    }};
}
