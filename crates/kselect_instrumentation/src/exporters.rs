//! Metric sinks: the console for `KSEL_METRICS_CONSOLE=1`, a channel for
//! tests and embedding tools.

use std::sync::mpsc::Sender;

use crate::recorder::{EnrichedMetricEvent, MetricExporter};

/// `METRIC [span] {json}`, or `None` when the event cannot be serialised.
pub fn console_line(event: &EnrichedMetricEvent) -> Option<String> {
    let payload = serde_json::to_string(&event.event).ok()?;
    let span = event.span_name.as_deref().unwrap_or("-");
    Some(format!("METRIC {} [{span}] {payload}", event.timestamp.to_rfc3339()))
}

/// Prints each metric on stderr so stdout stays clean for command output.
#[derive(Default)]
pub struct ConsoleExporter;

impl MetricExporter for ConsoleExporter {
    fn export(&self, event: &EnrichedMetricEvent) {
        if let Some(line) = console_line(event) {
            eprintln!("{line}");
        }
    }
}

/// Forwards metrics to a receiver; a dropped receiver silently discards them.
pub struct ChannelExporter(Sender<EnrichedMetricEvent>);

impl ChannelExporter {
    pub fn new(sender: Sender<EnrichedMetricEvent>) -> Self {
        Self(sender)
    }
}

impl MetricExporter for ChannelExporter {
    fn export(&self, event: &EnrichedMetricEvent) {
        let _ = self.0.send(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::MetricEvent;

    #[test]
    fn console_lines_carry_span_and_payload() {
        let event = EnrichedMetricEvent {
            timestamp: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
            span_id: None,
            span_name: Some("calibrate".to_string()),
            event: MetricEvent::BenchmarkEntryFailed {
                kernel: "pooling_gpu_ref".to_string(),
                signature_hash: 7,
                reason: "build failed".to_string(),
            },
        };
        let line = console_line(&event).unwrap();
        assert!(line.starts_with("METRIC 2026-01-02T03:04:05+00:00 [calibrate] {"));
        assert!(line.contains(r#""kernel":"pooling_gpu_ref""#));
    }
}
