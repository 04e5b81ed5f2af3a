use std::{sync::mpsc, time::Duration};

use crate::prelude::*;

#[test]
fn metrics_layer_enriches_span_context() {
    let (sender, receiver) = mpsc::channel();
    let exporters: Vec<Box<dyn MetricExporter>> = vec![Box::new(ChannelExporter::new(sender))];
    let subscriber = tracing_subscriber::registry().with(MetricsLayer::new(exporters));

    let metric_event = MetricEvent::KernelSelected {
        family: "convolution".to_string(),
        kernel: "convolution_gemm_like".to_string(),
        layer: "conv1".to_string(),
        estimated_time: 6.0e-7,
        candidates: 3,
    };

    let span_id = subscriber::with_default(subscriber, || {
        let span = info_span!("select");
        let id = span.id().map(|id| id.into_u64());
        let _guard = span.enter();
        record_metric!(metric_event.clone());
        id
    });

    let enriched = receiver.recv_timeout(Duration::from_secs(1)).expect("metric should be dispatched");
    assert_eq!(enriched.span_id, span_id);
    assert_eq!(enriched.span_name.as_deref(), Some("select"));
    assert_eq!(enriched.event, metric_event);
}

#[test]
fn metrics_layer_ignores_non_metric_events() {
    let (sender, receiver) = mpsc::channel();
    let exporters: Vec<Box<dyn MetricExporter>> = vec![Box::new(ChannelExporter::new(sender))];
    let subscriber = tracing_subscriber::registry().with(MetricsLayer::new(exporters));

    subscriber::with_default(subscriber, || {
        info!(kernel = "pooling_ref", "ordinary log line");
        tracing::event!(target: "metrics", Level::INFO, metric = "not json");
    });

    assert!(receiver.recv_timeout(Duration::from_millis(100)).is_err());
}
