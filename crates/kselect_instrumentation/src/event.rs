//! Canonical metric event definitions.

use serde::{Deserialize, Serialize};

/// Structured metric events emitted on the `metrics` tracing target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum MetricEvent {
    /// A selector settled on a kernel for one request.
    KernelSelected {
        family: String,
        kernel: String,
        layer: String,
        /// Effective time used for ranking (cost table entry or static priority).
        estimated_time: f32,
        /// Number of candidates whose key and calibration admit the request.
        candidates: usize,
    },
    /// A benchmark entry completed.
    KernelBenchmarked {
        kernel: String,
        signature_hash: u64,
        mean_ms: f64,
        iterations: u32,
    },
    /// A benchmark entry failed on the device or in the compiler.
    BenchmarkEntryFailed { kernel: String, signature_hash: u64, reason: String },
}
