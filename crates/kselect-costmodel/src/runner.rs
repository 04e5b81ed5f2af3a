use kselect::dispatch::WorkGroups;
use kselect_env::{bench_iterations, bench_warmup};
use tracing::trace;

use crate::toolkit::{GpuToolkit, ToolkitError};

const NS_PER_MS: f64 = 1_000_000.0;

/// Launch counts for one measurement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Launches whose timing is discarded.
    pub warmup: u32,
    pub iterations: u32,
}

impl RunnerConfig {
    /// `KSEL_BENCH_WARMUP` and `KSEL_BENCH_ITERATIONS`, or their defaults.
    pub fn from_env() -> Self {
        Self {
            warmup: bench_warmup(),
            iterations: bench_iterations(),
        }
    }
}

/// Times a bound kernel through one in-order queue.
pub struct BenchmarkRunner<'t, T: GpuToolkit> {
    toolkit: &'t T,
    config: RunnerConfig,
}

impl<'t, T: GpuToolkit> BenchmarkRunner<'t, T> {
    pub fn new(toolkit: &'t T, config: RunnerConfig) -> Self {
        Self { toolkit, config }
    }

    pub fn config(&self) -> RunnerConfig {
        self.config
    }

    /// Mean device time of one launch, in milliseconds.
    pub fn measure(&self, kernel: &T::Kernel, work_groups: WorkGroups) -> Result<f64, ToolkitError> {
        let WorkGroups { global, local } = work_groups;
        for _ in 0..self.config.warmup {
            self.toolkit.enqueue_nd_range(kernel, global, local, false)?;
        }
        self.toolkit.finish()?;

        let iterations = self.config.iterations.max(1);
        let mut events = Vec::with_capacity(iterations as usize);
        for _ in 0..iterations {
            let event = self
                .toolkit
                .enqueue_nd_range(kernel, global, local, true)?
                .ok_or_else(|| ToolkitError::Profiling("profiled launch returned no event".to_string()))?;
            events.push(event);
        }
        self.toolkit.finish()?;

        let mut total_ms = 0.0;
        for event in &events {
            let (start, end) = self.toolkit.wait_and_read_profiling(event)?;
            total_ms += end.saturating_sub(start) as f64 / NS_PER_MS;
        }
        let mean = total_ms / f64::from(iterations);
        trace!(iterations, mean_ms = mean, "measured");
        Ok(mean)
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;
    use crate::mock::MockToolkit;

    fn groups() -> WorkGroups {
        WorkGroups {
            global: [64, 8, 1],
            local: [16, 1, 1],
        }
    }

    #[test]
    fn mean_is_taken_over_timed_launches_only() {
        let toolkit = MockToolkit::new(0).with_events([(0, 1_000_000), (0, 2_000_000), (0, 3_000_000)]);
        let runner = BenchmarkRunner::new(&toolkit, RunnerConfig { warmup: 2, iterations: 3 });
        let mean = runner.measure(&"k".to_string(), groups()).unwrap();
        assert_eq!(mean, 2.0);

        let stats = toolkit.stats();
        assert_eq!(stats.launches, 5);
        assert_eq!(stats.profiled_launches, 3);
        assert_eq!(stats.finishes, 2);
    }

    #[test]
    fn device_errors_abort_the_measurement() {
        let toolkit = MockToolkit::default();
        let runner = BenchmarkRunner::new(&toolkit, RunnerConfig { warmup: 0, iterations: 1 });
        let bad = WorkGroups {
            global: [10, 1, 1],
            local: [4, 1, 1],
        };
        match runner.measure(&"k".to_string(), bad) {
            Err(ToolkitError::Enqueue(_)) => {}
            other => panic!("expected Enqueue, got {other:?}"),
        }
    }

    #[test]
    #[serial]
    fn launch_counts_come_from_the_environment() {
        let _warmup = kselect_env::BENCH_WARMUP.set_guard(1).unwrap();
        let _iterations = kselect_env::BENCH_ITERATIONS.unset_guard();
        let config = RunnerConfig::from_env();
        assert_eq!(config.warmup, 1);
        assert_eq!(config.iterations, kselect_env::DEFAULT_BENCH_ITERATIONS);
    }
}
