//! Shared process environment helpers for kselect.

pub mod environment;

pub use environment::{
    EnvVar, Environment, guard::EnvVarGuard, instrument::{InstrumentEnvVar, LOG_LEVEL, METRICS_CONSOLE}, selector::{
        BENCH_ITERATIONS, BENCH_WARMUP, COST_TABLE_PATH, DEFAULT_BENCH_ITERATIONS, DEFAULT_BENCH_WARMUP, DENY_KERNELS, FORCE_KERNELS, SelectorEnvVar, bench_iterations, bench_warmup, parse_kernel_list
    }, value::{EnvValueError, EnvVarError, TypedEnvVar, TypedEnvVarGuard}
};
