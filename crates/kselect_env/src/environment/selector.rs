//! Kernel selection and calibration environment variables.

use std::path::PathBuf;

use super::{
    EnvVar, value::{EnvValueError, TypedEnvVar}
};

/// Launch count used for discarded warm-up runs when nothing is configured.
pub const DEFAULT_BENCH_WARMUP: u32 = 3;
/// Timed launch count per benchmark entry when nothing is configured.
pub const DEFAULT_BENCH_ITERATIONS: u32 = 100;

/// Selector-specific environment variables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SelectorEnvVar {
    ForceKernels,
    DenyKernels,
    CostTablePath,
    BenchWarmup,
    BenchIterations,
}

impl SelectorEnvVar {
    /// Obtain the canonical environment variable key for the identifier.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            SelectorEnvVar::ForceKernels => "KSEL_FORCE_KERNELS",
            SelectorEnvVar::DenyKernels => "KSEL_DENY_KERNELS",
            SelectorEnvVar::CostTablePath => "KSEL_COST_TABLE_PATH",
            SelectorEnvVar::BenchWarmup => "KSEL_BENCH_WARMUP",
            SelectorEnvVar::BenchIterations => "KSEL_BENCH_ITERATIONS",
        }
    }

    /// Convert into the unscoped [`EnvVar`] variant.
    #[must_use]
    pub const fn into_env(self) -> EnvVar {
        EnvVar::Selector(self)
    }
}

/// Typed descriptor for KSEL_FORCE_KERNELS (comma-separated kernel names).
pub const FORCE_KERNELS: TypedEnvVar<Vec<String>> =
    TypedEnvVar::new(SelectorEnvVar::ForceKernels.into_env(), parse_kernel_list, format_kernel_list);
/// Typed descriptor for KSEL_DENY_KERNELS (comma-separated kernel names).
pub const DENY_KERNELS: TypedEnvVar<Vec<String>> =
    TypedEnvVar::new(SelectorEnvVar::DenyKernels.into_env(), parse_kernel_list, format_kernel_list);
/// Typed descriptor for KSEL_COST_TABLE_PATH.
pub const COST_TABLE_PATH: TypedEnvVar<PathBuf> = TypedEnvVar::new(SelectorEnvVar::CostTablePath.into_env(), parse_path, format_path);
/// Typed descriptor for KSEL_BENCH_WARMUP.
pub const BENCH_WARMUP: TypedEnvVar<u32> = TypedEnvVar::new(SelectorEnvVar::BenchWarmup.into_env(), parse_u32, format_u32);
/// Typed descriptor for KSEL_BENCH_ITERATIONS.
pub const BENCH_ITERATIONS: TypedEnvVar<u32> = TypedEnvVar::new(SelectorEnvVar::BenchIterations.into_env(), parse_positive_u32, format_u32);

/// Warm-up launch count, falling back to [`DEFAULT_BENCH_WARMUP`].
#[must_use]
pub fn bench_warmup() -> u32 {
    BENCH_WARMUP.get_valid().unwrap_or(DEFAULT_BENCH_WARMUP)
}

/// Timed launch count, falling back to [`DEFAULT_BENCH_ITERATIONS`].
#[must_use]
pub fn bench_iterations() -> u32 {
    BENCH_ITERATIONS.get_valid().unwrap_or(DEFAULT_BENCH_ITERATIONS)
}

/// Split a comma-separated list of kernel names, dropping empty entries.
pub fn parse_kernel_list(value: &str) -> Result<Vec<String>, EnvValueError> {
    let names: Vec<String> = value
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_ascii_lowercase)
        .collect();
    if let Some(bad) = names.iter().find(|name| !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')) {
        return Err(EnvValueError::new(format!("'{bad}' is not a valid kernel name")));
    }
    Ok(names)
}

fn format_kernel_list(value: &Vec<String>) -> Result<String, EnvValueError> {
    if value.iter().any(|name| name.contains(',')) {
        return Err(EnvValueError::new("kernel names must not contain ','"));
    }
    Ok(value.join(","))
}

fn parse_path(value: &str) -> Result<PathBuf, EnvValueError> {
    if value.trim().is_empty() {
        return Err(EnvValueError::new("path is empty"));
    }
    Ok(PathBuf::from(value))
}

fn format_path(path: &PathBuf) -> Result<String, EnvValueError> {
    Ok(path.to_string_lossy().into_owned())
}

fn parse_u32(value: &str) -> Result<u32, EnvValueError> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|_| EnvValueError::new("value is not a valid u32"))
}

fn parse_positive_u32(value: &str) -> Result<u32, EnvValueError> {
    match parse_u32(value)? {
        0 => Err(EnvValueError::new("value must be greater than zero")),
        n => Ok(n),
    }
}

fn format_u32(value: &u32) -> Result<String, EnvValueError> {
    Ok(value.to_string())
}
