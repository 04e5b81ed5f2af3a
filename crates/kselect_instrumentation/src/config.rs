//! Centralised configuration handling.

use std::{path::PathBuf, sync::OnceLock};

use kselect_env::{
    BENCH_ITERATIONS, BENCH_WARMUP, COST_TABLE_PATH, DEFAULT_BENCH_ITERATIONS, DEFAULT_BENCH_WARMUP, DENY_KERNELS, EnvVarError, FORCE_KERNELS, LOG_LEVEL, METRICS_CONSOLE, TypedEnvVar
};
use tracing::Level;

/// Errors that can occur while loading or initialising [`AppConfig`].
#[derive(Debug, thiserror::Error)]
pub enum AppConfigError {
    /// The configuration attempted to initialise more than once.
    #[error("app configuration already initialised")]
    AlreadyInitialised,
    /// A provided log level could not be parsed.
    #[error("invalid log level '{value}'")]
    InvalidLogLevel { value: String },
    /// A provided boolean flag could not be parsed.
    #[error("invalid boolean flag '{value}' for {name}")]
    InvalidBoolean { name: &'static str, value: String },
    /// A kernel name list contained an unusable entry.
    #[error("invalid kernel list '{value}' for {name}")]
    InvalidKernelList { name: &'static str, value: String },
    /// A launch count was not a positive integer.
    #[error("invalid count '{value}' for {name}")]
    InvalidCount { name: &'static str, value: String },
    /// A typed environment variable interaction failed unexpectedly.
    #[error("failed to access environment: {source}")]
    EnvVar {
        #[from]
        source: EnvVarError,
    },
}

/// Process-wide configuration for selection, calibration and logging.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// The minimum tracing level for application logs.
    pub log_level: Level,
    /// Whether metric events are echoed on the console.
    pub enable_console_metrics: bool,
    /// Optional calibration data file loaded into the compute context.
    pub cost_table_path: Option<PathBuf>,
    /// Kernel names that bypass ranking.
    pub force_kernels: Vec<String>,
    /// Kernel names excluded from selection.
    pub deny_kernels: Vec<String>,
    /// Discarded launches before timing a benchmark entry.
    pub bench_warmup: u32,
    /// Timed launches per benchmark entry.
    pub bench_iterations: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            enable_console_metrics: false,
            cost_table_path: None,
            force_kernels: Vec::new(),
            deny_kernels: Vec::new(),
            bench_warmup: DEFAULT_BENCH_WARMUP,
            bench_iterations: DEFAULT_BENCH_ITERATIONS,
        }
    }
}

static APP_CONFIG: OnceLock<AppConfig> = OnceLock::new();

fn kernel_list(var: TypedEnvVar<Vec<String>>) -> Result<Vec<String>, AppConfigError> {
    match var.get() {
        Ok(value) => Ok(value.unwrap_or_default()),
        Err(EnvVarError::Parse { value, .. }) => Err(AppConfigError::InvalidKernelList { name: var.key(), value }),
        Err(err) => Err(err.into()),
    }
}

fn count(var: TypedEnvVar<u32>, default: u32) -> Result<u32, AppConfigError> {
    match var.get() {
        Ok(value) => Ok(value.unwrap_or(default)),
        Err(EnvVarError::Parse { value, .. }) => Err(AppConfigError::InvalidCount { name: var.key(), value }),
        Err(err) => Err(err.into()),
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, AppConfigError> {
        let log_level = match LOG_LEVEL.get() {
            Ok(Some(value)) => value,
            Ok(None) => Level::INFO,
            Err(EnvVarError::Parse { value, .. }) => return Err(AppConfigError::InvalidLogLevel { value }),
            Err(err) => return Err(err.into()),
        };

        let enable_console_metrics = match METRICS_CONSOLE.get() {
            Ok(Some(value)) => value,
            Ok(None) => false,
            Err(EnvVarError::Parse { value, .. }) => {
                return Err(AppConfigError::InvalidBoolean {
                    name: METRICS_CONSOLE.key(),
                    value,
                });
            }
            Err(err) => return Err(err.into()),
        };

        Ok(Self {
            log_level,
            enable_console_metrics,
            cost_table_path: COST_TABLE_PATH.get()?,
            force_kernels: kernel_list(FORCE_KERNELS)?,
            deny_kernels: kernel_list(DENY_KERNELS)?,
            bench_warmup: count(BENCH_WARMUP, DEFAULT_BENCH_WARMUP)?,
            bench_iterations: count(BENCH_ITERATIONS, DEFAULT_BENCH_ITERATIONS)?,
        })
    }

    /// Initialise the global configuration instance from environment variables.
    pub fn initialise_from_env() -> Result<&'static Self, AppConfigError> {
        let config = Self::from_env()?;
        Self::initialise(config)
    }

    /// Store the provided configuration as the global instance.
    pub fn initialise(config: AppConfig) -> Result<&'static Self, AppConfigError> {
        let mut fresh = Some(config);
        let stored = APP_CONFIG.get_or_init(|| fresh.take().unwrap_or_default());
        match fresh {
            None => Ok(stored),
            Some(_) => Err(AppConfigError::AlreadyInitialised),
        }
    }

    /// Try to access the globally-initialised configuration.
    pub fn try_global() -> Option<&'static Self> {
        APP_CONFIG.get()
    }
}
