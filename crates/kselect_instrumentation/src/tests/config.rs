use serial_test::serial;

use crate::prelude::*;

#[test]
#[serial]
fn app_config_parses_and_rejects() {
    let _log_level = LOG_LEVEL.set_guard(Level::DEBUG).expect("log level should set");
    let _console = METRICS_CONSOLE.set_guard(true).expect("console flag should set");
    let _force = EnvVarGuard::set(SelectorEnvVar::ForceKernels, "convolution_ref");
    let _deny = EnvVarGuard::unset(SelectorEnvVar::DenyKernels);
    let _iterations = EnvVarGuard::set(SelectorEnvVar::BenchIterations, "25");
    let _warmup = EnvVarGuard::unset(SelectorEnvVar::BenchWarmup);
    let _path = EnvVarGuard::unset(SelectorEnvVar::CostTablePath);

    let config = AppConfig::from_env().expect("configuration should parse");
    assert_eq!(config.log_level, Level::DEBUG);
    assert!(config.enable_console_metrics);
    assert_eq!(config.force_kernels, vec!["convolution_ref".to_string()]);
    assert!(config.deny_kernels.is_empty());
    assert_eq!(config.bench_iterations, 25);
    assert_eq!(config.bench_warmup, 3);
    assert_eq!(config.cost_table_path, None);

    let initialised = AppConfig::initialise(config.clone()).expect("initialise should succeed once");
    assert_eq!(initialised, &config);

    match AppConfig::initialise(config) {
        Err(AppConfigError::AlreadyInitialised) => {}
        other => panic!("expected already initialised error, got {other:?}"),
    }

    let _log_level = EnvVarGuard::set(InstrumentEnvVar::LogLevel, "verbose");
    match AppConfig::from_env() {
        Err(AppConfigError::InvalidLogLevel { value }) => assert_eq!(value, "verbose"),
        other => panic!("expected invalid log level error, got {other:?}"),
    }

    let _log_level = LOG_LEVEL.unset_guard();
    let _console = EnvVarGuard::set(InstrumentEnvVar::MetricsConsole, "maybe");
    match AppConfig::from_env() {
        Err(AppConfigError::InvalidBoolean { name, value }) => {
            assert_eq!(name, InstrumentEnvVar::MetricsConsole.key());
            assert_eq!(value, "maybe");
        }
        other => panic!("expected invalid boolean error, got {other:?}"),
    }

    let _console = METRICS_CONSOLE.unset_guard();
    let _force = EnvVarGuard::set(SelectorEnvVar::ForceKernels, "conv-ref");
    match AppConfig::from_env() {
        Err(AppConfigError::InvalidKernelList { name, value }) => {
            assert_eq!(name, "KSEL_FORCE_KERNELS");
            assert_eq!(value, "conv-ref");
        }
        other => panic!("expected invalid kernel list error, got {other:?}"),
    }

    let _force = EnvVarGuard::unset(SelectorEnvVar::ForceKernels);
    let _iterations = EnvVarGuard::set(SelectorEnvVar::BenchIterations, "0");
    match AppConfig::from_env() {
        Err(AppConfigError::InvalidCount { name, value }) => {
            assert_eq!(name, "KSEL_BENCH_ITERATIONS");
            assert_eq!(value, "0");
        }
        other => panic!("expected invalid count error, got {other:?}"),
    }
}

#[test]
fn metrics_target_is_silenced_without_console_flag() {
    let quiet = crate::logging::filter_for(&AppConfig::default()).to_string();
    assert!(quiet.contains("metrics=off"), "{quiet}");

    let loud = crate::logging::filter_for(&AppConfig {
        enable_console_metrics: true,
        ..AppConfig::default()
    })
    .to_string();
    assert!(loud.contains("metrics=info"), "{loud}");
}
