#![cfg(test)]

use clap::Parser;
use kselect::KernelSelectorError;
use serial_test::serial;

use super::*;

#[test]
fn select_collects_repeated_overrides() {
    let config = CliConfig::parse_from([
        "kselect",
        "select",
        "--layer",
        "conv1",
        "--force",
        "convolution_gpu_ref",
        "--deny",
        "convolution_gpu_bfyx_gemm_like",
        "--deny",
        "convolution_gpu_bfyx_os_iyx_osv16",
    ]);
    match &config.command {
        Command::Select { layer, force, deny } => {
            assert_eq!(layer, "conv1");
            assert_eq!(force, &["convolution_gpu_ref"]);
            assert_eq!(deny.len(), 2);
        }
        other => panic!("expected Select, got {other:?}"),
    }
}

#[test]
fn flags_win_over_the_environment() {
    let config = CliConfig::parse_from(["kselect", "select", "--layer", "fc6", "--force", "fully_connected_gpu_bf_io_ref"]);
    let environment = KernelOverrides::new().deny("fully_connected_gpu_bf_io_ref").deny("fully_connected_gpu_yxfb_ref");
    let merged = config.overrides(&environment).unwrap();
    assert!(merged.is_forced("fully_connected_gpu_bf_io_ref"));
    assert!(!merged.is_denied("fully_connected_gpu_bf_io_ref"));
    assert!(merged.is_denied("fully_connected_gpu_yxfb_ref"));
}

#[test]
fn unknown_flag_kernels_are_rejected() {
    let config = CliConfig::parse_from(["kselect", "select", "--layer", "fc6", "--deny", "fc_turbo"]);
    match config.overrides(&KernelOverrides::new()) {
        Err(CliError::Selector(KernelSelectorError::UnknownKernel(name))) => assert_eq!(name, "fc_turbo"),
        other => panic!("expected UnknownKernel, got {other:?}"),
    }
}

#[test]
fn family_filter_parses_case_insensitively() {
    let config = CliConfig::parse_from(["kselect", "list", "--family", "Pooling"]);
    match config.command {
        Command::List { family } => assert_eq!(family, Some(KernelType::Pooling)),
        other => panic!("expected List, got {other:?}"),
    }
    assert!(CliConfig::try_parse_from(["kselect", "list", "--family", "winograd"]).is_err());
}

#[test]
fn verbosity_raises_the_log_level() {
    let quiet = CliConfig::parse_from(["kselect", "list"]);
    assert_eq!(quiet.log_level(Level::WARN), Level::WARN);
    let debug = CliConfig::parse_from(["kselect", "-v", "list"]);
    assert_eq!(debug.log_level(Level::INFO), Level::DEBUG);
    assert_eq!(debug.log_level(Level::TRACE), Level::TRACE);
    let trace = CliConfig::parse_from(["kselect", "list", "-vv"]);
    assert_eq!(trace.log_level(Level::INFO), Level::TRACE);
}

#[test]
#[serial]
fn environment_lists_are_layered_under_flags() {
    let _force = kselect_env::FORCE_KERNELS.set_guard(vec!["pooling_gpu_ref".to_string()]).unwrap();
    let _deny = kselect_env::DENY_KERNELS.set_guard(vec!["pooling_gpu_average_opt".to_string()]).unwrap();
    let config = CliConfig::parse_from(["kselect", "select", "--layer", "pool1", "--force", "pooling_gpu_average_opt"]);
    let merged = config.overrides(&KernelOverrides::from_environment()).unwrap();
    assert!(merged.is_forced("pooling_gpu_ref"));
    assert!(merged.is_forced("pooling_gpu_average_opt"));
    assert!(!merged.is_denied("pooling_gpu_average_opt"));
}
