use std::path::PathBuf;

use kselect_env::{
    BENCH_ITERATIONS, BENCH_WARMUP, COST_TABLE_PATH, DEFAULT_BENCH_ITERATIONS, DENY_KERNELS, EnvVarError, EnvVarGuard, FORCE_KERNELS, SelectorEnvVar, bench_iterations, bench_warmup
};
use serial_test::serial;

#[test]
#[serial]
fn unset_guard_hides_and_restores_a_value() {
    let _outer = EnvVarGuard::set(SelectorEnvVar::CostTablePath, "/tmp/gen9.json");
    {
        let guard = COST_TABLE_PATH.unset_guard();
        assert_eq!(guard.key(), "KSEL_COST_TABLE_PATH");
        assert_eq!(COST_TABLE_PATH.get().unwrap(), None);
    }
    assert_eq!(COST_TABLE_PATH.get().unwrap(), Some(PathBuf::from("/tmp/gen9.json")));
}

#[test]
#[serial]
fn malformed_values_are_reported_or_skipped() {
    let _set = EnvVarGuard::set(SelectorEnvVar::BenchWarmup, "three");
    match BENCH_WARMUP.get() {
        Err(EnvVarError::Parse { name, value, .. }) => {
            assert_eq!(name, "KSEL_BENCH_WARMUP");
            assert_eq!(value, "three");
        }
        other => panic!("expected Parse, got {other:?}"),
    }
    assert_eq!(BENCH_WARMUP.get_valid(), None);
}

#[test]
#[serial]
fn kernel_lists_are_trimmed_and_lowercased() {
    let _set = EnvVarGuard::set(SelectorEnvVar::ForceKernels, " Convolution_Gemm_Like, ,pooling_ref ");
    assert_eq!(
        FORCE_KERNELS.get().unwrap(),
        Some(vec!["convolution_gemm_like".to_string(), "pooling_ref".to_string()])
    );
}

#[test]
#[serial]
fn kernel_list_guard_restores_previous_value() {
    let _outer = EnvVarGuard::set(SelectorEnvVar::DenyKernels, "softmax_bf");
    {
        let guard = DENY_KERNELS.set_guard(vec!["lrn_ref".into(), "activation_opt".into()]).unwrap();
        assert_eq!(guard.len(), 2);
        assert_eq!(DENY_KERNELS.get().unwrap(), Some(vec!["lrn_ref".to_string(), "activation_opt".to_string()]));
    }
    assert_eq!(DENY_KERNELS.get().unwrap(), Some(vec!["softmax_bf".to_string()]));
}

#[test]
#[serial]
fn bench_counts_fall_back_to_defaults() {
    let _warmup = EnvVarGuard::unset(SelectorEnvVar::BenchWarmup);
    let _iterations = EnvVarGuard::set(SelectorEnvVar::BenchIterations, "0");
    assert_eq!(bench_warmup(), 3);
    assert!(BENCH_ITERATIONS.get().is_err());
    assert_eq!(bench_iterations(), DEFAULT_BENCH_ITERATIONS);
}
