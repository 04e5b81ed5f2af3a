#![cfg(test)]

use kselect::{
    CostTables, EngineInfo, InMemoryTemplateDatabase, WeightsReorder, kernels::{self, KernelImpl}, types::KernelType
};

use super::*;
use crate::{mock::MockToolkit, param_sets::curated_layer};

fn context(tables: CostTables) -> Arc<ComputeContext> {
    let names = kernels::template_names();
    let templates = InMemoryTemplateDatabase::with_placeholders(names.iter().map(String::as_str));
    ComputeContext::new(EngineInfo::default(), Arc::new(templates))
        .with_cost_tables(tables)
        .into_shared()
}

fn quick() -> RunnerConfig {
    RunnerConfig { warmup: 1, iterations: 2 }
}

fn pool1() -> Params {
    curated_layer("pool1").unwrap().params
}

#[test]
fn calibration_records_measured_and_unsupported_entries() {
    let toolkit = MockToolkit::new(2_000_000);
    let harness = Harness::new(context(CostTables::new()), &toolkit, HarnessMode::Calibrate).with_runner_config(quick());
    let params = pool1();
    let hash = signature_hash(&params.to_string());
    let report = harness.run(&[KernelId::PoolingRef, KernelId::PoolingAverageOpt, KernelId::SoftmaxBf], &[params.clone()]);

    assert!(report.failures.is_empty());
    assert_eq!(report.signatures.get(&hash), Some(&params.to_string()));
    assert_eq!(
        report.table.entries("pooling_gpu_ref").unwrap(),
        vec![(hash, CostEntry::Measured(2.0))]
    );
    assert_eq!(
        report.table.entries("pooling_gpu_average_opt").unwrap(),
        vec![(hash, CostEntry::NotSupported)]
    );
    // Kernels of other families never see the request.
    assert!(!report.table.kernels.contains_key("softmax_gpu_bf"));

    let stats = toolkit.stats();
    assert_eq!(stats.profiled_launches, 2);
    assert_eq!(stats.launches, 3);
}

#[test]
fn failed_entries_leave_the_rest_of_the_table_intact() {
    let toolkit = MockToolkit::default().fail_compiles_containing("// pooling_gpu_ref\n");
    let harness = Harness::new(context(CostTables::new()), &toolkit, HarnessMode::Calibrate).with_runner_config(quick());
    let relu = curated_layer("relu3").unwrap().params;
    let report = harness.run(&[KernelId::PoolingRef, KernelId::ActivationRef], &[pool1(), relu.clone()]);

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].kernel, "pooling_gpu_ref");
    assert!(report.failures[0].reason.contains("build"));
    assert!(!report.table.kernels.contains_key("pooling_gpu_ref"));
    assert_eq!(
        report.table.entries("activation_ref").unwrap(),
        vec![(signature_hash(&relu.to_string()), CostEntry::Measured(1.0))]
    );
}

#[test]
fn verify_reports_entries_beyond_the_tolerance() {
    let params = pool1();
    let hash = signature_hash(&params.to_string());
    let mut tables = CostTables::new();
    tables.insert("generic", "pooling_gpu_ref", hash, CostEntry::Measured(1.05));
    tables.insert("generic", "pooling_gpu_bfyx_block_opt", hash, CostEntry::Measured(5.0));

    let toolkit = MockToolkit::new(1_000_000);
    let harness = Harness::new(context(tables), &toolkit, HarnessMode::Verify).with_runner_config(quick());
    let report = harness.run(&[KernelId::PoolingRef, KernelId::PoolingBfyxBlockOpt], &[params]);

    let drifted: Vec<_> = report.mismatches.iter().map(|m| m.kernel).collect();
    assert!(!drifted.contains(&"pooling_gpu_ref"));
    assert!(drifted.contains(&"pooling_gpu_bfyx_block_opt"));
    let block = report.mismatches.iter().find(|m| m.kernel == "pooling_gpu_bfyx_block_opt").unwrap();
    assert_eq!(block.expected_ms, 5.0);
}

#[test]
fn weights_buffer_takes_the_reordered_size() {
    let ctx = context(CostTables::new());
    let params = curated_layer("fc6").unwrap().params;
    let imp = KernelId::FullyConnectedBfIoRef.implementation();
    assert_eq!(imp.kernel_type(), KernelType::FullyConnected);
    let data = imp.kernels_data(&ctx, &params, &OptionalParams::default()).remove(0);
    assert!(matches!(data.weights_reorder, WeightsReorder::Gpu { .. }));

    assert_eq!(argument_buffer(&data, KernelArgument::Weights), Some((9216 * 4096 * 2, BufferAccess::ReadOnly)));
    assert_eq!(argument_buffer(&data, KernelArgument::Output), Some((4096 * 2, BufferAccess::WriteOnly)));
    assert_eq!(argument_buffer(&data, KernelArgument::Bias), Some((4096 * 2, BufferAccess::ReadOnly)));
    assert_eq!(argument_buffer(&data, KernelArgument::Input(1)), None);

    let toolkit = MockToolkit::default();
    let harness = Harness::new(ctx, &toolkit, HarnessMode::Calibrate).with_runner_config(quick());
    harness.run(&[KernelId::FullyConnectedBfIoRef], &[params]);
    let stats = toolkit.stats();
    assert_eq!(stats.buffers.len(), 4);
    assert!(stats.buffers.contains(&(9216 * 4096 * 2)));
    assert_eq!(stats.args.iter().map(|(index, _)| *index).collect::<Vec<_>>(), [0, 1, 2, 3]);
}

#[test]
fn repeated_runs_reuse_compiled_programs() {
    let toolkit = MockToolkit::new(1_000_000);
    let harness = Harness::new(context(CostTables::new()), &toolkit, HarnessMode::Calibrate).with_runner_config(quick());

    let first = harness.run(&[KernelId::PoolingRef], &[pool1()]);
    let second = harness.run(&[KernelId::PoolingRef], &[pool1()]);

    assert_eq!(first.table, second.table);
    assert_eq!(toolkit.stats().compiles, 1);
    assert_eq!(harness.programs().len(), 1);
}
