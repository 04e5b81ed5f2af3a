use std::sync::Arc;

use kselect::{
    ComputeContext, CostEntry, CostTables, EngineInfo, InMemoryTemplateDatabase, KernelId, KernelOverrides, KernelSelector, OptionalParams, Params, SelectionReason, kernels, signature_hash, types::KernelType
};
use kselect_costmodel::{Harness, HarnessMode, MockToolkit, RunnerConfig, alexnet_convolutions, curated_layer, curated_layers, known_signatures, rust_source};

fn context(tables: CostTables) -> Arc<ComputeContext> {
    let names = kernels::template_names();
    let templates = InMemoryTemplateDatabase::with_placeholders(names.iter().map(String::as_str));
    ComputeContext::new(EngineInfo::default(), Arc::new(templates))
        .with_cost_tables(tables)
        .into_shared()
}

fn pooling_kernels() -> Vec<KernelId> {
    let mut ids = vec![KernelId::PoolingRef];
    ids.extend(
        KernelId::ALL
            .iter()
            .copied()
            .filter(|id| id.kernel_type() == KernelType::Pooling && *id != KernelId::PoolingRef),
    );
    ids
}

#[test]
fn calibrated_table_drives_selection() {
    let pool1 = curated_layer("pool1").unwrap().params;
    let hash = signature_hash(&pool1.to_string());

    // The reference kernel takes the one fast event; everything else runs at 5 ms.
    let toolkit = MockToolkit::new(5_000_000).with_events([(1_000, 101_000)]);
    let harness = Harness::new(context(CostTables::new()), &toolkit, HarnessMode::Calibrate)
        .with_runner_config(RunnerConfig { warmup: 0, iterations: 1 });
    let report = harness.run(&pooling_kernels(), std::slice::from_ref(&pool1));
    assert!(report.failures.is_empty(), "{:?}", report.failures);
    assert_eq!(report.table.entries("pooling_gpu_ref").unwrap(), vec![(hash, CostEntry::Measured(0.1))]);

    let path = std::env::temp_dir().join(format!("kselect-calibration-{}.json", std::process::id()));
    report.table.save(&path).unwrap();
    let tables = CostTables::load_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    let selector = KernelSelector::new(KernelType::Pooling, context(tables)).with_overrides(KernelOverrides::new());
    let selection = selector.select(&pool1, &OptionalParams::default()).unwrap();
    let chosen = selection.selected().unwrap();
    assert_eq!(chosen.kernel, "pooling_gpu_ref");
    assert_eq!(chosen.reason, SelectionReason::CostTable);
    assert_eq!(chosen.effective_time, 0.1);

    let source = rust_source(&report.table, &known_signatures()).unwrap();
    assert!(source.contains(&format!("// {pool1}")));
}

/// Selection stops generating once a candidate's static priority cannot
/// beat the leader, which is only sound while no estimate undercuts it.
#[test]
fn estimates_never_undercut_static_priorities() {
    let ctx = context(CostTables::new());
    let options = OptionalParams::for_engine(&ctx.engine);
    let requests = curated_layers()
        .into_iter()
        .map(|layer| layer.params)
        .chain(alexnet_convolutions().into_iter().map(Params::from));

    let mut checked = 0;
    for params in requests {
        for id in KernelId::ALL.iter().filter(|id| id.kernel_type() == params.kernel_type()) {
            for data in id.implementation().kernels_data(&ctx, &params, &options) {
                assert!(
                    data.estimated_time >= id.priority(),
                    "{id} estimates {} below its priority {} for {params}",
                    data.estimated_time,
                    id.priority()
                );
                checked += 1;
            }
        }
    }
    assert!(checked > 0);
}
