use std::{hint::black_box, sync::Arc};

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use kselect::{
    ComputeContext, CostTables, EngineInfo, InMemoryTemplateDatabase, KernelOverrides, KernelSelector, OptionalParams, Params, kernels, params::ActivationParams, tensor::{DataLayout, DataTensor}, types::{ActivationFunction, Datatype}
};
use kselect_costmodel::curated_layers;
use rand::{Rng, SeedableRng, rngs::StdRng};

fn context() -> Arc<ComputeContext> {
    let names = kernels::template_names();
    let templates = InMemoryTemplateDatabase::with_placeholders(names.iter().map(String::as_str));
    ComputeContext::new(EngineInfo::default(), Arc::new(templates))
        .with_cost_tables(CostTables::new())
        .into_shared()
}

fn bench_curated_layers(c: &mut Criterion) {
    let ctx = context();
    let options = OptionalParams::for_engine(&ctx.engine);
    let mut group = c.benchmark_group("select_curated");

    for layer in curated_layers() {
        let selector = KernelSelector::new(layer.params.kernel_type(), ctx.clone()).with_overrides(KernelOverrides::new());
        group.bench_with_input(BenchmarkId::from_parameter(layer.name), &layer.params, |b, params| {
            b.iter(|| selector.select(black_box(params), &options).unwrap());
        });
    }
    group.finish();
}

fn bench_forced(c: &mut Criterion) {
    let ctx = context();
    let options = OptionalParams::for_engine(&ctx.engine);
    let Some(conv1) = curated_layers().into_iter().find(|layer| layer.name == "conv1") else {
        return;
    };
    let mut group = c.benchmark_group("select_conv1");
    for (label, overrides) in [
        ("ranked", KernelOverrides::new()),
        ("forced_ref", KernelOverrides::new().force("convolution_gpu_ref")),
    ] {
        let selector = KernelSelector::new(conv1.params.kernel_type(), ctx.clone()).with_overrides(overrides);
        group.bench_function(label, |b| b.iter(|| selector.select(black_box(&conv1.params), &options).unwrap()));
    }
    group.finish();
}

/// Activation requests with random shapes, so the entry-point counter and
/// jit generation see fresh sizes every iteration.
fn bench_random_activations(c: &mut Criterion) {
    let ctx = context();
    let options = OptionalParams::for_engine(&ctx.engine);
    let mut rng = StdRng::seed_from_u64(0x6b73);
    let requests: Vec<Params> = (0..64)
        .map(|_| {
            let side = rng.random_range(7..=112);
            let features = rng.random_range(1..=512);
            let tensor = DataTensor::with_sizes(Datatype::F16, DataLayout::Bfyx, side, side, features, 1);
            let mut params = ActivationParams::new(tensor.clone(), tensor);
            params.base.activation = ActivationFunction::Relu;
            params.into()
        })
        .collect();

    let selector = KernelSelector::new(requests[0].kernel_type(), ctx).with_overrides(KernelOverrides::new());
    c.bench_function("select_random_activation", |b| {
        let mut next = requests.iter().cycle();
        b.iter(|| {
            let params = next.next().unwrap_or(&requests[0]);
            selector.select(black_box(params), &options).unwrap()
        });
    });
}

criterion_group!(benches, bench_curated_layers, bench_forced, bench_random_activations);
criterion_main!(benches);
