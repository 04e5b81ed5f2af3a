#![cfg(test)]

use std::sync::atomic::{AtomicUsize, Ordering};

use serial_test::serial;

use super::*;
use crate::{
    context::EngineInfo, cost_table::CostTables, kernel_base::{KernelsData, priority}, kernels::test_support, params::{ActivationParams, PoolingParams}, params_key::ParamsKey, tensor::{DataLayout, DataTensor}, template_db::InMemoryTemplateDatabase, types::{ActivationFunction, Datatype, PoolType, Size2}
};

/// Candidate with a fixed key and estimate; produces no real kernels.
struct MockKernel {
    name: &'static str,
    dtypes: &'static [Datatype],
    estimate: f32,
}

impl KernelImpl for MockKernel {
    fn name(&self) -> &'static str {
        self.name
    }

    fn kernel_type(&self) -> KernelType {
        KernelType::Activation
    }

    fn priority(&self) -> f32 {
        self.estimate
    }

    fn supported_key(&self) -> ParamsKey {
        let mut k = ParamsKey::new();
        for &dtype in self.dtypes {
            k.enable_input_data_type(dtype).enable_output_data_type(dtype);
        }
        k.enable_all_input_layouts().enable_all_output_layouts();
        k
    }

    fn validate(&self, params: &Params, _options: &OptionalParams) -> bool {
        matches!(params, Params::Activation(_))
    }

    fn kernels_data(&self, _ctx: &ComputeContext, params: &Params, _options: &OptionalParams) -> KernelsData {
        let mut data = KernelData::new(self.name, params.clone());
        data.estimated_time = self.estimate;
        vec![data]
    }
}

fn mock_selector(ctx: ComputeContext) -> KernelSelector {
    let a: Arc<dyn KernelImpl> = Arc::new(MockKernel {
        name: "a",
        dtypes: &[Datatype::F32],
        estimate: 5.0,
    });
    let b: Arc<dyn KernelImpl> = Arc::new(MockKernel {
        name: "b",
        dtypes: &[Datatype::F16, Datatype::F32],
        estimate: 8.0,
    });
    KernelSelector::with_implementations(KernelType::Activation, ctx.into_shared(), vec![a, b])
}

fn activation(dtype: Datatype) -> Params {
    let tensor = DataTensor::with_sizes(dtype, DataLayout::Bfyx, 16, 16, 8, 1);
    Params::Activation(ActivationParams::new(tensor.clone(), tensor))
}

fn winner(selection: Selection) -> SelectedKernel {
    match selection {
        Selection::Selected(kernel) => kernel,
        other => panic!("expected a selected kernel, got {other:?}"),
    }
}

#[test]
fn lowest_estimate_among_supporting_kernels_wins() {
    let selector = mock_selector(test_support::context());
    let options = OptionalParams::default();

    let f16 = winner(selector.select(&activation(Datatype::F16), &options).unwrap());
    assert_eq!(f16.kernel, "b");
    assert_eq!(f16.effective_time, 8.0);
    assert_eq!(f16.reason, SelectionReason::Priority);

    let f32 = winner(selector.select(&activation(Datatype::F32), &options).unwrap());
    assert_eq!(f32.kernel, "a");

    assert_eq!(selector.select(&activation(Datatype::Int8), &options).unwrap(), Selection::NotSupported);
}

/// Activation candidate that counts how often it generates kernels.
struct CountingKernel {
    name: &'static str,
    priority: f32,
    estimate: f32,
    produces: bool,
    calls: AtomicUsize,
}

impl CountingKernel {
    fn new(name: &'static str, priority: f32, estimate: f32) -> Arc<Self> {
        Self::build(name, priority, estimate, true)
    }

    fn empty(name: &'static str, priority: f32) -> Arc<Self> {
        Self::build(name, priority, priority, false)
    }

    fn build(name: &'static str, priority: f32, estimate: f32, produces: bool) -> Arc<Self> {
        Arc::new(Self {
            name,
            priority,
            estimate,
            produces,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl KernelImpl for CountingKernel {
    fn name(&self) -> &'static str {
        self.name
    }

    fn kernel_type(&self) -> KernelType {
        KernelType::Activation
    }

    fn priority(&self) -> f32 {
        self.priority
    }

    fn supported_key(&self) -> ParamsKey {
        let mut k = ParamsKey::new();
        k.enable_input_data_type(Datatype::F32).enable_output_data_type(Datatype::F32);
        k.enable_all_input_layouts().enable_all_output_layouts();
        k
    }

    fn validate(&self, params: &Params, _options: &OptionalParams) -> bool {
        matches!(params, Params::Activation(_))
    }

    fn kernels_data(&self, _ctx: &ComputeContext, params: &Params, _options: &OptionalParams) -> KernelsData {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.produces {
            return KernelsData::new();
        }
        let mut data = KernelData::new(self.name, params.clone());
        data.estimated_time = self.estimate;
        vec![data]
    }
}

fn counting_selector(ctx: ComputeContext, kernels: &[Arc<CountingKernel>]) -> KernelSelector {
    let implementations = kernels.iter().map(|k| k.clone() as Arc<dyn KernelImpl>).collect();
    KernelSelector::with_implementations(KernelType::Activation, ctx.into_shared(), implementations)
}

#[test]
fn kernels_that_cannot_win_are_never_generated() {
    let slow = CountingKernel::new("slow", 9.0, 9.0);
    let fast = CountingKernel::new("fast", 2.0, 4.0);
    let faster = CountingKernel::new("faster", 3.0, 3.0);
    let selector = counting_selector(test_support::context(), &[slow.clone(), fast.clone(), faster.clone()]);

    let selected = winner(selector.select(&activation(Datatype::F32), &OptionalParams::default()).unwrap());
    // "fast" is generated first but its estimate loses to "faster".
    assert_eq!(selected.kernel, "faster");
    assert_eq!(selected.effective_time, 3.0);
    assert_eq!((fast.calls(), faster.calls(), slow.calls()), (1, 1, 0));
}

#[test]
fn empty_candidates_fall_through_to_the_next_rank() {
    let broken = CountingKernel::empty("broken", 1.0);
    let fallback = CountingKernel::new("fallback", 5.0, 5.0);
    let selector = counting_selector(test_support::context(), &[fallback.clone(), broken.clone()]);
    assert_eq!(winner(selector.select(&activation(Datatype::F32), &OptionalParams::default()).unwrap()).kernel, "fallback");
    assert_eq!((broken.calls(), fallback.calls()), (1, 1));
}

#[test]
fn calibrated_times_rank_before_generation_and_ties_keep_registration_order() {
    let params = activation(Datatype::F32);
    let hash = signature_hash(&params.to_string());
    let first = CountingKernel::new("first", 5.0, 5.0);
    let second = CountingKernel::new("second", 5.0, 5.0);
    let third = CountingKernel::new("third", 1.0, 1.0);
    let mut tables = CostTables::new();
    tables.insert("generic", "second", hash, CostEntry::Measured(0.25));
    tables.insert("generic", "third", hash, CostEntry::Measured(7.0));
    let selector = counting_selector(test_support::context().with_cost_tables(tables), &[first.clone(), second.clone(), third.clone()]);

    let selected = winner(selector.select(&params, &OptionalParams::default()).unwrap());
    assert_eq!((selected.kernel, selected.reason), ("second", SelectionReason::CostTable));
    assert_eq!((first.calls(), second.calls(), third.calls()), (0, 1, 0));

    let tied = counting_selector(test_support::context(), &[CountingKernel::new("a", 5.0, 5.0), CountingKernel::new("b", 5.0, 5.0)]);
    assert_eq!(winner(tied.select(&params, &OptionalParams::default()).unwrap()).kernel, "a");
}

#[test]
fn force_beats_estimate_and_deny_removes_candidates() {
    let options = OptionalParams::default();
    let forced = mock_selector(test_support::context()).with_overrides(KernelOverrides::new().force("b"));
    let selected = winner(forced.select(&activation(Datatype::F32), &options).unwrap());
    assert_eq!(selected.kernel, "b");
    assert_eq!(selected.reason, SelectionReason::Forced);

    // A forced kernel that cannot serve the request does not block the others.
    let unusable = mock_selector(test_support::context()).with_overrides(KernelOverrides::new().force("a"));
    assert_eq!(winner(unusable.select(&activation(Datatype::F16), &options).unwrap()).kernel, "b");

    let denied = mock_selector(test_support::context()).with_overrides(KernelOverrides::new().deny("b"));
    assert_eq!(denied.select(&activation(Datatype::F16), &options).unwrap(), Selection::NotSupported);
}

#[test]
fn cost_table_overrides_the_static_estimate() {
    let params = activation(Datatype::F32);
    let hash = signature_hash(&params.to_string());
    let mut tables = CostTables::new();
    tables.insert("generic", "b", hash, CostEntry::Measured(0.5));
    let selector = mock_selector(test_support::context().with_cost_tables(tables));

    let selected = winner(selector.select(&params, &OptionalParams::default()).unwrap());
    assert_eq!(selected.kernel, "b");
    assert_eq!(selected.effective_time, 0.5);
    assert_eq!(selected.reason, SelectionReason::CostTable);

    // Entries for other devices and other signatures do not apply.
    let mut tables = CostTables::new();
    tables.insert("gen12", "b", hash, CostEntry::Measured(0.5));
    tables.insert("generic", "b", hash ^ 1, CostEntry::Measured(0.5));
    let selector = mock_selector(test_support::context().with_cost_tables(tables));
    assert_eq!(winner(selector.select(&params, &OptionalParams::default()).unwrap()).kernel, "a");
}

#[test]
fn calibrated_not_supported_drops_the_candidate() {
    let params = activation(Datatype::F32);
    let mut tables = CostTables::new();
    tables.insert("generic", "a", signature_hash(&params.to_string()), CostEntry::NotSupported);
    let selector = mock_selector(test_support::context().with_cost_tables(tables));
    assert_eq!(winner(selector.select(&params, &OptionalParams::default()).unwrap()).kernel, "b");
}

#[test]
fn params_of_another_family_are_rejected() {
    let selector = mock_selector(test_support::context());
    let tensor = DataTensor::with_sizes(Datatype::F32, DataLayout::Bfyx, 8, 8, 4, 1);
    let pooling = Params::Pooling(PoolingParams::new(tensor.clone(), tensor));
    match selector.select(&pooling, &OptionalParams::default()) {
        Err(KernelSelectorError::FamilyMismatch { expected, actual }) => {
            assert_eq!(expected, KernelType::Activation);
            assert_eq!(actual, KernelType::Pooling);
        }
        other => panic!("expected FamilyMismatch, got {other:?}"),
    }
}

#[test]
fn registry_prefers_the_optimised_pooling_kernel() {
    let ctx = test_support::context().into_shared();
    let selector = KernelSelector::with_implementations(KernelType::Pooling, ctx, kernels::implementations(KernelType::Pooling));
    let mut params = PoolingParams::new(
        DataTensor::with_sizes(Datatype::F32, DataLayout::Bfyx, 56, 56, 64, 1),
        DataTensor::with_sizes(Datatype::F32, DataLayout::Bfyx, 56, 56, 64, 1),
    );
    params.pool_type = PoolType::Avg;
    params.pool_size = Size2::splat(3);
    params.padding = Size2::splat(1);
    params.base.layer_id = "pool.avg".to_string();

    let selected = winner(selector.select(&params.clone().into(), &OptionalParams::default()).unwrap());
    assert_eq!(selected.kernel, "pooling_gpu_average_opt");
    assert_eq!(selected.effective_time, priority::FORCE_PRIORITY_8);
    assert!(selected.data.kernels[0].kernel_string.entry_point.starts_with("pool_avg"));

    params.base.activation = ActivationFunction::Relu;
    let fallback = winner(selector.select(&params.into(), &OptionalParams::default()).unwrap());
    assert_eq!(fallback.kernel, "pooling_gpu_ref");
}

#[test]
fn missing_templates_leave_nothing_to_select() {
    let ctx = ComputeContext::new(EngineInfo::default(), Arc::new(InMemoryTemplateDatabase::new()));
    let selector = KernelSelector::with_implementations(KernelType::Activation, ctx.into_shared(), kernels::implementations(KernelType::Activation));
    assert_eq!(selector.select(&activation(Datatype::F32), &OptionalParams::default()).unwrap(), Selection::NotSupported);
}

#[test]
#[serial]
fn environment_overrides_apply_to_registry_selectors() {
    let _force = kselect_env::FORCE_KERNELS.set_guard(vec!["activation_ref".to_string()]).unwrap();
    let _deny = kselect_env::DENY_KERNELS.unset_guard();
    let selector = KernelSelector::new(KernelType::Activation, test_support::context().into_shared());
    assert!(selector.overrides().is_forced("activation_ref"));

    let tensor = DataTensor::with_sizes(Datatype::F32, DataLayout::Bfyx, 32, 8, 4, 1);
    let mut params = ActivationParams::new(tensor.clone(), tensor);
    params.base.activation = ActivationFunction::Relu;
    let selected = winner(selector.select(&params.into(), &OptionalParams::default()).unwrap());
    assert_eq!(selected.kernel, "activation_ref");
    assert_eq!(selected.reason, SelectionReason::Forced);
}
