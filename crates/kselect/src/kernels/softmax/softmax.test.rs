#![cfg(test)]

use super::*;
use crate::{
    kernel_base::priority, kernels::{KernelImpl, test_support::context}, tensor::DataTensor
};

fn softmax(dtype: Datatype, layout: DataLayout, sizes: [usize; 4], dim: SoftmaxDim) -> SoftmaxParams {
    let [x, y, f, b] = sizes;
    SoftmaxParams::new(
        DataTensor::with_sizes(dtype, layout, x, y, f, b),
        DataTensor::with_sizes(dtype, layout, x, y, f, b),
        dim,
    )
}

fn engine_options() -> OptionalParams {
    OptionalParams::for_engine(&EngineInfo::default())
}

#[test]
fn only_flattenable_inputs_pass_the_shared_check() {
    assert!(check_flattenable(&softmax(Datatype::F32, DataLayout::Bf, [1, 1, 1000, 4], SoftmaxDim::X)));
    assert!(check_flattenable(&softmax(Datatype::F32, DataLayout::Bfyx, [1, 1, 1000, 1], SoftmaxDim::Feature)));
    assert!(!check_flattenable(&softmax(Datatype::F32, DataLayout::Bfyx, [10, 10, 3, 1], SoftmaxDim::X)));

    let mut fused = softmax(Datatype::F32, DataLayout::Bf, [1, 1, 1000, 1], SoftmaxDim::Feature);
    fused.base.activation = ActivationFunction::Relu;
    assert!(!check_flattenable(&fused));
}

#[test]
fn bf_spreads_a_thousand_classes_over_thirty_two_items() {
    let params = softmax(Datatype::F16, DataLayout::Bf, [1, 1, 1000, 1], SoftmaxDim::Feature);
    let dispatch = items_class::SoftmaxBf.set_default(&params, &engine_options()).unwrap();
    assert_eq!(dispatch.base.gws(), [32, 1, 1]);
    assert_eq!(dispatch.base.lws(), [32, 1, 1]);
    assert_eq!(dispatch.items_num, 31);
    assert_eq!(dispatch.base.leftovers, 8);
    assert_eq!(dispatch.data_set_size, 1000);

    let serial = items_class::SoftmaxBf.set_default(&params, &OptionalParams::default()).unwrap();
    assert_eq!(serial.base.lws(), [1, 1, 1]);
    assert_eq!(serial.items_num, 1000);
}

#[test]
fn fb_starts_from_one_lane_per_batch() {
    let params = softmax(Datatype::F32, DataLayout::Fb, [1, 1, 1000, 8], SoftmaxDim::Feature);
    let dispatch = items_class::SoftmaxFb.set_default(&params, &engine_options()).unwrap();
    assert_eq!(dispatch.base.gws(), [256, 1, 1]);
    assert_eq!(dispatch.items_num, 31);
    assert_eq!(dispatch.base.leftovers, 64);
    assert_eq!(dispatch.base.efficiency, priority::FORCE_PRIORITY_6);
}

#[test]
fn reference_handles_any_class_dimension() {
    let ctx = context();
    let params = softmax(Datatype::F16, DataLayout::Bfyx, [10, 6, 3, 2], SoftmaxDim::X);
    let kernel = Softmax(reference::SoftmaxRef);
    assert!(kernel.validate(&Params::Softmax(params.clone()), &engine_options()));
    assert!(!Softmax(items_class::SoftmaxBf).validate(&Params::Softmax(params.clone()), &engine_options()));

    let data = kernel.kernels_data(&ctx, &Params::Softmax(params), &engine_options());
    assert_eq!(data.len(), 1);
    assert_eq!(data[0].estimated_time, priority::DONT_USE_IF_HAVE_SOMETHING_ELSE);
    let cl = &data[0].kernels[0];
    assert_eq!(cl.work_groups.global, [6, 3, 2]);
    assert!(cl.kernel_string.jit.contains("#define INPUT0_CLASS_NUM INPUT0_SIZE_X\n"));
    assert!(cl.kernel_string.jit.contains("#define ACCUMULATOR_TYPE half\n"));
}
