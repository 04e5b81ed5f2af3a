#![cfg(test)]

use super::*;
use crate::{
    jit::JitValue, kernel_base::priority, kernels::{KernelImpl, test_support::context}, tensor::{DataLayout, DataTensor}, types::{ActivationFunction, LrnMode}
};

fn lrn(dtype: Datatype, layout: DataLayout, sizes: [usize; 4], mode: LrnMode) -> LrnParams {
    let [x, y, f, b] = sizes;
    LrnParams::new(
        DataTensor::with_sizes(dtype, layout, x, y, f, b),
        DataTensor::with_sizes(dtype, layout, x, y, f, b),
        mode,
        5,
    )
}

/// AlexNet norm1 on a batch of eight.
fn alexnet_norm1() -> LrnParams {
    lrn(Datatype::F32, DataLayout::Yxfb, [55, 55, 96, 8], LrnMode::AcrossChannel)
}

#[test]
fn b8_packs_eight_batches_per_sub_group() {
    let params = alexnet_norm1();
    let kernel = across_channel_opt_b8::LrnAcrossChannelOptB8;
    assert!(kernel.validate(&params, &OptionalParams::default()));

    let dispatch = kernel.set_default(&params);
    assert_eq!(dispatch.gws(), [96, 55, 55]);
    assert_eq!(dispatch.lws(), [8, 1, 1]);
    assert_eq!(dispatch.efficiency, priority::FORCE_PRIORITY_9);

    let ctx = context();
    let data = Lrn(kernel).kernels_data(&ctx, &Params::Lrn(params), &OptionalParams::default());
    let jit = &data[0].kernels[0].kernel_string.jit;
    assert!(jit.contains("#define SUB_GROUP_SIZE 8\n"));
    assert!(jit.contains("#define PADDING 2\n"));
    assert!(jit.contains("#define ACROSS_CHANNEL \n"));
}

#[test]
fn b8_rejects_small_batches_and_fused_activations() {
    let kernel = across_channel_opt_b8::LrnAcrossChannelOptB8;
    let small = lrn(Datatype::F32, DataLayout::Yxfb, [55, 55, 96, 4], LrnMode::AcrossChannel);
    assert!(!kernel.validate(&small, &OptionalParams::default()));

    let mut fused = alexnet_norm1();
    fused.base.activation = ActivationFunction::Relu;
    assert!(!kernel.validate(&fused, &OptionalParams::default()));
}

#[test]
fn half_precision_factors_alpha_into_the_values() {
    let ctx = context();
    let params = lrn(Datatype::F16, DataLayout::Bfyx, [27, 27, 256, 1], LrnMode::AcrossChannel);
    let dispatch = default_dispatch(&params, 0.0);
    let jit = lrn_jit(&ctx.engine, &params, &dispatch);
    assert_eq!(jit.value_of("ALPHA_AFTER_FACTORED"), Some(1.0f32.to_code_string().as_str()));
    assert_eq!(
        jit.value_of("ALPHA_VAL_FACTOR"),
        Some(1e-4f32.sqrt().to_code_string().as_str())
    );

    let single = lrn(Datatype::F32, DataLayout::Bfyx, [27, 27, 256, 1], LrnMode::AcrossChannel);
    let dispatch = default_dispatch(&single, 0.0);
    let jit = lrn_jit(&ctx.engine, &single, &dispatch);
    assert_eq!(jit.value_of("ALPHA_VAL_FACTOR"), Some(1.0f32.to_code_string().as_str()));
}

#[test]
fn reference_walks_the_window_in_the_map() {
    let ctx = context();
    let params = lrn(Datatype::F16, DataLayout::Bfyx, [13, 13, 256, 1], LrnMode::WithinChannel);
    let kernel = Lrn(reference::LrnRef);
    assert!(kernel.supported_key().support(&params.params_key()));

    let data = kernel.kernels_data(&ctx, &Params::Lrn(params), &OptionalParams::default());
    assert_eq!(data[0].estimated_time, priority::DONT_USE_IF_HAVE_SOMETHING_ELSE);
    let cl = &data[0].kernels[0];
    assert_eq!(cl.work_groups.global, [13, 13, 256]);
    assert!(cl.kernel_string.jit.contains("#define ROUND_NORM_SIZE 5\n"));
    assert!(!cl.kernel_string.jit.contains("ACROSS_MAPS"));
}
