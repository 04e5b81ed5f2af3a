#![cfg(test)]

use super::*;
use crate::{
    kernel_base::priority, kernels::{KernelImpl, test_support::context}, tensor::DataTensor, types::{ActivationFunction, KernelDividerMode, Size2}
};

fn pool(dtype: Datatype, layout: DataLayout, input: [usize; 4], output: [usize; 2], window: usize, stride: usize) -> PoolingParams {
    let [ix, iy, f, b] = input;
    let [ox, oy] = output;
    let mut params = PoolingParams::new(
        DataTensor::with_sizes(dtype, layout, ix, iy, f, b),
        DataTensor::with_sizes(dtype, layout, ox, oy, f, b),
    );
    params.pool_size = Size2::splat(window);
    params.stride = Size2::splat(stride);
    params
}

/// AlexNet pool1: 3×3 max with stride 2 over the 55×55 conv1 output.
fn alexnet_pool1() -> PoolingParams {
    pool(Datatype::F16, DataLayout::Bfyx, [55, 55, 96, 1], [27, 27], 3, 2)
}

#[test]
fn exact_strided_windows_need_no_boundary_check() {
    let params = alexnet_pool1();
    assert!(!needs_boundary_check(&params));

    let mut padded = params.clone();
    padded.padding = Size2::new(1, 0);
    assert!(needs_boundary_check(&padded));

    // 55 - 3 = 52 divides by 2 and 4 but not by 3 or 5.
    let mut still_exact = params.clone();
    still_exact.stride = Size2::new(2, 4);
    assert!(!needs_boundary_check(&still_exact));

    for stride in [Size2::new(3, 2), Size2::new(2, 5)] {
        let mut ragged = params.clone();
        ragged.stride = stride;
        assert!(needs_boundary_check(&ragged), "stride {stride:?}");
    }

    let mut oversized = params;
    oversized.pool_size = Size2::new(3, 56);
    assert!(needs_boundary_check(&oversized));
}

#[test]
fn bfyx_outputs_tile_x_by_thirty_two() {
    let dispatch = default_dispatch(&alexnet_pool1());
    assert_eq!(dispatch.gws(), [32, 27, 96]);
    assert_eq!(dispatch.lws(), [32, 1, 1]);
    assert!(dispatch.fp16_unit_used);

    let yxfb = pool(Datatype::F32, DataLayout::Yxfb, [55, 55, 96, 8], [27, 27], 3, 2);
    let dispatch = default_dispatch(&yxfb);
    assert_eq!(dispatch.gws(), [768, 27, 27]);
    assert_eq!(dispatch.lws(), [32, 1, 1]);
}

#[test]
fn jit_names_pool_mode_and_boundary_check() {
    let ctx = context();
    let mut params = alexnet_pool1();
    params.padding = Size2::splat(1);
    params.pool_type = crate::types::PoolType::Avg;
    let dispatch = default_dispatch(&params);
    let jit = pooling_jit(&ctx.engine, &params, &dispatch);
    assert_eq!(jit.value_of("POOL_PAD_X"), Some("1"));
    assert!(jit.contains("AVG_POOLING"));
    assert!(jit.contains("FIXED_KERNEL_DIVIDER"));
    assert_eq!(jit.value_of("CHECK_BOUNDARY"), Some("1"));
}

#[test]
fn average_opt_only_takes_same_size_three_by_three() {
    let mut params = pool(Datatype::F32, DataLayout::Bfyx, [28, 28, 64, 1], [28, 28], 3, 1);
    params.padding = Size2::splat(1);
    params.pool_type = crate::types::PoolType::Avg;
    let kernel = average_opt::PoolingAverageOpt;
    assert!(kernel.validate(&params, &OptionalParams::default()));

    let dispatch = kernel.set_default(&params);
    assert_eq!(dispatch.gws(), [32, 4, 64]);
    assert_eq!(dispatch.lws(), [16, 1, 1]);
    assert_eq!(dispatch.efficiency, priority::FORCE_PRIORITY_8);

    let mut fused = params.clone();
    fused.base.activation = ActivationFunction::Relu;
    assert!(!kernel.validate(&fused, &OptionalParams::default()));

    let shrinking = pool(Datatype::F32, DataLayout::Bfyx, [28, 28, 64, 1], [26, 26], 3, 1);
    assert!(!kernel.validate(&shrinking, &OptionalParams::default()));
}

#[test]
fn block_opt_walks_pool_size_rows_per_item() {
    let params = alexnet_pool1();
    let kernel = bfyx_block_opt::PoolingBfyxBlockOpt;
    assert!(kernel.validate(&params, &OptionalParams::default()));
    let dispatch = kernel.set_default(&params);
    assert_eq!(dispatch.gws(), [32, 9, 96]);

    let ctx = context();
    let jit = kernel.jit_constants(&ctx.engine, &params, &dispatch);
    assert_eq!(jit.value_of("BLOCK_SIZE_Y"), Some("8"));

    let mut wide = params;
    wide.pool_size = Size2::splat(7);
    wide.stride = Size2::splat(8);
    assert!(!kernel.validate(&wide, &OptionalParams::default()));
}

#[test]
fn reference_builds_a_single_kernel_for_any_mode() {
    let ctx = context();
    let mut params = alexnet_pool1();
    params.divider_mode = KernelDividerMode::Dynamic;
    let kernel = Pooling(reference::PoolingRef);
    assert!(kernel.supported_key().support(&params.params_key()));
    let data = kernel.kernels_data(&ctx, &Params::Pooling(params), &OptionalParams::default());
    assert_eq!(data.len(), 1);
    assert_eq!(data[0].estimated_time, priority::DONT_USE_IF_HAVE_SOMETHING_ELSE);
    assert_eq!(data[0].kernels[0].arguments.len(), 2);
    assert!(data[0].kernels[0].kernel_string.jit.contains("DYNAMIC_KERNEL_DIVIDER"));
}
