#![cfg(test)]

use super::*;
use crate::{
    kernel_base::WeightsReorder, kernels::{KernelImpl, test_support::context}, types::{Size2, WeightsType}, weights_reorder::CpuReorderKind
};

fn conv(dtype: Datatype, layout: DataLayout, input: [usize; 4], output: [usize; 4], filter: usize) -> ConvolutionParams {
    let [ix, iy, ifm, b] = input;
    let [ox, oy, ofm, _] = output;
    let weights_layout = if layout == DataLayout::Yxfb { WeightsLayout::Yxio } else { WeightsLayout::Oiyx };
    ConvolutionParams::new(
        DataTensor::with_sizes(dtype, layout, ix, iy, ifm, b),
        DataTensor::with_sizes(dtype, layout, ox, oy, ofm, b),
        crate::tensor::WeightsTensor::with_sizes(WeightsType::from(dtype), weights_layout, filter, filter, ifm, ofm),
        Some(DataTensor::with_sizes(dtype, DataLayout::Bf, 1, 1, ofm, 1)),
    )
}

/// AlexNet conv2 on a dense input: 5×5 filter, padding 2.
fn alexnet_conv2(dtype: Datatype) -> ConvolutionParams {
    let mut params = conv(dtype, DataLayout::Bfyx, [27, 27, 96, 1], [27, 27, 256, 1], 5);
    params.padding = Size2::splat(2);
    params
}

#[test]
fn padded_desc_covers_the_last_filter_window() {
    let params = alexnet_conv2(Datatype::F16);
    let desc = padded_input_desc(&params);
    assert_eq!(desc.offset, 31 * 2 + 2);
    assert_eq!(desc.y().pitch, 31);
    assert_eq!(desc.feature().pitch, 31 * 31);
    assert_eq!(desc.batch().pitch, 31 * 31 * 96);
    assert_eq!(desc.padded_val, PaddedVal::Zero);
    assert!(!check_padded_input_desc(&params, &desc));

    let mut padded = params.clone();
    *padded.base_mut().input_mut() = desc.clone();
    assert!(check_padded_input_desc(&padded, &desc));
}

#[test]
fn unpadded_one_by_one_inputs_are_already_proper() {
    let params = conv(Datatype::F32, DataLayout::Bfyx, [13, 13, 384, 1], [13, 13, 256, 1], 1);
    assert!(check_padded_input_desc(&params, &padded_input_desc(&params)));
}

#[test]
fn osv16_blocks_strided_alexnet_conv1() {
    let mut params = conv(Datatype::F16, DataLayout::Bfyx, [227, 227, 3, 1], [55, 55, 96, 1], 11);
    params.stride = Size2::splat(4);
    let dispatch = bfyx_os_iyx_osv16::ConvolutionBfyxOsIyxOsv16.set_default(&params).unwrap();
    assert_eq!((dispatch.block_width, dispatch.block_height, dispatch.prefetch), (4, 3, 5));
    assert_eq!((dispatch.input_block_width, dispatch.input_block_array_size), (32, 38));
    assert_eq!(dispatch.base.gws(), [14, 19, 96]);
    assert_eq!(dispatch.base.lws(), [1, 1, 16]);
    assert_eq!(dispatch.base.efficiency, priority::FORCE_PRIORITY_7);

    let ctx = context();
    let kernel = Convolution(bfyx_os_iyx_osv16::ConvolutionBfyxOsIyxOsv16);
    let data = kernel.kernels_data(&ctx, &Params::Convolution(params), &OptionalParams::default());
    assert_eq!(data.len(), 1);
    match &data[0].weights_reorder {
        WeightsReorder::Cpu { reorder, new_buffer_size } => {
            assert_eq!(reorder.kind, CpuReorderKind::Osv16);
            assert_eq!(*new_buffer_size, 11 * 11 * 3 * 96 * 2);
        }
        other => panic!("expected host reorder, got {other:?}"),
    }
    let jit = &data[0].kernels[0].kernel_string.jit;
    assert!(jit.contains("#define OUT_BLOCK_WIDTH 4\n"));
    assert!(!jit.contains("LEFTOVERS"));
}

#[test]
fn osv16_rejects_oversized_filters() {
    let params = conv(Datatype::F32, DataLayout::Bfyx, [32, 32, 3, 1], [20, 20, 16, 1], 13);
    assert!(bfyx_os_iyx_osv16::ConvolutionBfyxOsIyxOsv16.set_default(&params).is_none());
}

#[test]
fn osv16_counts_leftover_output_features() {
    let params = conv(Datatype::F32, DataLayout::Bfyx, [8, 8, 4, 2], [8, 8, 20, 2], 1);
    let dispatch = bfyx_os_iyx_osv16::ConvolutionBfyxOsIyxOsv16.set_default(&params).unwrap();
    assert_eq!(dispatch.base.leftovers, 12);
    assert_eq!(dispatch.base.gws()[2], 32 * 2);
    assert_eq!((dispatch.block_width, dispatch.block_height), (16, 1));
}

#[test]
fn gemm_like_requests_padded_input_only_when_allowed() {
    let ctx = context();
    let kernel = Convolution(gemm_like::ConvolutionGemmLike);
    let params = Params::Convolution(alexnet_conv2(Datatype::F16));

    assert!(!kernel.validate(&params, &OptionalParams::default()));
    assert!(kernel.kernels_data(&ctx, &params, &OptionalParams::default()).is_empty());

    let options = OptionalParams {
        allow_padding: true,
        ..OptionalParams::default()
    };
    let data = kernel.kernels_data(&ctx, &params, &options);
    assert_eq!(data.len(), 1);
    let data = &data[0];
    assert!(data.reorder_input);
    assert_eq!(data.estimated_time, priority::FORCE_PRIORITY_6);
    assert_eq!(data.kernels[0].work_groups.global, [8, 736, 1]);
    assert_eq!(data.kernels[0].work_groups.local, [1, 16, 1]);
    assert_eq!(data.kernels[0].arguments.last(), Some(&KernelArgument::Uint32(0)));
    assert!(data.kernels[0].kernel_string.options.contains("-cl-no-subgroup-ifp"));
    let jit = &data.kernels[0].kernel_string.jit;
    assert!(jit.contains("__convolution_f16"));
    assert!(jit.contains("INPUT_BUFFER_WIDTH_PADDED"));
    assert!(jit.contains("#define ALIGNED_OFM 256\n"));
    match &data.weights_reorder {
        WeightsReorder::Cpu { reorder, .. } => match reorder.kind {
            CpuReorderKind::Interleave(layout) => {
                assert_eq!((layout.ofm, layout.k, layout.sub_block_n, layout.block_width), (256, 5 * 5 * 96, 32, 16));
            }
            other => panic!("expected interleave, got {other:?}"),
        },
        other => panic!("expected host reorder, got {other:?}"),
    }
    match &data.params {
        Params::Convolution(p) => assert_eq!(p.input().offset, 64),
        other => panic!("expected convolution params, got {other:?}"),
    }
}

#[test]
fn yxfb_b16_batches_per_work_item_follow_batch_size() {
    let kernel = yxfb_yxio_b16::ConvolutionYxfbYxioB16;
    let small = conv(Datatype::F16, DataLayout::Yxfb, [8, 8, 16, 16], [8, 8, 32, 16], 3);
    let dispatch = kernel.set_default(&small).unwrap();
    assert_eq!((dispatch.ofm_per_work_item, dispatch.batches_per_work_item), (16, 1));
    assert_eq!(dispatch.base.gws()[0], 32 * 16 / 16);

    let large = conv(Datatype::F16, DataLayout::Yxfb, [8, 8, 16, 64], [8, 8, 32, 64], 3);
    let dispatch = kernel.set_default(&large).unwrap();
    assert_eq!(dispatch.batches_per_work_item, 4);
    assert_eq!(dispatch.base.efficiency, priority::FORCE_PRIORITY_7);

    let tiny_f32 = conv(Datatype::F32, DataLayout::Yxfb, [8, 8, 16, 8], [8, 8, 32, 8], 3);
    assert!(kernel.set_default(&tiny_f32).is_none());
}

#[test]
fn yxfb_b16_uses_per_precision_templates() {
    let ctx = context();
    let params = conv(Datatype::F32, DataLayout::Yxfb, [8, 8, 16, 32], [8, 8, 32, 32], 3);
    let data = Convolution(yxfb_yxio_b16::ConvolutionYxfbYxioB16).kernels_data(&ctx, &Params::Convolution(params), &OptionalParams::default());
    assert_eq!(data.len(), 1);
    let kernel = &data[0].kernels[0];
    assert!(kernel.kernel_string.source.contains("convolution_gpu_yxfb_yxio_b16_fp32"));
    assert!(kernel.kernel_string.jit.contains("USE_BLOCK_READ_2"));
    assert!(kernel.kernel_string.jit.contains("#define LOCAL_WORK_GROUP_SIZE 16\n"));
    assert_eq!(data[0].estimated_time, priority::FORCE_PRIORITY_9);
}

#[test]
fn split_tolerates_padding_from_sibling_groups_only() {
    let mut params = conv(Datatype::F32, DataLayout::Yxfb, [4, 4, 8, 16], [4, 4, 8, 16], 1);
    params.split = 2;
    assert!(check_pitch_for_split_only(&params));

    let whole = DataTensor::with_sizes(Datatype::F32, DataLayout::Yxfb, 4, 4, 16, 16);
    let mut half = whole.clone();
    let feature = half.layout.channel_index(data_channel::FEATURE).unwrap();
    half.dims[feature].v = 8;
    *params.base_mut().input_mut() = half.clone();
    assert!(check_pitch_for_split_only(&params));

    params.split = 1;
    assert!(!check_pitch_for_split_only(&params));
}

#[test]
fn reference_reorders_foreign_weights_on_the_device() {
    let ctx = context();
    let mut params = conv(Datatype::F32, DataLayout::Bfyx, [6, 6, 3, 1], [4, 4, 8, 1], 3);
    params.weight_bias.weights = crate::tensor::WeightsTensor::with_sizes(WeightsType::F32, WeightsLayout::Yxio, 3, 3, 3, 8);
    let kernel = Convolution(reference::ConvolutionRef);

    let forbid = OptionalParams {
        allow_weights_reorder: false,
        ..OptionalParams::default()
    };
    assert!(!kernel.validate(&Params::Convolution(params.clone()), &forbid));

    let data = kernel.kernels_data(&ctx, &Params::Convolution(params), &OptionalParams::default());
    assert_eq!(data.len(), 1);
    assert_eq!(data[0].estimated_time, priority::DONT_USE_IF_HAVE_SOMETHING_ELSE);
    assert_eq!(data[0].kernels[0].work_groups.global, [4, 4, 8]);
    match &data[0].weights_reorder {
        WeightsReorder::Gpu { new_buffer_size, .. } => assert_eq!(*new_buffer_size, 3 * 3 * 3 * 8 * 4),
        other => panic!("expected device reorder, got {other:?}"),
    }
    match &data[0].params {
        Params::Convolution(p) => assert_eq!(p.weights().layout, WeightsLayout::Oiyx),
        other => panic!("expected convolution params, got {other:?}"),
    }
}
