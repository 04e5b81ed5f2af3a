#![cfg(test)]

use super::*;
use crate::{
    kernel_base::priority, kernels::{KernelImpl, test_support::context}, tensor::{DataTensor, WeightsTensor}, types::WeightsType
};

fn fc(dtype: Datatype, input: DataTensor, output_layout: DataLayout, weights: WeightsTensor) -> FullyConnectedParams {
    let ofm = weights.ofm().v;
    let batch = input.batch().v;
    FullyConnectedParams::new(
        input,
        DataTensor::with_sizes(dtype, output_layout, 1, 1, ofm, batch),
        weights,
        Some(DataTensor::with_sizes(dtype, DataLayout::Bf, 1, 1, ofm, 1)),
    )
}

/// AlexNet fc6 straight off the last pooling layer.
fn alexnet_fc6() -> FullyConnectedParams {
    fc(
        Datatype::F16,
        DataTensor::with_sizes(Datatype::F16, DataLayout::Bfyx, 6, 6, 256, 1),
        DataLayout::Bf,
        WeightsTensor::with_sizes(WeightsType::F16, WeightsLayout::Oiyx, 6, 6, 256, 4096),
    )
}

#[test]
fn unpadded_spatial_tensors_read_as_two_dimensional() {
    let params = alexnet_fc6();
    let options = OptionalParams::default();
    let plan = plan_layouts(&params, DataLayout::Bf, WeightsLayout::Oi, &options).unwrap();
    assert!(plan.proper_input);
    assert!(plan.proper_weights);

    let plan = plan_layouts(&params, DataLayout::Bf, WeightsLayout::Io, &options).unwrap();
    assert!(!plan.proper_weights);

    let frozen = OptionalParams {
        allow_weights_reorder: false,
        ..OptionalParams::default()
    };
    assert!(plan_layouts(&params, DataLayout::Bf, WeightsLayout::Io, &frozen).is_none());
    assert!(plan_layouts(&params, DataLayout::Fb, WeightsLayout::Oi, &options).is_none());
}

#[test]
fn bf_io_reference_reorders_weights_on_the_device() {
    let ctx = context();
    let kernel = FullyConnected(reference::FullyConnectedBfIoRef);
    let data = kernel.kernels_data(&ctx, &Params::FullyConnected(alexnet_fc6()), &OptionalParams::default());
    assert_eq!(data.len(), 1);
    let data = &data[0];
    assert!(!data.reorder_input);
    assert_eq!(data.estimated_time, priority::DONT_USE_IF_HAVE_SOMETHING_ELSE);
    match &data.weights_reorder {
        WeightsReorder::Gpu { new_buffer_size, .. } => assert_eq!(*new_buffer_size, 9216 * 4096 * 2),
        other => panic!("expected device reorder, got {other:?}"),
    }
    let Params::FullyConnected(reordered) = &data.params else {
        panic!("expected fully connected params, got {:?}", data.params);
    };
    assert_eq!(reordered.weights().layout, WeightsLayout::Io);
    assert_eq!(reordered.weights().ifm().v, 9216);

    let cl = &data.kernels[0];
    assert_eq!(cl.work_groups.global, [4096, 1, 1]);
    assert_eq!(cl.work_groups.local, [32, 1, 1]);
    assert!(cl.kernel_string.jit.contains("#define INPUT_ELEMENTS_COUNT 9216\n"));
    assert_eq!(cl.arguments.len(), 4);
}

#[test]
fn foreign_input_layouts_need_permission_to_reorder() {
    let ctx = context();
    let params = fc(
        Datatype::F32,
        DataTensor::with_sizes(Datatype::F32, DataLayout::Yxfb, 6, 6, 256, 1),
        DataLayout::Bf,
        WeightsTensor::with_sizes(WeightsType::F32, WeightsLayout::Io, 1, 1, 9216, 10),
    );
    let kernel = FullyConnected(reference::FullyConnectedBfIoRef);
    let request = Params::FullyConnected(params);
    assert!(kernel.kernels_data(&ctx, &request, &OptionalParams::default()).is_empty());

    let options = OptionalParams {
        allow_reorder_input: true,
        ..OptionalParams::default()
    };
    let data = kernel.kernels_data(&ctx, &request, &options);
    assert!(data[0].reorder_input);
    let Params::FullyConnected(reordered) = &data[0].params else {
        panic!("expected fully connected params, got {:?}", data[0].params);
    };
    assert_eq!(reordered.input().layout, DataLayout::Bf);
    assert_eq!(reordered.input().feature().v, 9216);
}

#[test]
fn fb_io_block_splits_responses_into_sub_group_reads() {
    let ctx = context();
    let params = fc(
        Datatype::F16,
        DataTensor::with_sizes(Datatype::F16, DataLayout::Fb, 1, 1, 4096, 32),
        DataLayout::Fb,
        WeightsTensor::with_sizes(WeightsType::F16, WeightsLayout::Io, 1, 1, 4096, 1000),
    );
    let kernel = fb_io_block::FullyConnectedFbIoBlock;
    let dispatch = kernel.set_default(&params).unwrap();
    assert_eq!(dispatch.gws(), [512, 1, 1]);
    assert_eq!(dispatch.lws(), [16, 1, 1]);

    let data = FullyConnected(kernel).kernels_data(&ctx, &Params::FullyConnected(params), &OptionalParams::default());
    assert_eq!(data[0].estimated_time, priority::FORCE_PRIORITY_3);
    let jit = &data[0].kernels[0].kernel_string.jit;
    assert!(jit.contains("#define RG_COUNT 32\n"));
    assert!(jit.contains("#define LAST_RG_SIZE 8\n"));
    assert!(jit.contains("#define CHUNK_TYPE uint\n"));
}

#[test]
fn fb_io_block_needs_whole_sub_group_batches() {
    let params = fc(
        Datatype::F16,
        DataTensor::with_sizes(Datatype::F16, DataLayout::Fb, 1, 1, 4096, 8),
        DataLayout::Fb,
        WeightsTensor::with_sizes(WeightsType::F16, WeightsLayout::Io, 1, 1, 4096, 1000),
    );
    let kernel = fb_io_block::FullyConnectedFbIoBlock;
    assert!(kernel.validate(&params, &OptionalParams::default()));
    assert!(kernel.set_default(&params).is_none());
    assert_eq!(kernel.estimated_time(&params), priority::FORCE_PRIORITY_5);
}

#[test]
fn gemm_reports_the_input_line_remainders() {
    let ctx = context();
    let params = fc(
        Datatype::F32,
        DataTensor::with_sizes(Datatype::F32, DataLayout::Bf, 1, 1, 1002, 2),
        DataLayout::Bf,
        WeightsTensor::with_sizes(WeightsType::F32, WeightsLayout::Oiyx, 1, 1, 1002, 10),
    );
    let data = FullyConnected(gemm::FullyConnectedBfIoGemm).kernels_data(
        &ctx,
        &Params::FullyConnected(params),
        &OptionalParams::default(),
    );
    assert_eq!(data.len(), 1);
    assert!(data[0].weights_reorder.is_none());
    let cl = &data[0].kernels[0];
    assert_eq!(cl.work_groups.global, [64, 10, 2]);
    assert!(cl.kernel_string.jit.contains("#define __fc_f32 \n"));
    assert!(cl.kernel_string.jit.contains("#define LAST_INPUT_SIZE_REMAINDER 234\n"));
    assert!(cl.kernel_string.jit.contains("#define LAST_INPUT_SIZE_DIV_4 2\n"));
}

#[test]
fn yxfb_reference_keeps_simple_weights_as_they_are() {
    let input = DataTensor::with_sizes(Datatype::F32, DataLayout::Yxfb, 6, 6, 256, 8);
    let yxio = WeightsTensor::with_sizes(WeightsType::F32, WeightsLayout::Yxio, 6, 6, 256, 16);
    let params = fc(Datatype::F32, input.clone(), DataLayout::Fb, yxio);
    let kernel = reference::FullyConnectedYxfbRef;
    assert!(kernel.validate(&params, &OptionalParams::default()));

    let ctx = context();
    let data = FullyConnected(kernel).kernels_data(&ctx, &Params::FullyConnected(params), &OptionalParams::default());
    assert!(data[0].weights_reorder.is_none());
    assert!(data[0].kernels[0].kernel_string.jit.contains("#define WEIGHTS_DIMS 4\n"));

    let blocked = WeightsTensor::with_sizes(WeightsType::F32, WeightsLayout::OsIyxOsv16, 6, 6, 256, 16);
    let params = fc(Datatype::F32, input, DataLayout::Fb, blocked);
    assert!(!kernel.validate(&params, &OptionalParams::default()));
}
