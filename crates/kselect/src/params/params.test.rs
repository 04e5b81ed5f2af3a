#![cfg(test)]

use super::*;
use crate::{
    tensor::WeightsLayout, types::{ConcatAxis, Datatype, PoolType, Size2, SoftmaxDim, WeightsType}
};

fn alexnet_conv1() -> ConvolutionParams {
    let mut params = ConvolutionParams::new(
        DataTensor::with_sizes(Datatype::F16, DataLayout::Bfyx, 227, 227, 3, 1),
        DataTensor::with_sizes(Datatype::F16, DataLayout::Bfyx, 55, 55, 96, 1),
        WeightsTensor::with_sizes(WeightsType::F16, WeightsLayout::Oiyx, 11, 11, 3, 96),
        Some(DataTensor::with_sizes(Datatype::F16, DataLayout::Bf, 1, 1, 96, 1)),
    );
    params.stride = Size2::splat(4);
    params.base_mut().activation = ActivationFunction::Relu;
    params
}

#[test]
fn identical_fields_give_identical_signatures() {
    let a = alexnet_conv1();
    let b = alexnet_conv1();
    assert_eq!(a.to_string(), b.to_string());
    assert_eq!(Params::from(a).to_string(), Params::from(b).to_string());
}

#[test]
fn base_signature_names_dtype_layouts_and_sizes() {
    let params = alexnet_conv1();
    let base = params.base().to_string();
    assert!(base.starts_with(&format!("{}_BFYX_BFYX_{}_", Datatype::F16, ActivationFunction::Relu)));
    assert!(base.ends_with("_227_227_3_1_55_55_96_1"));
}

#[test]
fn conv1_signature_and_hash_are_pinned() {
    let signature = alexnet_conv1().to_string();
    assert_eq!(signature, "F16_BFYX_BFYX_RELU_0_0_227_227_3_1_55_55_96_1_OIYX_BF_11_11_0_0_4_4_1_1");
    assert_eq!(crate::cost_table::signature_hash(&signature), 0x4715_bc42_e1c0_26d6);
}

#[test]
fn stride_changes_the_signature() {
    let a = alexnet_conv1();
    let mut b = alexnet_conv1();
    b.stride = Size2::splat(2);
    assert_ne!(a.to_string(), b.to_string());
}

#[test]
fn signature_ignores_the_layer_name() {
    let a = alexnet_conv1();
    let mut b = alexnet_conv1();
    b.base_mut().layer_id = "conv1".to_string();
    assert_eq!(a.to_string(), b.to_string());
    assert_eq!(Params::from(b).layer_id(), "conv1");
}

#[test]
fn base_key_reflects_the_tensors() {
    let mut params = alexnet_conv1();
    let key = params.params_key();
    let mut expected = ParamsKey::new();
    expected
        .enable_input_data_type(Datatype::F16)
        .enable_output_data_type(Datatype::F16)
        .enable_input_layout(DataLayout::Bfyx)
        .enable_output_layout(DataLayout::Bfyx);
    assert_eq!(key.merge(&expected), key);
    assert!(key.support(&expected));
    let mut batched = expected;
    batched.enable_batching();
    assert!(!key.support(&batched));

    params.base_mut().input_mut().offset = 8;
    let mut offset = ParamsKey::new();
    offset.enable_tensor_offset();
    assert_eq!(params.params_key().merge(&offset), params.params_key());
}

#[test]
fn optional_hints_only_affect_their_family() {
    let mut options = OptionalParams::for_engine(&EngineInfo::default());
    options.kernel_per_input = false;
    assert_eq!(options.max_work_group_size, 256);

    let mut one_kernel = ParamsKey::new();
    one_kernel.enable_concat_one_kernel().enable_subgroups();
    assert_eq!(options.params_key(KernelType::Concatenation), one_kernel);

    let mut subgroups = ParamsKey::new();
    subgroups.enable_subgroups();
    assert_eq!(options.params_key(KernelType::Pooling), subgroups);
}

#[test]
fn params_report_their_family() {
    let input = DataTensor::with_sizes(Datatype::F32, DataLayout::Bfyx, 13, 13, 256, 1);
    let pool = PoolingParams::new(input.clone(), DataTensor::with_sizes(Datatype::F32, DataLayout::Bfyx, 6, 6, 256, 1));
    assert_eq!(pool.pool_type, PoolType::Max);
    assert_eq!(Params::from(pool).kernel_type(), KernelType::Pooling);

    let softmax = SoftmaxParams::new(input.clone(), input.clone(), SoftmaxDim::Feature);
    assert_eq!(Params::from(softmax).kernel_type(), KernelType::Softmax);

    let concat = ConcatenationParams::new(vec![input.clone(), input.clone()], input, ConcatAxis::Feature);
    assert!(concat.is_some());
}
