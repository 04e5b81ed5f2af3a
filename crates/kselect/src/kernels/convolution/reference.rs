use super::{ConvolutionDispatch, ConvolutionKernel, default_dispatch};
use crate::{
    dispatch::optimal_lws, kernels::KernelId, params::ConvolutionParams, params_key::ParamsKey, tensor::{DataLayout, WeightsLayout}, types::{Datatype, WeightsType}
};

/// Direct loop over the filter window; one output element per work item.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConvolutionRef;

impl ConvolutionKernel for ConvolutionRef {
    const ID: KernelId = KernelId::ConvolutionRef;

    fn supported_key(&self) -> ParamsKey {
        let mut k = ParamsKey::new();
        k.enable_input_data_type(Datatype::F16)
            .enable_input_data_type(Datatype::F32)
            .enable_output_data_type(Datatype::F16)
            .enable_output_data_type(Datatype::F32)
            .enable_input_weights_type(WeightsType::F16)
            .enable_input_weights_type(WeightsType::F32)
            .enable_input_layout(DataLayout::Bfyx)
            .enable_output_layout(DataLayout::Bfyx)
            .enable_tensor_offset()
            .enable_tensor_pitches()
            .enable_dilation()
            .enable_bias_per_feature()
            .enable_bias_per_output()
            .enable_non_bias_term()
            .enable_batching()
            .enable_split_support();
        k
    }

    fn weights_layout(&self, _params: &ConvolutionParams) -> WeightsLayout {
        WeightsLayout::Oiyx
    }

    fn set_default(&self, params: &ConvolutionParams) -> Option<ConvolutionDispatch> {
        let output = params.output();
        let mut dispatch = default_dispatch(params);
        let global = [output.x().v, output.y().v, output.feature().v * output.batch().v];
        dispatch.base.work_groups.global = global;
        dispatch.base.work_groups.local = optimal_lws(global);
        Some(dispatch)
    }
}
