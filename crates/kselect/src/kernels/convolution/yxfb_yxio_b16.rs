use super::{ConvolutionDispatch, ConvolutionKernel, check_pitch_for_split_only, convolution_jit, default_dispatch};
use crate::{
    context::EngineInfo, jit::JitConstants, kernel_base::priority, kernels::{KernelId, check_activation_support, check_weights}, params::{ConvolutionParams, OptionalParams}, params_key::ParamsKey, tensor::{DataLayout, WeightsLayout}, types::{Datatype, WeightsType}
};

const MIN_LWS: usize = 16;

/// Batch-vectorised convolution over `yxfb` data and `yxio` weights; each
/// work item produces several output features for several batches.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConvolutionYxfbYxioB16;

impl ConvolutionKernel for ConvolutionYxfbYxioB16 {
    const ID: KernelId = KernelId::ConvolutionYxfbYxioB16;

    fn supported_key(&self) -> ParamsKey {
        let mut k = ParamsKey::new();
        k.enable_input_data_type(Datatype::F16)
            .enable_input_data_type(Datatype::F32)
            .enable_input_weights_type(WeightsType::F16)
            .enable_input_weights_type(WeightsType::F32)
            .enable_output_data_type(Datatype::F16)
            .enable_output_data_type(Datatype::F32)
            .enable_input_layout(DataLayout::Yxfb)
            .enable_output_layout(DataLayout::Yxfb)
            .enable_tensor_offset()
            .enable_tensor_pitches()
            .enable_bias_per_feature()
            .enable_non_bias_term()
            .enable_batching()
            .enable_split_support()
            .enable_dilation()
            .enable_subgroups();
        k
    }

    fn weights_layout(&self, _params: &ConvolutionParams) -> WeightsLayout {
        WeightsLayout::Yxio
    }

    fn validate(&self, params: &ConvolutionParams, options: &OptionalParams) -> bool {
        check_activation_support(params.base().activation)
            && check_weights(&params.weight_bias, WeightsLayout::Yxio, options)
            && check_pitch_for_split_only(params)
    }

    fn set_default(&self, params: &ConvolutionParams) -> Option<ConvolutionDispatch> {
        let filter_ofm = params.weights().ofm().v;
        let batch = params.output().batch().v;
        if filter_ofm == 0 || batch == 0 || params.output().feature().v != filter_ofm {
            return None;
        }

        let mut dispatch = default_dispatch(params);
        if params.input().dtype == Datatype::F16 {
            if filter_ofm % 16 != 0 || batch % MIN_LWS != 0 {
                return None;
            }
            dispatch.ofm_per_work_item = 16;
            dispatch.batches_per_work_item = if batch % (4 * MIN_LWS) == 0 {
                4
            } else if batch % (2 * MIN_LWS) == 0 {
                2
            } else {
                1
            };
            dispatch.base.efficiency = priority::FORCE_PRIORITY_7;
        } else {
            if (filter_ofm * batch) % MIN_LWS != 0 || batch < 32 {
                return None;
            }
            dispatch.ofm_per_work_item = 8;
            dispatch.batches_per_work_item = 2;
            dispatch.base.efficiency = priority::FORCE_PRIORITY_9;
        }

        dispatch.base.work_groups.local[0] = MIN_LWS;
        dispatch.base.work_groups.global[0] = filter_ofm * batch / (dispatch.ofm_per_work_item * dispatch.batches_per_work_item);
        dispatch.base.work_groups.is_valid().then_some(dispatch)
    }

    fn jit_constants(&self, engine: &EngineInfo, params: &ConvolutionParams, dispatch: &ConvolutionDispatch) -> JitConstants {
        let mut jit = convolution_jit(engine, params, dispatch);
        let batch = params.output().batch().v;
        if params.input().dtype == Datatype::F32 {
            // block reads slow down inputs with few features
            if params.input().feature().v > 4 {
                jit.define("USE_BLOCK_READ_2", "");
            }
        } else if batch >= 64 {
            jit.define("USE_BLOCK_READ_2", "");
        } else if batch >= 32 {
            jit.define("USE_BLOCK_READ_1", "");
        }
        jit
    }

    fn template_name(&self, params: &ConvolutionParams) -> String {
        let postfix = match params.input().dtype {
            Datatype::F32 => "_fp32",
            _ => "_fp16",
        };
        format!("{}{postfix}", Self::ID.as_str())
    }
}
