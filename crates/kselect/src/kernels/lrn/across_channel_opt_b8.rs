use super::{LrnKernel, default_dispatch, lrn_jit};
use crate::{
    context::EngineInfo, dispatch::DispatchData, jit::JitConstants, kernels::KernelId, params::{LrnParams, OptionalParams}, params_key::ParamsKey, tensor::DataLayout, types::{ActivationFunction, Datatype, KernelDividerMode, LrnMode}
};

const SUB_GROUP_SIZE: usize = 8;

/// Across-channel LRN for `yxfb` with batches packed eight to a sub-group.
#[derive(Clone, Copy, Debug, Default)]
pub struct LrnAcrossChannelOptB8;

impl LrnKernel for LrnAcrossChannelOptB8 {
    const ID: KernelId = KernelId::LrnAcrossChannelOptB8;

    fn supported_key(&self) -> ParamsKey {
        let mut k = ParamsKey::new();
        k.enable_input_data_type(Datatype::F32)
            .enable_output_data_type(Datatype::F32)
            .enable_input_layout(DataLayout::Yxfb)
            .enable_output_layout(DataLayout::Yxfb)
            .enable_tensor_offset()
            .enable_tensor_pitches()
            .enable_batching()
            .enable_lrn_mode(LrnMode::AcrossChannel)
            .enable_lrn_kernel_divider_mode(KernelDividerMode::Fixed)
            .enable_subgroups();
        k
    }

    fn validate(&self, params: &LrnParams, _options: &OptionalParams) -> bool {
        let output = &params.base.output;
        let batch = output.batch().v;
        params.base.activation == ActivationFunction::None
            && params.base.input().batch().pitch == 1
            && output.batch().pitch == 1
            && batch % 8 == 0
            && (batch * output.feature().v) % 64 == 0
    }

    fn set_default(&self, params: &LrnParams) -> DispatchData {
        let mut dispatch = default_dispatch(params, Self::ID.priority());
        dispatch.work_groups.global[0] /= SUB_GROUP_SIZE;
        dispatch.work_groups.local[0] = SUB_GROUP_SIZE;
        dispatch
    }

    fn jit_constants(&self, engine: &EngineInfo, params: &LrnParams, dispatch: &DispatchData) -> JitConstants {
        let mut jit = lrn_jit(engine, params, dispatch);
        jit.define("SUB_GROUP_SIZE", SUB_GROUP_SIZE);
        jit
    }
}
