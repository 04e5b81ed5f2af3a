use super::{LrnKernel, default_dispatch};
use crate::{
    context::EngineInfo, dispatch::{DispatchData, optimal_lws}, jit::JitConstants, kernel_base::{ExeMode, base_params_jit}, kernels::KernelId, params::LrnParams, params_key::ParamsKey, tensor::DataLayout, types::{Datatype, KernelDividerMode, LrnMode}
};

/// One output element per work item; averages over an odd-sized window
/// across maps or within the map.
#[derive(Clone, Copy, Debug, Default)]
pub struct LrnRef;

impl LrnKernel for LrnRef {
    const ID: KernelId = KernelId::LrnRef;

    fn supported_key(&self) -> ParamsKey {
        let mut k = ParamsKey::new();
        for dtype in [Datatype::F16, Datatype::F32] {
            k.enable_input_data_type(dtype).enable_output_data_type(dtype);
        }
        k.enable_input_layout(DataLayout::Bfyx)
            .enable_output_layout(DataLayout::Bfyx)
            .enable_tensor_offset()
            .enable_tensor_pitches()
            .enable_batching()
            .enable_lrn_mode(LrnMode::WithinChannel)
            .enable_lrn_mode(LrnMode::AcrossChannel)
            .enable_lrn_kernel_divider_mode(KernelDividerMode::Fixed);
        k
    }

    fn set_default(&self, params: &LrnParams) -> DispatchData {
        let mut dispatch = default_dispatch(params, Self::ID.priority());
        let output = &params.base.output;
        let global = [output.x().v, output.y().v, output.feature().v * output.batch().v];
        dispatch.work_groups.global = global;
        dispatch.work_groups.local = optimal_lws(global);
        dispatch
    }

    fn jit_constants(&self, engine: &EngineInfo, params: &LrnParams, _dispatch: &DispatchData) -> JitConstants {
        let round_norm_size = (params.local_size / 2) * 2 + 1;
        let elements = if params.mode == LrnMode::AcrossChannel {
            round_norm_size
        } else {
            round_norm_size * round_norm_size
        };
        let mut jit = base_params_jit(engine, &params.base);
        if params.mode == LrnMode::AcrossChannel {
            jit.define("ACROSS_MAPS", "");
        }
        jit.define("ROUND_NORM_SIZE", round_norm_size)
            .define("ROUND_NORM_HALF_SIZE", round_norm_size / 2)
            .define("NUM_ELEMENTS_DIV", 1.0f32 / elements as f32)
            .define("ALPHA", params.alpha)
            .define("BETA", params.beta)
            .define("NORM_K", params.k);
        jit
    }

    fn exe_mode(&self) -> ExeMode {
        ExeMode::RoundRobin
    }
}
