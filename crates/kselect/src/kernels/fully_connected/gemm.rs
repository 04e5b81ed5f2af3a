use super::{FullyConnectedKernel, fully_connected_jit};
use crate::{
    context::EngineInfo, dispatch::DispatchData, jit::JitConstants, kernels::{KernelId, check_activation_support}, params::{FullyConnectedParams, OptionalParams}, params_key::ParamsKey, tensor::{DataLayout, WeightsLayout}, types::{Datatype, WeightsType}
};

const LOCAL_WORK_SIZE_X: usize = 64;
const VEC_SIZE: usize = 4;

/// Matrix-vector product with one 64-wide work group per output neuron.
#[derive(Clone, Copy, Debug, Default)]
pub struct FullyConnectedBfIoGemm;

impl FullyConnectedKernel for FullyConnectedBfIoGemm {
    const ID: KernelId = KernelId::FullyConnectedBfIoGemm;

    fn supported_key(&self) -> ParamsKey {
        let mut k = ParamsKey::new();
        for dtype in [Datatype::F16, Datatype::F32] {
            k.enable_input_data_type(dtype)
                .enable_output_data_type(dtype)
                .enable_input_weights_type(WeightsType::from(dtype));
        }
        k.enable_input_layout(DataLayout::Bfyx)
            .enable_input_layout(DataLayout::Bf)
            .enable_output_layout(DataLayout::Bf)
            .enable_bias_per_feature()
            .enable_tensor_offset()
            .enable_tensor_pitches()
            .enable_batching();
        k
    }

    /// Reads the input as given.
    fn layouts(&self, params: &FullyConnectedParams) -> (DataLayout, WeightsLayout) {
        (params.input().layout, WeightsLayout::Oiyx)
    }

    fn validate(&self, params: &FullyConnectedParams, options: &OptionalParams) -> bool {
        check_activation_support(params.base().activation)
            && (params.weights().layout == WeightsLayout::Oiyx || options.allow_weights_reorder)
    }

    fn set_default(&self, params: &FullyConnectedParams) -> Option<DispatchData> {
        let output = params.output();
        Some(DispatchData::new(
            [LOCAL_WORK_SIZE_X, output.feature().v, output.batch().v],
            [LOCAL_WORK_SIZE_X, 1, 1],
            params.input().dtype == Datatype::F16,
            Self::ID.priority(),
        ))
    }

    fn jit_constants(&self, engine: &EngineInfo, params: &FullyConnectedParams, _dispatch: &DispatchData) -> JitConstants {
        let line_size = params.input().batch().pitch;
        let mut jit = fully_connected_jit(engine, params);
        let variant = if params.input().dtype == Datatype::F16 { "__fc_f16" } else { "__fc_f32" };
        jit.define(variant, "")
            .define("LAST_INPUT_SIZE_REMAINDER", line_size % (LOCAL_WORK_SIZE_X * VEC_SIZE))
            .define("LAST_INPUT_SIZE_DIV_4", line_size % VEC_SIZE);
        jit
    }
}
