use super::{FullyConnectedKernel, fully_connected_jit};
use crate::{
    context::EngineInfo, dispatch::DispatchData, jit::JitConstants, kernels::{KernelId, check_activation_support}, params::{FullyConnectedParams, OptionalParams}, params_key::ParamsKey, tensor::{DataLayout, WeightsLayout}, types::{Datatype, WeightsType}
};

fn reference_key(output: DataLayout) -> ParamsKey {
    let mut k = ParamsKey::new();
    for dtype in [Datatype::F16, Datatype::F32] {
        k.enable_input_data_type(dtype)
            .enable_output_data_type(dtype)
            .enable_input_weights_type(WeightsType::from(dtype));
    }
    k.enable_all_input_layouts()
        .enable_output_layout(output)
        .enable_batching()
        .enable_bias_per_feature()
        .enable_non_bias_term();
    k
}

/// Row-major input against input-major weights.
#[derive(Clone, Copy, Debug, Default)]
pub struct FullyConnectedBfIoRef;

impl FullyConnectedKernel for FullyConnectedBfIoRef {
    const ID: KernelId = KernelId::FullyConnectedBfIoRef;

    fn supported_key(&self) -> ParamsKey {
        reference_key(DataLayout::Bf)
    }

    fn layouts(&self, _params: &FullyConnectedParams) -> (DataLayout, WeightsLayout) {
        (DataLayout::Bf, WeightsLayout::Io)
    }
}

/// Reads `yxfb` inputs against the weights in whatever simple layout they
/// arrive in.
#[derive(Clone, Copy, Debug, Default)]
pub struct FullyConnectedYxfbRef;

impl FullyConnectedKernel for FullyConnectedYxfbRef {
    const ID: KernelId = KernelId::FullyConnectedYxfbRef;

    fn supported_key(&self) -> ParamsKey {
        let mut k = reference_key(DataLayout::Fb);
        k.enable_tensor_offset().enable_tensor_pitches();
        k
    }

    fn layouts(&self, params: &FullyConnectedParams) -> (DataLayout, WeightsLayout) {
        (DataLayout::Yxfb, params.weights().layout)
    }

    fn validate(&self, params: &FullyConnectedParams, options: &OptionalParams) -> bool {
        check_activation_support(params.base().activation)
            && (options.allow_reorder_input || params.input().layout == DataLayout::Yxfb)
            && params.weights().simple_layout()
    }

    fn jit_constants(&self, engine: &EngineInfo, params: &FullyConnectedParams, _dispatch: &DispatchData) -> JitConstants {
        let mut jit = fully_connected_jit(engine, params);
        jit.define("WEIGHTS_DIMS", params.weights().dims.len());
        jit
    }
}
