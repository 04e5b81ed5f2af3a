use super::{PoolingKernel, default_dispatch};
use crate::{
    dispatch::DispatchData, kernels::KernelId, params::{OptionalParams, PoolingParams}, params_key::ParamsKey, tensor::DataLayout, types::{ActivationFunction, Datatype, KernelDividerMode, PoolRemainder, PoolType, Size2, ceil_div}
};

const SIMD_SIZE: usize = 16;
const TILE_WIDTH: usize = SIMD_SIZE - 2;
const TILE_HEIGHT: usize = 7;

/// 3×3 same-size average pooling over 14×7 tiles per sub-group.
#[derive(Clone, Copy, Debug, Default)]
pub struct PoolingAverageOpt;

impl PoolingKernel for PoolingAverageOpt {
    const ID: KernelId = KernelId::PoolingAverageOpt;

    fn supported_key(&self) -> ParamsKey {
        let mut k = ParamsKey::new();
        k.enable_input_data_type(Datatype::F32)
            .enable_output_data_type(Datatype::F32)
            .enable_input_layout(DataLayout::Bfyx)
            .enable_output_layout(DataLayout::Bfyx)
            .enable_pool_type(PoolType::Avg)
            .enable_pool_remainder(PoolRemainder::Floor)
            .enable_pool_remainder(PoolRemainder::Ceil)
            .enable_pool_kernel_divider_mode(KernelDividerMode::Fixed);
        k
    }

    fn validate(&self, params: &PoolingParams, _options: &OptionalParams) -> bool {
        let (input, output) = (params.base.input(), &params.base.output);
        params.base.activation == ActivationFunction::None
            && params.pool_size == Size2::splat(3)
            && params.stride == Size2::splat(1)
            && params.padding == Size2::splat(1)
            && input.same_dims(output)
            && !input.padding_exists()
            && !output.padding_exists()
    }

    fn set_default(&self, params: &PoolingParams) -> DispatchData {
        let mut dispatch = default_dispatch(params);
        let input = params.base.input();
        dispatch.work_groups.global = [
            ceil_div(input.x().v, TILE_WIDTH) * SIMD_SIZE,
            ceil_div(input.y().v, TILE_HEIGHT),
            input.feature().v,
        ];
        dispatch.work_groups.local = [SIMD_SIZE, 1, 1];
        dispatch.efficiency = Self::ID.priority();
        dispatch
    }
}
