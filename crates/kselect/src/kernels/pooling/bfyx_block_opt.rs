use super::{PoolingKernel, default_dispatch, needs_boundary_check, pooling_jit};
use crate::{
    context::EngineInfo, dispatch::DispatchData, jit::JitConstants, kernels::KernelId, params::{OptionalParams, PoolingParams}, params_key::ParamsKey, tensor::DataLayout, types::{Datatype, KernelDividerMode, PoolRemainder, PoolType, align}
};

const MAX_WINDOW: usize = 5;

/// Each work item walks a column block of `pool_size.y` output rows.
#[derive(Clone, Copy, Debug, Default)]
pub struct PoolingBfyxBlockOpt;

impl PoolingKernel for PoolingBfyxBlockOpt {
    const ID: KernelId = KernelId::PoolingBfyxBlockOpt;

    fn supported_key(&self) -> ParamsKey {
        let mut k = ParamsKey::new();
        k.enable_input_data_type(Datatype::F16)
            .enable_input_data_type(Datatype::F32)
            .enable_output_data_type(Datatype::F16)
            .enable_output_data_type(Datatype::F32)
            .enable_input_layout(DataLayout::Bfyx)
            .enable_output_layout(DataLayout::Bfyx)
            .enable_tensor_offset()
            .enable_tensor_pitches()
            .enable_batching()
            .enable_pool_type(PoolType::Max)
            .enable_pool_type(PoolType::Avg)
            .enable_pool_remainder(PoolRemainder::Floor)
            .enable_pool_remainder(PoolRemainder::Ceil)
            .enable_pool_kernel_divider_mode(KernelDividerMode::Fixed);
        k
    }

    fn validate(&self, params: &PoolingParams, _options: &OptionalParams) -> bool {
        !needs_boundary_check(params) && params.pool_size.x <= MAX_WINDOW && params.pool_size.y <= MAX_WINDOW
    }

    fn set_default(&self, params: &PoolingParams) -> DispatchData {
        let mut dispatch = default_dispatch(params);
        let rows = params.pool_size.y.max(1);
        dispatch.work_groups.global[1] = align(params.base.output.y().v, rows) / rows;
        dispatch.efficiency = Self::ID.priority();
        dispatch
    }

    fn jit_constants(&self, engine: &EngineInfo, params: &PoolingParams, dispatch: &DispatchData) -> JitConstants {
        let mut jit = pooling_jit(engine, params, dispatch);
        let (size, stride) = (params.pool_size.y, params.stride.y);
        jit.define("BLOCK_SIZE_Y", size + size * stride - 1);
        jit
    }
}
