//! Pooling kernels.

pub mod average_opt;
pub mod bfyx_block_opt;
pub mod reference;

use super::{KernelId, family_kernel};
use crate::{
    context::{ComputeContext, EngineInfo}, dispatch::{DEFAULT_LWS_CAP, DispatchData, largest_divisor_up_to}, jit::JitConstants, kernel_base::{ExeMode, KernelData, KernelsData, args_desc, base_params_jit, make_cl_kernel}, params::{OptionalParams, Params, PoolingParams}, params_key::ParamsKey, tensor::DataLayout, types::{Datatype, align}
};

pub trait PoolingKernel: Send + Sync + 'static {
    const ID: KernelId;

    fn supported_key(&self) -> ParamsKey;

    fn validate(&self, _params: &PoolingParams, _options: &OptionalParams) -> bool {
        true
    }

    fn set_default(&self, params: &PoolingParams) -> DispatchData {
        let mut dispatch = default_dispatch(params);
        dispatch.efficiency = Self::ID.priority();
        dispatch
    }

    fn jit_constants(&self, engine: &EngineInfo, params: &PoolingParams, dispatch: &DispatchData) -> JitConstants {
        pooling_jit(engine, params, dispatch)
    }

    fn kernels_data(&self, ctx: &ComputeContext, params: &PoolingParams, _options: &OptionalParams) -> KernelsData
    where
        Self: Sized,
    {
        let dispatch = self.set_default(params);
        if !dispatch.work_groups.is_valid() {
            return KernelsData::new();
        }
        let jit = self.jit_constants(&ctx.engine, params, &dispatch);
        let Some(kernel) = make_cl_kernel(
            ctx,
            Self::ID.as_str(),
            &params.base.layer_id,
            &jit,
            dispatch.work_groups,
            ExeMode::Default,
            args_desc(1, false, false),
        ) else {
            return KernelsData::new();
        };
        let mut data = KernelData::new(Self::ID.as_str(), Params::Pooling(params.clone()));
        data.kernels.push(kernel);
        data.estimated_time = dispatch.efficiency;
        vec![data]
    }
}

family_kernel!(
    /// Adapter from [`PoolingKernel`] hooks to the registry.
    Pooling: PoolingKernel => Pooling
);

/// Whether the window can read outside the input: any padding, a window
/// larger than the input, or strides that do not land on the last column
/// or row.
pub fn needs_boundary_check(params: &PoolingParams) -> bool {
    if params.padding.x != 0 || params.padding.y != 0 {
        return true;
    }
    let input = params.base.input();
    let (x, y) = (input.x().v, input.y().v);
    let (window, stride) = (params.pool_size, params.stride);
    if x < window.x || y < window.y {
        return true;
    }
    (x - window.x) % stride.x.max(1) != 0 || (y - window.y) % stride.y.max(1) != 0
}

/// `bfyx` outputs tile x in groups of 32 and fold feature and batch onto
/// the third dimension; other layouts put feature×batch first.
pub fn default_dispatch(params: &PoolingParams) -> DispatchData {
    let output = &params.base.output;
    let (x, y, fb) = (output.x().v, output.y().v, output.feature().v * output.batch().v);
    let fp16 = params.base.input().dtype == Datatype::F16;
    let mut dispatch = if output.layout == DataLayout::Bfyx {
        DispatchData::new([align(x, 32), y, fb], [32, 1, 1], fp16, 0.0)
    } else {
        DispatchData::new([fb, x, y], [largest_divisor_up_to(fb, DEFAULT_LWS_CAP), 1, 1], fp16, 0.0)
    };
    dispatch.needs_boundary_check = needs_boundary_check(params);
    dispatch
}

pub fn pooling_jit(engine: &EngineInfo, params: &PoolingParams, dispatch: &DispatchData) -> JitConstants {
    let mut jit = base_params_jit(engine, &params.base);
    jit.define("POOL_SIZE_X", params.pool_size.x)
        .define("POOL_SIZE_Y", params.pool_size.y)
        .define("POOL_PAD_X", params.padding.x)
        .define("POOL_PAD_Y", params.padding.y)
        .define("POOL_STRIDE_X", params.stride.x)
        .define("POOL_STRIDE_Y", params.stride.y)
        .define_pool_type(params.pool_type)
        .define_kernel_divider(params.divider_mode);
    if dispatch.needs_boundary_check {
        jit.define("CHECK_BOUNDARY", 1);
    }
    jit
}

#[path = "pooling.test.rs"]
mod tests;
