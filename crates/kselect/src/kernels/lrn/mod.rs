//! Local response normalization kernels.

pub mod across_channel_opt_b8;
pub mod reference;

use super::{KernelId, family_kernel};
use crate::{
    context::{ComputeContext, EngineInfo}, dispatch::{DEFAULT_LWS_CAP, DispatchData, largest_divisor_up_to}, jit::JitConstants, kernel_base::{ExeMode, KernelData, KernelsData, args_desc, base_params_jit, make_cl_kernel}, params::{LrnParams, OptionalParams, Params}, params_key::ParamsKey, types::Datatype
};

pub trait LrnKernel: Send + Sync + 'static {
    const ID: KernelId;

    fn supported_key(&self) -> ParamsKey;

    fn validate(&self, _params: &LrnParams, _options: &OptionalParams) -> bool {
        true
    }

    fn set_default(&self, params: &LrnParams) -> DispatchData {
        default_dispatch(params, Self::ID.priority())
    }

    fn jit_constants(&self, engine: &EngineInfo, params: &LrnParams, dispatch: &DispatchData) -> JitConstants {
        lrn_jit(engine, params, dispatch)
    }

    fn exe_mode(&self) -> ExeMode {
        ExeMode::Default
    }

    fn kernels_data(&self, ctx: &ComputeContext, params: &LrnParams, _options: &OptionalParams) -> KernelsData
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
            self.exe_mode(),
            args_desc(1, false, false),
        ) else {
            return KernelsData::new();
        };
        let mut data = KernelData::new(Self::ID.as_str(), Params::Lrn(params.clone()));
        data.kernels.push(kernel);
        data.estimated_time = dispatch.efficiency;
        vec![data]
    }
}

family_kernel!(
    /// Adapter from [`LrnKernel`] hooks to the registry.
    Lrn: LrnKernel => Lrn
);

/// `batch·feature` along the first dimension, then x and y.
pub fn default_dispatch(params: &LrnParams, efficiency: f32) -> DispatchData {
    let output = &params.base.output;
    let gws0 = output.batch().v * output.feature().v;
    DispatchData::new(
        [gws0, output.x().v, output.y().v],
        [largest_divisor_up_to(gws0, DEFAULT_LWS_CAP), 1, 1],
        params.base.input().dtype == Datatype::F16,
        efficiency,
    )
}

/// Window, coefficients and the pre-factored alpha terms. Half precision
/// folds `|alpha|` into the value factors to keep the squares in range.
pub fn lrn_jit(engine: &EngineInfo, params: &LrnParams, dispatch: &DispatchData) -> JitConstants {
    let alpha = params.alpha;
    let alpha_div_by_size = alpha / params.local_size.max(1) as f32;
    let alpha_sign = if alpha.is_sign_negative() { -1.0f32 } else { 1.0 };
    let fp16 = dispatch.fp16_unit_used;

    let mut jit = base_params_jit(engine, &params.base);
    jit.define("LOCAL_SIZE", params.local_size)
        .define("PADDING", params.local_size.saturating_sub(1) / 2)
        .define("ALPHA", alpha)
        .define("BETA", params.beta)
        .define("K", params.k)
        .define_kernel_divider(params.divider_mode)
        .define_flag(params.mode)
        .define("ALPHA_AFTER_FACTORED", if fp16 { alpha_sign } else { alpha })
        .define("ALPHA_DIV_BY_SIZE", if fp16 { alpha_sign } else { alpha_div_by_size })
        .define("ALPHA_VAL_FACTOR", if fp16 { alpha.abs().sqrt() } else { 1.0 })
        .define("ALPHA_VAL_FACTOR_DIV_BY_SIZE", if fp16 { alpha_div_by_size.abs().sqrt() } else { 1.0 });
    jit
}

#[path = "lrn.test.rs"]
mod tests;
