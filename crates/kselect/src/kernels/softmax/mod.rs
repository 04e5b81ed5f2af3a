//! Softmax kernels.

pub mod items_class;
pub mod reference;

use super::{KernelId, family_kernel};
use crate::{
    context::{ComputeContext, EngineInfo}, dispatch::DispatchData, jit::JitConstants, kernel_base::{ExeMode, KernelData, KernelsData, args_desc, base_params_jit, make_cl_kernel}, params::{OptionalParams, Params, SoftmaxParams}, params_key::ParamsKey, tensor::DataLayout, types::{ActivationFunction, Datatype, SoftmaxDim}
};

/// Launch geometry plus the per-set item counts the templates loop over.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SoftmaxDispatch {
    pub base: DispatchData,
    pub items_num: usize,
    pub data_sets_count: usize,
    pub data_set_size: usize,
}

pub trait SoftmaxKernel: Send + Sync + 'static {
    const ID: KernelId;

    fn supported_key(&self) -> ParamsKey;

    fn validate(&self, params: &SoftmaxParams, _options: &OptionalParams) -> bool {
        check_flattenable(params)
    }

    /// `None` when the request does not fit the kernel's work split.
    fn set_default(&self, params: &SoftmaxParams, options: &OptionalParams) -> Option<SoftmaxDispatch>;

    fn jit_constants(&self, engine: &EngineInfo, params: &SoftmaxParams, dispatch: &SoftmaxDispatch) -> JitConstants {
        softmax_jit(engine, params, dispatch)
    }

    fn kernels_data(&self, ctx: &ComputeContext, params: &SoftmaxParams, options: &OptionalParams) -> KernelsData
    where
        Self: Sized,
    {
        let Some(dispatch) = self.set_default(params, options) else {
            return KernelsData::new();
        };
        if !dispatch.base.work_groups.is_valid() {
            return KernelsData::new();
        }
        let jit = self.jit_constants(&ctx.engine, params, &dispatch);
        let Some(kernel) = make_cl_kernel(
            ctx,
            Self::ID.as_str(),
            &params.base.layer_id,
            &jit,
            dispatch.base.work_groups,
            ExeMode::Default,
            args_desc(1, false, false),
        ) else {
            return KernelsData::new();
        };
        let mut data = KernelData::new(Self::ID.as_str(), Params::Softmax(params.clone()));
        data.kernels.push(kernel);
        data.estimated_time = dispatch.base.efficiency;
        vec![data]
    }
}

family_kernel!(
    /// Adapter from [`SoftmaxKernel`] hooks to the registry.
    Softmax: SoftmaxKernel => Softmax
);

/// No fused activation, and either a 2D tensor or one whose only
/// non-unit extent is the softmax dimension.
pub fn check_flattenable(params: &SoftmaxParams) -> bool {
    if params.base.activation != ActivationFunction::None {
        return false;
    }
    let input = params.base.input();
    if matches!(input.layout, DataLayout::Bf | DataLayout::Fb) {
        return true;
    }
    let (x, y, f) = (input.x().v, input.y().v, input.feature().v);
    match params.dim {
        SoftmaxDim::X => y == 1 && f == 1,
        SoftmaxDim::Y => x == 1 && f == 1,
        SoftmaxDim::Feature => x == 1 && y == 1,
    }
}

/// One data set per batch, sized by the flattened feature extent.
pub fn default_dispatch(params: &SoftmaxParams, efficiency: f32) -> SoftmaxDispatch {
    let input = params.base.input();
    SoftmaxDispatch {
        base: DispatchData::new([1, 1, 1], [1, 1, 1], input.dtype == Datatype::F16, efficiency),
        items_num: 0,
        data_sets_count: input.batch().v,
        data_set_size: input.flatten_feature_and_spatials().feature().v,
    }
}

/// Largest local size the reduction scratch buffer allows.
pub fn max_local_size(options: &OptionalParams, fp16: bool) -> usize {
    let unit = if fp16 { 2 } else { 4 };
    options.max_work_group_size.min(options.max_local_mem_size / (2 * unit))
}

/// Double the local size, halving the items each work item covers, until
/// at most 32 remain and the local size covers them or the limit is hit.
pub fn spread_items(mut lws: usize, mut items: usize, max_lws: usize) -> (usize, usize) {
    while (items > 32 || lws < items) && 2 * lws <= max_lws {
        lws *= 2;
        items /= 2;
    }
    (lws, items)
}

pub fn softmax_jit(engine: &EngineInfo, params: &SoftmaxParams, dispatch: &SoftmaxDispatch) -> JitConstants {
    let mut jit = base_params_jit(engine, &params.base);
    jit.define("ITEMS_NUM", dispatch.items_num)
        .define("LWS", dispatch.base.lws()[0])
        .define("GWS", dispatch.base.gws()[0])
        .define("DATA_SETS_COUNT", dispatch.data_sets_count)
        .define("DATA_SET_SIZE", dispatch.data_set_size)
        .define("LEFTOVERS", dispatch.base.leftovers);
    jit
}

#[path = "softmax.test.rs"]
mod tests;
