//! Fully connected kernels.
//!
//! Each kernel names the input and weights layouts its template reads.
//! Requests arriving in another layout are served through an input or
//! weights reorder when the optional params allow it.

pub mod fb_io_block;
pub mod gemm;
pub mod reference;

use super::{KernelId, check_activation_support, convolution::weight_bias_jit, family_kernel, update_weights};
use crate::{
    context::{ComputeContext, EngineInfo}, dispatch::{DEFAULT_LWS_CAP, DispatchData, largest_divisor_up_to}, jit::JitConstants, kernel_base::{ExeMode, KernelData, KernelsData, WeightsReorder, args_desc, make_cl_kernel}, params::{FullyConnectedParams, OptionalParams, Params}, params_key::ParamsKey, tensor::{DataLayout, WeightsLayout}, types::Datatype
};

/// Which of the request's tensors already match the kernel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayoutPlan {
    pub input_layout: DataLayout,
    pub weights_layout: WeightsLayout,
    pub proper_input: bool,
    pub proper_weights: bool,
}

/// `None` when the fused activation is unsupported or a needed reorder is
/// not allowed.
///
/// Unpadded `fyxb`/`bfyx` inputs read as `fb`/`bf`, and unpadded
/// `iyxo`/`oiyx` weights read as `io`/`oi`, without moving data.
pub fn plan_layouts(
    params: &FullyConnectedParams,
    input_layout: DataLayout,
    weights_layout: WeightsLayout,
    options: &OptionalParams,
) -> Option<LayoutPlan> {
    if !check_activation_support(params.base().activation) {
        return None;
    }
    let (input, weights) = (params.input(), params.weights());
    let proper_input = input.layout == input_layout
        || (!input.padding_exists()
            && matches!(
                (input_layout, input.layout),
                (DataLayout::Fb, DataLayout::Fyxb) | (DataLayout::Bf, DataLayout::Bfyx)
            ));
    let proper_weights = weights.layout == weights_layout
        || (!weights.padding_exists()
            && matches!(
                (weights_layout, weights.layout),
                (WeightsLayout::Io, WeightsLayout::Iyxo) | (WeightsLayout::Oi, WeightsLayout::Oiyx)
            ));
    if !(options.allow_reorder_input || proper_input) || !(options.allow_weights_reorder || proper_weights) {
        return None;
    }
    Some(LayoutPlan {
        input_layout,
        weights_layout,
        proper_input,
        proper_weights,
    })
}

pub trait FullyConnectedKernel: Send + Sync + 'static {
    const ID: KernelId;

    fn supported_key(&self) -> ParamsKey;

    /// Input and weights layouts the template reads.
    fn layouts(&self, params: &FullyConnectedParams) -> (DataLayout, WeightsLayout);

    fn validate(&self, params: &FullyConnectedParams, options: &OptionalParams) -> bool {
        let (input_layout, weights_layout) = self.layouts(params);
        plan_layouts(params, input_layout, weights_layout, options).is_some()
    }

    fn set_default(&self, params: &FullyConnectedParams) -> Option<DispatchData> {
        Some(default_dispatch(params))
    }

    fn jit_constants(&self, engine: &EngineInfo, params: &FullyConnectedParams, _dispatch: &DispatchData) -> JitConstants {
        fully_connected_jit(engine, params)
    }

    fn estimated_time(&self, _params: &FullyConnectedParams) -> f32 {
        Self::ID.priority()
    }

    fn kernels_data(&self, ctx: &ComputeContext, params: &FullyConnectedParams, options: &OptionalParams) -> KernelsData
    where
        Self: Sized,
    {
        common_kernels_data(self, ctx, params, options)
    }
}

family_kernel!(
    /// Adapter from [`FullyConnectedKernel`] hooks to the registry.
    FullyConnected: FullyConnectedKernel => FullyConnected
);

/// One output element per work item.
pub fn default_dispatch(params: &FullyConnectedParams) -> DispatchData {
    let gws0 = params.output().length();
    let lws0 = largest_divisor_up_to(gws0, DEFAULT_LWS_CAP);
    DispatchData::new([gws0, 1, 1], [lws0, 1, 1], params.input().dtype == Datatype::F16, 0.0)
}

pub fn fully_connected_jit(engine: &EngineInfo, params: &FullyConnectedParams) -> JitConstants {
    let input = params.input();
    let mut jit = weight_bias_jit(engine, &params.weight_bias);
    jit.define("INPUT_ELEMENTS_COUNT", input.length() / input.batch().v.max(1))
        .define("WEIGHTS_BATCH_NUM", params.weights().ofm().v);
    jit
}

pub fn common_kernels_data<K: FullyConnectedKernel>(
    kernel: &K,
    ctx: &ComputeContext,
    params: &FullyConnectedParams,
    options: &OptionalParams,
) -> KernelsData {
    let (input_layout, weights_layout) = kernel.layouts(params);
    let Some(plan) = plan_layouts(params, input_layout, weights_layout, options) else {
        return KernelsData::new();
    };

    let mut new_params = params.clone();
    if !plan.proper_input {
        let reordered = new_params.input().transform(plan.input_layout);
        *new_params.weight_bias.base.input_mut() = reordered;
    }
    let weights_reorder = if plan.proper_weights {
        WeightsReorder::None
    } else {
        match update_weights(ctx, &mut new_params.weight_bias, plan.weights_layout, options) {
            Some(reorder) => reorder,
            None => return KernelsData::new(),
        }
    };

    let Some(dispatch) = kernel.set_default(&new_params) else {
        return KernelsData::new();
    };
    if !dispatch.work_groups.is_valid() {
        return KernelsData::new();
    }
    let jit = kernel.jit_constants(&ctx.engine, &new_params, &dispatch);
    let arguments = args_desc(1, true, new_params.weight_bias.bias.is_some());
    let Some(cl_kernel) = make_cl_kernel(
        ctx,
        K::ID.as_str(),
        &new_params.base().layer_id,
        &jit,
        dispatch.work_groups,
        ExeMode::Default,
        arguments,
    ) else {
        return KernelsData::new();
    };

    let estimated_time = kernel.estimated_time(&new_params);
    let mut data = KernelData::new(K::ID.as_str(), Params::FullyConnected(new_params));
    data.kernels.push(cl_kernel);
    data.estimated_time = estimated_time;
    data.reorder_input = !plan.proper_input;
    data.weights_reorder = weights_reorder;
    vec![data]
}

#[path = "fully_connected.test.rs"]
mod tests;
