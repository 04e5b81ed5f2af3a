//! Convolution kernels and the dispatch, jit and padding rules they share.

pub mod bfyx_os_iyx_osv16;
pub mod gemm_like;
pub mod reference;
pub mod yxfb_yxio_b16;

use super::{KernelId, check_weights, family_kernel, update_weights};
use crate::{
    context::{ComputeContext, EngineInfo}, dispatch::{DEFAULT_LWS_CAP, DispatchData, largest_divisor_up_to}, jit::JitConstants, kernel_base::{ExeMode, KernelArgument, KernelData, KernelsData, args_desc, base_params_jit, make_cl_kernel, priority}, params::{ConvolutionParams, OptionalParams, Params, WeightBiasParams}, params_key::ParamsKey, tensor::{DataLayout, DataTensor, Dim, Layout, PaddedVal, WeightsLayout, data_channel}, types::Datatype
};

/// Launch geometry plus the blocking parameters convolution templates read.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConvolutionDispatch {
    pub base: DispatchData,
    pub ofm_per_work_item: usize,
    pub batches_per_work_item: usize,
    pub block_width: usize,
    pub block_height: usize,
    pub prefetch: usize,
    pub input_block_array_size: usize,
    pub input_block_width: usize,
}

/// Per-kernel hooks; the provided methods form the common path.
pub trait ConvolutionKernel: Send + Sync + 'static {
    const ID: KernelId;

    fn supported_key(&self) -> ParamsKey;

    /// Layout the template reads its filter in.
    fn weights_layout(&self, params: &ConvolutionParams) -> WeightsLayout;

    fn validate(&self, params: &ConvolutionParams, options: &OptionalParams) -> bool {
        check_weights(&params.weight_bias, self.weights_layout(params), options)
    }

    /// Kernels reading a zero-padded input request it through this flag.
    fn needs_padded_input(&self) -> bool {
        false
    }

    /// `None` when the request does not fit the kernel's blocking.
    fn set_default(&self, params: &ConvolutionParams) -> Option<ConvolutionDispatch> {
        Some(default_dispatch(params))
    }

    fn jit_constants(&self, engine: &EngineInfo, params: &ConvolutionParams, dispatch: &ConvolutionDispatch) -> JitConstants {
        convolution_jit(engine, params, dispatch)
    }

    fn template_name(&self, _params: &ConvolutionParams) -> String {
        Self::ID.as_str().to_string()
    }

    fn exe_mode(&self) -> ExeMode {
        ExeMode::Default
    }

    fn kernels_data(&self, ctx: &ComputeContext, params: &ConvolutionParams, options: &OptionalParams) -> KernelsData
    where
        Self: Sized,
    {
        common_kernels_data(self, ctx, params, options)
    }
}

family_kernel!(
    /// Adapter from [`ConvolutionKernel`] hooks to the registry.
    Convolution: ConvolutionKernel => Convolution
);

/// `ofm·batch` work items along the first dimension, one output pixel per
/// item along the other two.
pub fn default_dispatch(params: &ConvolutionParams) -> ConvolutionDispatch {
    let output = params.output();
    let gws0 = output.feature().v * output.batch().v;
    let lws0 = largest_divisor_up_to(gws0, DEFAULT_LWS_CAP);
    ConvolutionDispatch {
        base: DispatchData::new(
            [gws0, output.x().v, output.y().v],
            [lws0, 1, 1],
            params.input().dtype == Datatype::F16,
            priority::DONT_USE_IF_HAVE_SOMETHING_ELSE,
        ),
        ofm_per_work_item: 1,
        batches_per_work_item: 1,
        block_width: 1,
        block_height: 1,
        prefetch: 0,
        input_block_array_size: 0,
        input_block_width: 0,
    }
}

/// Base jit plus `FILTER` and, when present, `BIAS`.
pub fn weight_bias_jit(engine: &EngineInfo, params: &WeightBiasParams) -> JitConstants {
    let mut jit = base_params_jit(engine, &params.base);
    jit.define_weights_tensor("FILTER", &params.weights)
        .define("BIAS_TERM", params.bias.is_some());
    if let Some(bias) = &params.bias {
        jit.define_data_tensor("BIAS", bias);
        if bias.same_dims(&params.base.output) {
            jit.define("BIAS_PER_OUTPUT", 1);
        } else {
            jit.define("BIAS_PER_OFM", 1);
        }
    }
    jit
}

pub fn convolution_jit(engine: &EngineInfo, params: &ConvolutionParams, dispatch: &ConvolutionDispatch) -> JitConstants {
    let mut jit = weight_bias_jit(engine, &params.weight_bias);
    jit.define("KERNEL_WIDTH", params.filter_size.x)
        .define("KERNEL_HEIGHT", params.filter_size.y)
        .define("STRIDE_SIZE_X", params.stride.x)
        .define("STRIDE_SIZE_Y", params.stride.y)
        .define("INPUT_PADDING_SIZE_X", params.padding.x)
        .define("INPUT_PADDING_SIZE_Y", params.padding.y)
        .define("DILATION_SIZE_X", params.dilation.x)
        .define("DILATION_SIZE_Y", params.dilation.y)
        .define("FILTER_ARRAY_NUM", params.split);

    let input = params.input();
    if params.padding.x != 0 || params.padding.y != 0 {
        let padded_part = params.padding.x + params.padding.y * input.y().pitch;
        jit.define("INPUT_OFFSET_FOR_PADDED_PART", input.offset.saturating_sub(padded_part));
    }

    if params.output().layout == DataLayout::Yxfb && params.weights().layout == WeightsLayout::Yxio {
        let lws0 = dispatch.base.lws()[0];
        let batch = params.output().batch().v;
        let per_work_item = dispatch.batches_per_work_item.max(1);
        jit.define("LOCAL_WORK_GROUP_SIZE", lws0)
            .define("OFM_PER_WORK_ITEM", dispatch.ofm_per_work_item)
            .define("BATCHES_PER_WORK_ITEM", per_work_item)
            .define("LOCAL_WORK_GROUPS_PER_SINGLE_BATCHES_ELEMENTS", (batch / per_work_item / lws0.max(1)).max(1))
            .define("WORK_ITEMS_PER_SINGLE_BATCHES_ELEMENTS", batch / per_work_item);
    }
    jit
}

/// Dense zero-padded `bfyx` input the blocked kernels read without bounds
/// checks: wide and high enough for the last filter window.
pub fn padded_input_desc(params: &ConvolutionParams) -> DataTensor {
    let (input, output) = (params.input(), params.output());
    let (filter, stride, dilation, padding) = (params.filter_size, params.stride, params.dilation, params.padding);

    let limit_x = (output.x().v.saturating_sub(1)) * stride.x + (filter.x.saturating_sub(1)) * dilation.x + 1;
    let limit_y = (output.y().v.saturating_sub(1)) * stride.y + (filter.y.saturating_sub(1)) * dilation.y + 1;
    let right = limit_x.saturating_sub(input.x().v + padding.x);
    let bottom = limit_y.saturating_sub(input.y().v + padding.y);

    let padded_width = input.x().v + padding.x + right;
    let padded_height = input.y().v + padding.y + bottom;
    let feature = input.feature().v;

    let mut desc = DataTensor::with_sizes(input.dtype, DataLayout::Bfyx, input.x().v, input.y().v, feature, input.batch().v);
    desc.offset = padded_width * padding.y + padding.x;
    desc.padded_val = PaddedVal::Zero;
    let (y_pitch, f_pitch) = (padded_width, padded_width * padded_height);
    desc.dims[0] = Dim::new(input.x().v, 1);
    desc.dims[1] = Dim::new(input.y().v, y_pitch);
    desc.dims[2] = Dim::new(feature, f_pitch);
    desc.dims[3] = Dim::new(input.batch().v, f_pitch * feature);
    desc
}

/// The actual input already satisfies `required`: no smaller pitches or
/// offset, and zeros in the padding when padding is read.
pub fn check_padded_input_desc(params: &ConvolutionParams, required: &DataTensor) -> bool {
    let input = params.input();
    let mut proper = required.offset <= input.offset
        && required.y().pitch <= input.y().pitch
        && required.feature().pitch <= input.feature().pitch
        && required.batch().pitch <= input.batch().pitch;
    if params.padding.x != 0 || params.padding.y != 0 {
        proper &= input.padded_val == PaddedVal::Zero;
    }
    proper
}

/// Padding is tolerated only when it comes from the features of the other
/// split groups.
pub fn check_pitch_for_split_only(params: &ConvolutionParams) -> bool {
    check_tensor_for_split(params.output(), params.split) && check_tensor_for_split(params.input(), params.split)
}

fn check_tensor_for_split(tensor: &DataTensor, split: usize) -> bool {
    if !tensor.padding_exists() {
        return true;
    }
    let Some(feature_index) = tensor.layout.channel_index(data_channel::FEATURE) else {
        return false;
    };
    let Some(next) = tensor.dims.get(feature_index + 1) else {
        return false;
    };
    let features = tensor.dims[feature_index].v * split;
    if features > next.pitch {
        return false;
    }
    let mut whole = tensor.clone();
    whole.dims[feature_index].v = features;
    !whole.padding_exists()
}

/// Shared build path: pad the input if required, compute dispatch, reorder
/// weights, then specialise the template.
pub fn common_kernels_data<K: ConvolutionKernel>(
    kernel: &K,
    ctx: &ComputeContext,
    params: &ConvolutionParams,
    options: &OptionalParams,
) -> KernelsData {
    let mut new_params = params.clone();
    let mut reorder_input = false;
    if kernel.needs_padded_input() {
        let required = padded_input_desc(params);
        if !check_padded_input_desc(params, &required) {
            if !options.allow_padding {
                return KernelsData::new();
            }
            *new_params.base_mut().input_mut() = required;
            reorder_input = true;
        }
    }

    let Some(dispatch) = kernel.set_default(&new_params) else {
        return KernelsData::new();
    };
    if !dispatch.base.work_groups.is_valid() {
        return KernelsData::new();
    }

    let layout = kernel.weights_layout(&new_params);
    let Some(weights_reorder) = update_weights(ctx, &mut new_params.weight_bias, layout, options) else {
        return KernelsData::new();
    };

    let jit = kernel.jit_constants(&ctx.engine, &new_params, &dispatch);
    let mut arguments = args_desc(1, true, new_params.bias().is_some());
    arguments.push(KernelArgument::Split);
    let template = kernel.template_name(&new_params);
    let Some(cl_kernel) = make_cl_kernel(
        ctx,
        &template,
        &new_params.base().layer_id,
        &jit,
        dispatch.base.work_groups,
        kernel.exe_mode(),
        arguments,
    ) else {
        return KernelsData::new();
    };

    let mut data = KernelData::new(K::ID.as_str(), Params::Convolution(new_params));
    data.kernels.push(cl_kernel);
    data.estimated_time = dispatch.base.efficiency;
    data.reorder_input = reorder_input;
    data.weights_reorder = weights_reorder;
    vec![data]
}

#[path = "convolution.test.rs"]
mod tests;
