use super::{ConvolutionDispatch, ConvolutionKernel, check_padded_input_desc, convolution_jit, default_dispatch, padded_input_desc};
use crate::{
    context::EngineInfo, jit::JitConstants, kernel_base::priority, kernels::{KernelId, check_activation_support, check_weights}, params::{ConvolutionParams, OptionalParams}, params_key::ParamsKey, tensor::{DataLayout, WeightsLayout}, types::{Datatype, Size2, WeightsType, align, ceil_div}
};

const SUB_GROUP_SIZE: usize = 16;
const MAX_FILTER_SIZE: usize = 11;

/// Output blocks per work item over `os_iyx_osv16` weights, sixteen output
/// features per sub-group.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConvolutionBfyxOsIyxOsv16;

/// Input elements one work item reads for its output block: the number of
/// sub-group-sized vectors and the row width, rounded to the read chunk.
fn input_block_dims(block: Size2, filter: Size2, stride: Size2, dilation: Size2, read_chunk: usize) -> (usize, usize) {
    let required_width = (block.x - 1) * stride.x + (filter.x - 1) * dilation.x + 1;
    let required_height = (block.y - 1) * stride.y + (filter.y - 1) * dilation.y + 1;
    let read_width = align(required_width, read_chunk).max(SUB_GROUP_SIZE);
    (ceil_div(required_height * read_width, SUB_GROUP_SIZE), read_width)
}

impl ConvolutionKernel for ConvolutionBfyxOsIyxOsv16 {
    const ID: KernelId = KernelId::ConvolutionBfyxOsIyxOsv16;

    fn supported_key(&self) -> ParamsKey {
        let mut k = ParamsKey::new();
        k.enable_input_data_type(Datatype::F16)
            .enable_input_data_type(Datatype::F32)
            .enable_input_weights_type(WeightsType::F16)
            .enable_input_weights_type(WeightsType::F32)
            .enable_output_data_type(Datatype::F16)
            .enable_output_data_type(Datatype::F32)
            .enable_input_layout(DataLayout::Bfyx)
            .enable_output_layout(DataLayout::Bfyx)
            .enable_tensor_offset()
            .enable_tensor_pitches()
            .enable_subgroups()
            .enable_bias_per_feature()
            .enable_bias_per_output()
            .enable_non_bias_term()
            .enable_batching()
            .enable_split_support()
            .enable_dilation();
        k
    }

    fn weights_layout(&self, _params: &ConvolutionParams) -> WeightsLayout {
        WeightsLayout::OsIyxOsv16
    }

    fn validate(&self, params: &ConvolutionParams, options: &OptionalParams) -> bool {
        let padded = options.allow_padding || check_padded_input_desc(params, &padded_input_desc(params));
        padded
            && check_activation_support(params.base().activation)
            && check_weights(&params.weight_bias, WeightsLayout::OsIyxOsv16, options)
    }

    fn needs_padded_input(&self) -> bool {
        true
    }

    fn set_default(&self, params: &ConvolutionParams) -> Option<ConvolutionDispatch> {
        let (filter, stride, dilation) = (params.filter_size, params.stride, params.dilation);
        if filter.x > MAX_FILTER_SIZE || filter.y > MAX_FILTER_SIZE {
            return None;
        }
        let output = params.output();
        let mut dispatch = default_dispatch(params);
        let ofm_threads = align(output.feature().v, SUB_GROUP_SIZE);
        dispatch.base.leftovers = ofm_threads - output.feature().v;
        dispatch.base.efficiency = if params.input().x().v <= SUB_GROUP_SIZE {
            priority::FORCE_PRIORITY_3
        } else {
            priority::FORCE_PRIORITY_5
        };

        let (block, prefetch) = if stride == Size2::splat(1) {
            if filter == Size2::splat(1) {
                dispatch.base.efficiency = priority::FORCE_PRIORITY_3;
                (Size2::new(16, 1), 4)
            } else if output.x().v + (filter.x - 1) * dilation.x < SUB_GROUP_SIZE {
                // a whole output row fits one sub-group read
                dispatch.base.efficiency = priority::FORCE_PRIORITY_3;
                (Size2::new(output.x().v, 1), 4)
            } else if filter.x < 5 && filter.y < 5 {
                dispatch.base.efficiency = priority::FORCE_PRIORITY_3;
                (Size2::new(SUB_GROUP_SIZE - filter.x + 1, 2), 4)
            } else {
                (Size2::new(4, 3), 4)
            }
        } else if stride == Size2::splat(2) {
            dispatch.base.efficiency = priority::FORCE_PRIORITY_3;
            (Size2::new(5, 4), 4)
        } else {
            dispatch.base.efficiency = priority::FORCE_PRIORITY_7;
            (Size2::new(4, 3), 5)
        };
        dispatch.block_width = block.x;
        dispatch.block_height = block.y;
        dispatch.prefetch = prefetch;

        let read_chunk = if dispatch.base.fp16_unit_used { SUB_GROUP_SIZE } else { SUB_GROUP_SIZE / 2 };
        let (array_size, read_width) = input_block_dims(block, filter, stride, dilation, read_chunk);
        dispatch.input_block_array_size = array_size;
        dispatch.input_block_width = read_width;

        dispatch.base.work_groups.global = [
            ceil_div(output.x().v, block.x),
            ceil_div(output.y().v, block.y),
            ofm_threads * output.batch().v,
        ];
        dispatch.base.work_groups.local = [1, 1, SUB_GROUP_SIZE];
        Some(dispatch)
    }

    fn jit_constants(&self, engine: &EngineInfo, params: &ConvolutionParams, dispatch: &ConvolutionDispatch) -> JitConstants {
        let mut jit = convolution_jit(engine, params, dispatch);
        jit.define("SUB_GROUP_SIZE", dispatch.base.lws()[2])
            .define("OUT_BLOCK_WIDTH", dispatch.block_width)
            .define("OUT_BLOCK_HEIGHT", dispatch.block_height)
            .define("IN_BLOCK_ARRAY_SIZE", dispatch.input_block_array_size)
            .define("IN_BLOCK_WIDTH", dispatch.input_block_width)
            .define("PREFETCH", dispatch.prefetch);
        if dispatch.base.leftovers != 0 {
            jit.define("LEFTOVERS", dispatch.base.leftovers);
        }
        jit
    }
}
