use super::{ConvolutionDispatch, ConvolutionKernel, check_padded_input_desc, convolution_jit, default_dispatch, padded_input_desc};
use crate::{
    context::ComputeContext, kernel_base::{ExeMode, KernelArgument, KernelData, KernelsData, WeightsReorder, args_desc, make_cl_kernel, priority}, kernels::KernelId, params::{ConvolutionParams, OptionalParams, Params}, params_key::ParamsKey, tensor::{DataLayout, WeightsLayout}, types::{Datatype, WeightsType, align, ceil_div}, weights_reorder::{CpuReorder, CpuReorderKind, InterleaveLayout}
};

/// Sub-group blocking of the gemm formulation for one element type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubGroupInfo {
    pub sub_block_m: usize,
    pub sub_block_k: usize,
    pub sub_block_n: usize,
    pub local_work_size: [usize; 3],
    pub global_work_size_dx: usize,
    pub global_work_size_dy: usize,
    pub global_work_size_dz: usize,
}

impl SubGroupInfo {
    pub fn for_params(params: &ConvolutionParams) -> Self {
        let filter_x = params.filter_size.x;
        match params.input().dtype {
            Datatype::F16 => Self {
                sub_block_m: 1,
                sub_block_k: filter_x,
                sub_block_n: 32,
                local_work_size: [1, 16, 1],
                global_work_size_dx: 32,
                global_work_size_dy: 1,
                global_work_size_dz: 1,
            },
            _ => Self {
                sub_block_m: 2,
                sub_block_k: filter_x,
                sub_block_n: 32,
                local_work_size: [1, 8, 1],
                global_work_size_dx: 32,
                global_work_size_dy: 2,
                global_work_size_dz: 1,
            },
        }
    }
}

/// Convolution as a matrix product against interleaved, host-reordered
/// weights.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConvolutionGemmLike;

impl ConvolutionGemmLike {
    fn dispatch(params: &ConvolutionParams, info: &SubGroupInfo) -> ConvolutionDispatch {
        let output = params.output();
        let sgemm_m = align(output.x().v * output.y().v, info.sub_block_m);
        let sgemm_n = align(output.feature().v, info.sub_block_n);
        let [lws_x, lws_y, lws_z] = info.local_work_size;
        let mut dispatch = default_dispatch(params);
        dispatch.base.work_groups.global = [
            align(ceil_div(sgemm_n, info.global_work_size_dx), lws_x),
            align(ceil_div(sgemm_m, info.global_work_size_dy), lws_y),
            output.batch().v,
        ];
        dispatch.base.work_groups.local = [lws_x, lws_y, lws_z];
        dispatch.base.efficiency = priority::FORCE_PRIORITY_6;
        dispatch
    }
}

impl ConvolutionKernel for ConvolutionGemmLike {
    const ID: KernelId = KernelId::ConvolutionGemmLike;

    fn supported_key(&self) -> ParamsKey {
        let mut k = ParamsKey::new();
        k.enable_input_data_type(Datatype::F16)
            .enable_input_data_type(Datatype::F32)
            .enable_output_data_type(Datatype::F16)
            .enable_output_data_type(Datatype::F32)
            .enable_input_weights_type(WeightsType::F16)
            .enable_input_weights_type(WeightsType::F32)
            .enable_input_layout(DataLayout::Bfyx)
            .enable_output_layout(DataLayout::Bfyx)
            .enable_tensor_offset()
            .enable_tensor_pitches()
            .enable_subgroups()
            .enable_bias_per_feature()
            .set_num_dims(4);
        k
    }

    fn weights_layout(&self, params: &ConvolutionParams) -> WeightsLayout {
        params.weights().layout
    }

    fn validate(&self, params: &ConvolutionParams, options: &OptionalParams) -> bool {
        options.allow_padding || check_padded_input_desc(params, &padded_input_desc(params))
    }

    fn needs_padded_input(&self) -> bool {
        true
    }

    fn exe_mode(&self) -> ExeMode {
        ExeMode::AgeBased
    }

    fn kernels_data(&self, ctx: &ComputeContext, params: &ConvolutionParams, options: &OptionalParams) -> KernelsData {
        let required = padded_input_desc(params);
        let proper = check_padded_input_desc(params, &required);
        if !options.allow_padding && !proper {
            return KernelsData::new();
        }

        let mut new_params = params.clone();
        let mut reorder_input = false;
        if options.allow_padding && !proper {
            *new_params.base_mut().input_mut() = required;
            reorder_input = true;
        }

        let info = SubGroupInfo::for_params(&new_params);
        let dispatch = Self::dispatch(&new_params, &info);
        if !dispatch.base.work_groups.is_valid() {
            return KernelsData::new();
        }

        let mut jit = convolution_jit(&ctx.engine, &new_params, &dispatch);
        if options.allow_padding || new_params.padding.x == 0 {
            jit.define("INPUT_BUFFER_WIDTH_PADDED", "");
        }
        if options.allow_padding || new_params.padding.y == 0 {
            jit.define("INPUT_BUFFER_HEIGHT_PADDED", "");
        }
        let precision_flag = match new_params.input().dtype {
            Datatype::F16 => "__convolution_f16",
            _ => "__convolution_f32",
        };
        let filter = new_params.filter_size;
        jit.define(precision_flag, "")
            .define("ALIGNED_OFM", align(new_params.output().feature().v, info.sub_block_n))
            .define("DX", info.global_work_size_dx)
            .define("DY", info.global_work_size_dy)
            .define("KERNEL_WIDTH_DIV2", filter.x / 2)
            .define("KERNEL_SLICE_DIV2", filter.x * filter.y / 2);

        let mut arguments = args_desc(1, true, true);
        arguments.push(KernelArgument::Uint32(0));
        let Some(cl_kernel) = make_cl_kernel(
            ctx,
            Self::ID.as_str(),
            &new_params.base().layer_id,
            &jit,
            dispatch.base.work_groups,
            self.exe_mode(),
            arguments,
        ) else {
            return KernelsData::new();
        };

        let weights = new_params.weights().clone();
        let k = weights.x().v * weights.y().v * weights.ifm().v;
        let layout = InterleaveLayout::new(weights.ofm().v, k, filter.x, info.sub_block_n, info.local_work_size[1]);
        let reorder = CpuReorder::new(
            CpuReorderKind::Interleave(layout),
            weights,
            WeightsType::from(new_params.input().dtype),
        );
        let new_buffer_size = reorder.new_buffer_size();

        let mut data = KernelData::new(Self::ID.as_str(), Params::Convolution(new_params));
        data.kernels.push(cl_kernel);
        data.estimated_time = dispatch.base.efficiency;
        data.reorder_input = reorder_input;
        data.weights_reorder = WeightsReorder::Cpu { reorder, new_buffer_size };
        vec![data]
    }
}
