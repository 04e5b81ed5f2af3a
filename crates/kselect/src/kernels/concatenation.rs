//! Concatenation kernels. Each input is copied by its own kernel into the
//! output at the running offset along the concatenation axis.

use super::{KernelId, check_activation_support, family_kernel};
use crate::{
    context::{ComputeContext, EngineInfo}, dispatch::{DispatchData, optimal_lws, tensor_friendly_work_groups, tensor_friendly_work_groups_jit}, jit::JitConstants, kernel_base::{ExeMode, KernelArgument, KernelData, KernelsData, base_params_jit, make_cl_kernel}, params::{BaseParams, ConcatenationParams, OptionalParams, Params}, params_key::ParamsKey, tensor::{DataLayout, DataTensor}, types::{ActivationFunction, ConcatAxis, Datatype, align}
};

pub trait ConcatenationKernel: Send + Sync + 'static {
    const ID: KernelId;

    fn supported_key(&self) -> ParamsKey;

    fn validate(&self, params: &ConcatenationParams, options: &OptionalParams) -> bool;

    /// Geometry of the kernel copying `input`.
    fn set_default(&self, params: &ConcatenationParams, input: &DataTensor) -> DispatchData;

    fn jit_constants(&self, engine: &EngineInfo, params: &BaseParams, axis: ConcatAxis, offset: usize) -> JitConstants {
        concatenation_jit(engine, params, axis, offset)
    }

    fn kernels_data(&self, ctx: &ComputeContext, params: &ConcatenationParams, _options: &OptionalParams) -> KernelsData
    where
        Self: Sized,
    {
        let mut data = KernelData::new(Self::ID.as_str(), Params::Concatenation(params.clone()));
        let mut offset = 0;
        let mut efficiency = Self::ID.priority();
        for (idx, input) in params.base.inputs().iter().enumerate() {
            let dispatch = self.set_default(params, input);
            if !dispatch.work_groups.is_valid() {
                return KernelsData::new();
            }
            let single = single_input(&params.base, input);
            let jit = self.jit_constants(&ctx.engine, &single, params.axis, offset);
            let arguments = vec![KernelArgument::Input(idx as u32), KernelArgument::Output];
            let Some(kernel) = make_cl_kernel(
                ctx,
                Self::ID.as_str(),
                &params.base.layer_id,
                &jit,
                dispatch.work_groups,
                ExeMode::Default,
                arguments,
            ) else {
                return KernelsData::new();
            };
            data.kernels.push(kernel);
            offset += axis_extent(input, params.axis);
            efficiency = dispatch.efficiency;
        }
        data.estimated_time = efficiency;
        vec![data]
    }
}

family_kernel!(
    /// Adapter from [`ConcatenationKernel`] hooks to the registry.
    Concatenation: ConcatenationKernel => Concatenation
);

/// Size of `tensor` along `axis`.
pub fn axis_extent(tensor: &DataTensor, axis: ConcatAxis) -> usize {
    match axis {
        ConcatAxis::X => tensor.x().v,
        ConcatAxis::Y => tensor.y().v,
        ConcatAxis::Feature => tensor.feature().v,
        ConcatAxis::Batch => tensor.batch().v,
    }
}

/// The shared params narrowed to one input, as the per-input kernel sees them.
fn single_input(base: &BaseParams, input: &DataTensor) -> BaseParams {
    let mut single = BaseParams::new(input.clone(), base.output.clone());
    single.layer_id.clone_from(&base.layer_id);
    single.activation = base.activation;
    single.nl_params = base.nl_params;
    single
}

pub fn concatenation_jit(engine: &EngineInfo, params: &BaseParams, axis: ConcatAxis, offset: usize) -> JitConstants {
    let mut jit = base_params_jit(engine, params);
    jit.define_concat_axis(axis)
        .define("CONCAT_AXIS_INDEX", axis as usize)
        .define("OUTPUT_OFFSET_IN_CONCAT_AXIS", offset);
    jit
}

/// Any axis and layout; each input copied element by element in its
/// physical order.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConcatenationRef;

impl ConcatenationKernel for ConcatenationRef {
    const ID: KernelId = KernelId::ConcatenationRef;

    fn supported_key(&self) -> ParamsKey {
        let mut k = ParamsKey::new();
        for dtype in [Datatype::F16, Datatype::F32] {
            k.enable_input_data_type(dtype).enable_output_data_type(dtype);
        }
        for layout in [DataLayout::Bf, DataLayout::Fb, DataLayout::Bfyx, DataLayout::Yxfb, DataLayout::Byxf, DataLayout::Fyxb] {
            k.enable_input_layout(layout).enable_output_layout(layout);
        }
        for &axis in ConcatAxis::ALL {
            k.enable_concat_axis(axis);
        }
        k.enable_tensor_offset()
            .enable_tensor_pitches()
            .enable_batching()
            .enable_different_types()
            .enable_concat_kernel_per_input();
        k
    }

    fn validate(&self, params: &ConcatenationParams, _options: &OptionalParams) -> bool {
        check_activation_support(params.base.activation)
    }

    fn set_default(&self, params: &ConcatenationParams, input: &DataTensor) -> DispatchData {
        let global = tensor_friendly_work_groups(input);
        DispatchData::new(global, optimal_lws(global), params.base.output.dtype == Datatype::F16, Self::ID.priority())
    }

    fn jit_constants(&self, engine: &EngineInfo, params: &BaseParams, axis: ConcatAxis, offset: usize) -> JitConstants {
        let mut jit = concatenation_jit(engine, params, axis, offset);
        jit.extend(tensor_friendly_work_groups_jit(params.input()));
        jit
    }
}

/// Feature-axis concatenation of dense `bfyx` inputs, eight elements per
/// work item.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConcatenationDepthBfyxNoPitch;

impl ConcatenationKernel for ConcatenationDepthBfyxNoPitch {
    const ID: KernelId = KernelId::ConcatenationDepthBfyxNoPitch;

    fn supported_key(&self) -> ParamsKey {
        let mut k = ParamsKey::new();
        k.enable_input_data_type(Datatype::F32).enable_output_data_type(Datatype::F32);
        for layout in [DataLayout::Bfyx, DataLayout::Bf] {
            k.enable_input_layout(layout).enable_output_layout(layout);
        }
        k.enable_tensor_offset()
            .enable_batching()
            .enable_concat_axis(ConcatAxis::Feature)
            .enable_concat_kernel_per_input();
        k
    }

    fn validate(&self, params: &ConcatenationParams, _options: &OptionalParams) -> bool {
        params.base.activation == ActivationFunction::None
            && params.base.inputs().iter().all(|input| !input.padding_exists())
            && !params.base.output.padding_exists()
    }

    fn set_default(&self, _params: &ConcatenationParams, input: &DataTensor) -> DispatchData {
        let batch = input.batch().v.max(1);
        DispatchData::new(
            [batch, align((input.length() / batch / 8).max(1), 16), 1],
            [1, 16, 1],
            false,
            Self::ID.priority(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{kernel_base::priority, kernels::{KernelImpl, test_support::context}};

    fn inception_concat(dtype: Datatype, layout: DataLayout) -> ConcatenationParams {
        let input = |f| DataTensor::with_sizes(dtype, layout, 28, 28, f, 1);
        ConcatenationParams::new(
            vec![input(64), input(128), input(32), input(32)],
            DataTensor::with_sizes(dtype, layout, 28, 28, 256, 1),
            ConcatAxis::Feature,
        )
        .unwrap()
    }

    #[test]
    fn reference_offsets_each_input_along_the_axis() {
        let ctx = context();
        let params = inception_concat(Datatype::F16, DataLayout::Bfyx);
        let kernel = Concatenation(ConcatenationRef);
        let hints = OptionalParams::default().params_key(crate::types::KernelType::Concatenation);
        assert!(kernel.supported_key().support(&params.params_key().merge(&hints)));

        let data = kernel.kernels_data(&ctx, &Params::Concatenation(params), &OptionalParams::default());
        assert_eq!(data.len(), 1);
        let kernels = &data[0].kernels;
        assert_eq!(kernels.len(), 4);
        let offsets: Vec<_> = kernels
            .iter()
            .map(|k| {
                let marker = "#define OUTPUT_OFFSET_IN_CONCAT_AXIS ";
                let start = k.kernel_string.jit.find(marker).unwrap() + marker.len();
                let end = start + k.kernel_string.jit[start..].find('\n').unwrap();
                k.kernel_string.jit[start..end].to_string()
            })
            .collect();
        assert_eq!(offsets, ["0", "64", "192", "224"]);
        assert_eq!(kernels[2].arguments, vec![KernelArgument::Input(2), KernelArgument::Output]);
        assert!(kernels[0].kernel_string.jit.contains("#define CONCAT_FEATURE 1\n"));
        assert_eq!(data[0].estimated_time, priority::DONT_USE_IF_HAVE_SOMETHING_ELSE);
    }

    #[test]
    fn depth_kernel_splits_each_input_into_eight_element_chunks() {
        let params = inception_concat(Datatype::F32, DataLayout::Bfyx);
        let kernel = ConcatenationDepthBfyxNoPitch;
        assert!(kernel.validate(&params, &OptionalParams::default()));
        let dispatch = kernel.set_default(&params, &params.base.inputs()[0]);
        assert_eq!(dispatch.gws(), [1, 6272, 1]);
        assert_eq!(dispatch.lws(), [1, 16, 1]);
        assert_eq!(dispatch.efficiency, priority::FORCE_PRIORITY_9);

        let mut fused = params;
        fused.base.activation = ActivationFunction::Relu;
        assert!(!kernel.validate(&fused, &OptionalParams::default()));
    }
}
