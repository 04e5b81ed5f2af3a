//! Device-side weights reorder used when a kernel needs its filter in
//! another layout or element type.

use super::{KernelId, KernelImpl};
use crate::{
    context::ComputeContext, dispatch::optimal_lws, jit::JitConstants, kernel_base::{ClKernelData, ExeMode, KernelArgument, KernelData, KernelsData, make_cl_kernel, priority}, params::{OptionalParams, Params, ReorderWeightsParams}, params_key::ParamsKey, tensor::WeightsLayout, types::{KernelType, WeightsType, align}
};

/// Lanes the blocked destination layouts are written with.
fn sub_group_size(layout: WeightsLayout) -> usize {
    match layout {
        WeightsLayout::OsIyxOsv16
        | WeightsLayout::OsIOsv16
        | WeightsLayout::OsIOsv16Ai8
        | WeightsLayout::IYxsOsYxsv2Osv16
        | WeightsLayout::IyXsOsXsv2Osv16Ao32 => 16,
        WeightsLayout::OsIOsv8Ai8 | WeightsLayout::IyXsOsXsv2Osv8Ao32 => 8,
        _ => 1,
    }
}

/// Generic element-by-element weights copy between any two layouts.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReorderWeightsKernel;

impl ReorderWeightsKernel {
    fn jit_constants(params: &ReorderWeightsParams) -> JitConstants {
        let (input, output) = (&params.input, &params.output);
        let mut jit = JitConstants::new();
        jit.define("SRC_TYPE", input.dtype.cl_type())
            .define("DEST_TYPE", output.dtype.cl_type())
            .define("FP16_SUPPORTED", input.dtype == WeightsType::F16 || output.dtype == WeightsType::F16)
            .define("INPUT_DIMS", input.dims.len())
            .define("OUT_DIMS", output.dims.len())
            .define("INPUT_OFFSET", input.offset)
            .define("OUT_OFFSET", output.offset)
            .define("INPUT_X", input.x().v)
            .define("INPUT_Y", input.y().v)
            .define("OUTPUT_X", output.x().v)
            .define("OUTPUT_Y", output.y().v)
            .define("INPUT_X_PITCH", input.x().pitch)
            .define("INPUT_Y_PITCH", input.y().pitch)
            .define("INPUT_IFM_PITCH", input.ifm().pitch)
            .define("INPUT_OFM_PITCH", input.ofm().pitch)
            .define("OUT_X_PITCH", output.x().pitch)
            .define("OUT_Y_PITCH", output.y().pitch)
            .define("OUT_IFM_PITCH", output.ifm().pitch)
            .define("OUT_OFM_PITCH", output.ofm().pitch)
            .define("SIMPLE_INPUT", input.simple_layout())
            .define("SIMPLE_OUTPUT", output.simple_layout())
            .define("SUB_GROUP_SIZE", sub_group_size(output.layout))
            .define_layout_flag("INPUT", input.layout)
            .define_layout_flag("OUTPUT", output.layout);
        jit
    }

    fn build(ctx: &ComputeContext, params: &ReorderWeightsParams) -> KernelsData {
        let output = &params.output;
        let lanes = sub_group_size(output.layout);
        let global = [align(output.ofm().v, lanes), output.ifm().v, output.x().v * output.y().v];
        let local = if lanes > 1 { [lanes, 1, 1] } else { optimal_lws(global) };
        let work_groups = crate::dispatch::WorkGroups::new(global, local);
        if !work_groups.is_valid() {
            return KernelsData::new();
        }

        let jit = Self::jit_constants(params);
        let arguments = vec![KernelArgument::Input(0), KernelArgument::Output];
        let Some(kernel) = make_cl_kernel(ctx, KernelId::ReorderWeights.as_str(), &params.layer_id, &jit, work_groups, ExeMode::Default, arguments) else {
            return KernelsData::new();
        };
        let mut data = KernelData::new(KernelId::ReorderWeights.as_str(), Params::ReorderWeights(params.clone()));
        data.kernels.push(kernel);
        data.estimated_time = priority::DONT_USE_IF_HAVE_SOMETHING_ELSE;
        vec![data]
    }
}

impl KernelImpl for ReorderWeightsKernel {
    fn name(&self) -> &'static str {
        KernelId::ReorderWeights.as_str()
    }

    fn kernel_type(&self) -> KernelType {
        KernelType::ReorderWeights
    }

    fn priority(&self) -> f32 {
        KernelId::ReorderWeights.priority()
    }

    fn supported_key(&self) -> ParamsKey {
        let mut k = ParamsKey::new();
        for &wtype in WeightsType::ALL {
            k.enable_input_weights_type(wtype).enable_output_weights_type(wtype);
        }
        k.enable_all_input_weights_layouts()
            .enable_all_output_weights_layouts()
            .enable_tensor_offset()
            .enable_tensor_pitches();
        k
    }

    fn validate(&self, params: &Params, _options: &OptionalParams) -> bool {
        matches!(params, Params::ReorderWeights(p) if p.input.ofm().v == p.output.ofm().v)
    }

    fn kernels_data(&self, ctx: &ComputeContext, params: &Params, options: &OptionalParams) -> KernelsData {
        match params {
            Params::ReorderWeights(p) if self.validate(params, options) => Self::build(ctx, p),
            _ => KernelsData::new(),
        }
    }
}

/// Cheapest registered reorder kernel able to serve `params`.
pub fn best_reorder_kernel(ctx: &ComputeContext, params: ReorderWeightsParams) -> Option<ClKernelData> {
    let params = Params::ReorderWeights(params);
    let options = OptionalParams::default();
    let request = params.params_key();
    super::implementations(KernelType::ReorderWeights)
        .into_iter()
        .filter(|kernel| kernel.supported_key().support(&request))
        .flat_map(|kernel| kernel.kernels_data(ctx, &params, &options))
        .filter(|data| !data.kernels.is_empty())
        .min_by(|a, b| a.estimated_time.total_cmp(&b.estimated_time))
        .and_then(|data| data.kernels.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::test_support::context;
    use crate::tensor::WeightsTensor;

    #[test]
    fn blocked_targets_launch_one_sub_group_per_sixteen_outputs() {
        let ctx = context();
        let input = WeightsTensor::with_sizes(WeightsType::F32, WeightsLayout::Oiyx, 3, 3, 4, 20);
        let params = ReorderWeightsParams::new(input.clone(), input.transform(WeightsLayout::OsIyxOsv16));
        let kernel = best_reorder_kernel(&ctx, params).unwrap();
        assert_eq!(kernel.work_groups.global, [32, 4, 9]);
        assert_eq!(kernel.work_groups.local, [16, 1, 1]);
        assert!(kernel.kernel_string.jit.contains("#define OUTPUT_LAYOUT_OS_IYX_OSV16 1\n"));
        assert!(kernel.kernel_string.jit.contains("#define SRC_TYPE float\n"));
    }

    #[test]
    fn type_changing_reorders_are_supported() {
        let ctx = context();
        let input = WeightsTensor::with_sizes(WeightsType::F32, WeightsLayout::Yxio, 1, 1, 8, 8);
        let params = ReorderWeightsParams::new(input.clone(), input.transform_to(WeightsLayout::Oiyx, WeightsType::F16));
        let kernel = best_reorder_kernel(&ctx, params).unwrap();
        assert!(kernel.kernel_string.jit.contains("#define DEST_TYPE half\n"));
        assert!(kernel.kernel_string.jit.contains("#define FP16_SUPPORTED 1\n"));
    }
}
