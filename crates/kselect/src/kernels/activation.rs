//! Standalone activation kernels.

use super::{KernelId, check_activation_support, family_kernel};
use crate::{
    context::{ComputeContext, EngineInfo}, dispatch::{DispatchData, optimal_lws, tensor_friendly_work_groups, tensor_friendly_work_groups_jit}, jit::JitConstants, kernel_base::{ExeMode, KernelData, KernelsData, args_desc, base_params_jit, make_cl_kernel}, params::{ActivationParams, OptionalParams, Params}, params_key::ParamsKey, tensor::{Layout, data_channel}, types::{ActivationFunction, Datatype, ceil_div}
};

pub trait ActivationKernel: Send + Sync + 'static {
    const ID: KernelId;

    fn supported_key(&self) -> ParamsKey;

    fn validate(&self, params: &ActivationParams, options: &OptionalParams) -> bool;

    fn set_default(&self, params: &ActivationParams) -> DispatchData;

    fn jit_constants(&self, engine: &EngineInfo, params: &ActivationParams, dispatch: &DispatchData) -> JitConstants;

    fn kernels_data(&self, ctx: &ComputeContext, params: &ActivationParams, _options: &OptionalParams) -> KernelsData
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
        let mut data = KernelData::new(Self::ID.as_str(), Params::Activation(params.clone()));
        data.kernels.push(kernel);
        data.estimated_time = dispatch.efficiency;
        vec![data]
    }
}

family_kernel!(
    /// Adapter from [`ActivationKernel`] hooks to the registry.
    Activation: ActivationKernel => Activation
);

fn float_key() -> ParamsKey {
    let mut k = ParamsKey::new();
    for dtype in [Datatype::F16, Datatype::F32] {
        k.enable_input_data_type(dtype).enable_output_data_type(dtype);
    }
    k.enable_all_input_layouts()
        .enable_all_output_layouts()
        .enable_tensor_offset()
        .enable_tensor_pitches();
    k
}

/// Any layout and any function, one element per work item in the output's
/// physical order.
#[derive(Clone, Copy, Debug, Default)]
pub struct ActivationRef;

impl ActivationKernel for ActivationRef {
    const ID: KernelId = KernelId::ActivationRef;

    fn supported_key(&self) -> ParamsKey {
        let mut k = float_key();
        k.enable_batching();
        k
    }

    fn validate(&self, params: &ActivationParams, _options: &OptionalParams) -> bool {
        params.base.input().layout == params.base.output.layout
    }

    fn set_default(&self, params: &ActivationParams) -> DispatchData {
        let global = tensor_friendly_work_groups(&params.base.output);
        DispatchData::new(
            global,
            optimal_lws(global),
            params.base.input().dtype == Datatype::F16,
            Self::ID.priority(),
        )
    }

    fn jit_constants(&self, engine: &EngineInfo, params: &ActivationParams, _dispatch: &DispatchData) -> JitConstants {
        let mut jit = base_params_jit(engine, &params.base);
        jit.extend(tensor_friendly_work_groups_jit(&params.base.output));
        jit
    }
}

const NUM_ROWS_WI: usize = 1;
const NUM_COLS_WI: usize = 4;

/// Vectorised over four consecutive x elements. Rows must start on a
/// 4-byte boundary.
#[derive(Clone, Copy, Debug, Default)]
pub struct ActivationOpt;

impl ActivationOpt {
    /// Rows of one batch: every element count except x and batch.
    fn rows(params: &ActivationParams) -> usize {
        let input = params.base.input();
        input.length() / (input.x().v * input.batch().v).max(1)
    }
}

impl ActivationKernel for ActivationOpt {
    const ID: KernelId = KernelId::ActivationOpt;

    fn supported_key(&self) -> ParamsKey {
        let mut k = float_key();
        k.enable_batching().enable_subgroups().set_num_dims(4);
        k
    }

    fn validate(&self, params: &ActivationParams, _options: &OptionalParams) -> bool {
        let input = params.base.input();
        let line_alignment = 4 / input.element_size().max(1);
        check_activation_support(params.base.activation)
            && params.base.activation != ActivationFunction::None
            && input.layout == params.base.output.layout
            && input.layout.channel_index(data_channel::X) == Some(0)
            && input.y().pitch % line_alignment == 0
    }

    fn set_default(&self, params: &ActivationParams) -> DispatchData {
        let input = params.base.input();
        DispatchData::new(
            [
                ceil_div(input.x().v, NUM_COLS_WI),
                ceil_div(Self::rows(params), NUM_ROWS_WI),
                input.batch().v,
            ],
            [1, 1, 1],
            input.dtype == Datatype::F16,
            Self::ID.priority(),
        )
    }

    fn jit_constants(&self, engine: &EngineInfo, params: &ActivationParams, _dispatch: &DispatchData) -> JitConstants {
        let width = params.base.input().x().v;
        let rows = Self::rows(params);
        let mut jit = base_params_jit(engine, &params.base);
        jit.define("NUM_ROWS_WI", NUM_ROWS_WI)
            .define("NUM_COLS_WI", NUM_COLS_WI)
            .define("INPUT_WIDTH", width)
            .define("INPUT_ROWS", rows)
            .define("INPUT_ROWS_MOD_ROWS_WI", rows % NUM_ROWS_WI)
            .define("INPUT_WIDTH_MOD_COLS_WI", width % NUM_COLS_WI);
        jit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        kernel_base::priority, kernels::{KernelImpl, test_support::context}, tensor::{DataLayout, DataTensor}
    };

    fn relu(dtype: Datatype, layout: DataLayout, sizes: [usize; 4]) -> ActivationParams {
        let [x, y, f, b] = sizes;
        let mut params = ActivationParams::new(
            DataTensor::with_sizes(dtype, layout, x, y, f, b),
            DataTensor::with_sizes(dtype, layout, x, y, f, b),
        );
        params.base.activation = ActivationFunction::Relu;
        params
    }

    #[test]
    fn opt_covers_four_columns_per_work_item() {
        let params = relu(Datatype::F16, DataLayout::Bfyx, [30, 10, 3, 2]);
        assert!(ActivationOpt.validate(&params, &OptionalParams::default()));
        let dispatch = ActivationOpt.set_default(&params);
        assert_eq!(dispatch.gws(), [8, 30, 2]);

        let ctx = context();
        let jit = ActivationOpt.jit_constants(&ctx.engine, &params, &dispatch);
        assert_eq!(jit.value_of("INPUT_ROWS"), Some("30"));
        assert_eq!(jit.value_of("INPUT_WIDTH_MOD_COLS_WI"), Some("2"));
    }

    #[test]
    fn opt_needs_aligned_rows_and_an_inline_function() {
        let odd_rows = relu(Datatype::F16, DataLayout::Bfyx, [7, 7, 3, 1]);
        assert!(!ActivationOpt.validate(&odd_rows, &OptionalParams::default()));

        let mut elu = relu(Datatype::F32, DataLayout::Bfyx, [7, 7, 3, 1]);
        assert!(ActivationOpt.validate(&elu, &OptionalParams::default()));
        elu.base.activation = ActivationFunction::Elu;
        assert!(!ActivationOpt.validate(&elu, &OptionalParams::default()));
        assert!(ActivationRef.validate(&elu, &OptionalParams::default()));

        let yxfb = relu(Datatype::F32, DataLayout::Yxfb, [8, 8, 3, 1]);
        assert!(!ActivationOpt.validate(&yxfb, &OptionalParams::default()));
    }

    #[test]
    fn reference_follows_the_physical_order() {
        let ctx = context();
        let params = relu(Datatype::F32, DataLayout::Yxfb, [13, 13, 256, 8]);
        let data = Activation(ActivationRef).kernels_data(&ctx, &Params::Activation(params), &OptionalParams::default());
        assert_eq!(data.len(), 1);
        assert_eq!(data[0].estimated_time, priority::DONT_USE_IF_HAVE_SOMETHING_ELSE);
        assert_eq!(data[0].kernels[0].work_groups.global, [8, 256, 169]);
    }
}
