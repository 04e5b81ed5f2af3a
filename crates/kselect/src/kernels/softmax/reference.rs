use super::{SoftmaxDispatch, SoftmaxKernel, default_dispatch, softmax_jit};
use crate::{
    context::EngineInfo, dispatch::optimal_lws, jit::JitConstants, kernels::KernelId, params::{OptionalParams, SoftmaxParams}, params_key::ParamsKey, tensor::DataLayout, types::{ActivationFunction, Datatype, SoftmaxDim}
};

/// One work item per class vector along any softmax dimension.
#[derive(Clone, Copy, Debug, Default)]
pub struct SoftmaxRef;

/// Pitch macro names for the two dimensions a class vector does not span,
/// then the class dimension and its extent.
fn class_axes(dim: SoftmaxDim) -> [&'static str; 4] {
    match dim {
        SoftmaxDim::X => ["Y_PITCH", "FEATURE_PITCH", "X_PITCH", "SIZE_X"],
        SoftmaxDim::Y => ["X_PITCH", "FEATURE_PITCH", "Y_PITCH", "SIZE_Y"],
        SoftmaxDim::Feature => ["X_PITCH", "Y_PITCH", "FEATURE_PITCH", "FEATURE_NUM"],
    }
}

impl SoftmaxKernel for SoftmaxRef {
    const ID: KernelId = KernelId::SoftmaxRef;

    fn supported_key(&self) -> ParamsKey {
        let mut k = ParamsKey::new();
        for dtype in [Datatype::F16, Datatype::F32] {
            k.enable_input_data_type(dtype).enable_output_data_type(dtype);
        }
        for layout in [DataLayout::Bfyx, DataLayout::Yxfb, DataLayout::Bf, DataLayout::Fb] {
            k.enable_input_layout(layout).enable_output_layout(layout);
        }
        for &dim in SoftmaxDim::ALL {
            k.enable_softmax_dim(dim);
        }
        k.enable_tensor_offset().enable_tensor_pitches().enable_batching();
        k
    }

    fn validate(&self, params: &SoftmaxParams, _options: &OptionalParams) -> bool {
        params.base.activation == ActivationFunction::None
    }

    fn set_default(&self, params: &SoftmaxParams, _options: &OptionalParams) -> Option<SoftmaxDispatch> {
        let mut dispatch = default_dispatch(params, Self::ID.priority());
        let output = &params.base.output;
        let (x, y, f, b) = (output.x().v, output.y().v, output.feature().v, output.batch().v);
        let global = match params.dim {
            SoftmaxDim::X => [y, f, b],
            SoftmaxDim::Y => [x, f, b],
            SoftmaxDim::Feature => [x, y, b],
        };
        dispatch.base.work_groups.global = global;
        dispatch.base.work_groups.local = optimal_lws(global);
        Some(dispatch)
    }

    fn jit_constants(&self, engine: &EngineInfo, params: &SoftmaxParams, dispatch: &SoftmaxDispatch) -> JitConstants {
        let mut jit = softmax_jit(engine, params, dispatch);
        let [other0, other1, class, class_num] = class_axes(params.dim);
        jit.define("INPUT0_OTHER0_PITCH", format!("INPUT0_{other0}"))
            .define("INPUT0_OTHER1_PITCH", format!("INPUT0_{other1}"))
            .define("INPUT0_CLASS_PITCH", format!("INPUT0_{class}"))
            .define("INPUT0_CLASS_NUM", format!("INPUT0_{class_num}"))
            .define("OUTPUT_OTHER0_PITCH", format!("OUTPUT_{other0}"))
            .define("OUTPUT_OTHER1_PITCH", format!("OUTPUT_{other1}"))
            .define("OUTPUT_CLASS_PITCH", format!("OUTPUT_{class}"));
        if params.base.output.dtype == Datatype::F16 {
            jit.define("ACCUMULATOR_TYPE", "half");
        }
        jit
    }
}
