//! Typed request descriptions and the keys and signatures derived from them.

mod primitives;

use std::fmt;

use smallvec::{SmallVec, smallvec};

pub use primitives::{
    ActivationParams, ConcatenationParams, ConvolutionParams, FullyConnectedParams, LrnParams, PoolingParams, ReorderWeightsParams, SoftmaxParams
};

use crate::{
    context::EngineInfo, params_key::ParamsKey, tensor::{DataLayout, DataTensor, Layout, WeightsTensor}, types::{ActivationFunction, KernelType, NonLinearParams}
};

/// Fields every activation-tensor primitive carries.
#[derive(Clone, Debug, PartialEq)]
pub struct BaseParams {
    pub layer_id: String,
    pub activation: ActivationFunction,
    pub nl_params: NonLinearParams,
    inputs: SmallVec<[DataTensor; 1]>,
    pub output: DataTensor,
}

impl BaseParams {
    pub fn new(input: DataTensor, output: DataTensor) -> Self {
        Self {
            layer_id: String::new(),
            activation: ActivationFunction::None,
            nl_params: NonLinearParams::default(),
            inputs: smallvec![input],
            output,
        }
    }

    pub fn with_layer_id(mut self, layer_id: impl Into<String>) -> Self {
        self.layer_id = layer_id.into();
        self
    }

    pub fn with_activation(mut self, activation: ActivationFunction, nl_params: NonLinearParams) -> Self {
        self.activation = activation;
        self.nl_params = nl_params;
        self
    }

    /// First input. Every base params value holds at least one.
    pub fn input(&self) -> &DataTensor {
        &self.inputs[0]
    }

    pub fn input_mut(&mut self) -> &mut DataTensor {
        &mut self.inputs[0]
    }

    pub fn inputs(&self) -> &[DataTensor] {
        &self.inputs
    }

    pub fn push_input(&mut self, input: DataTensor) {
        self.inputs.push(input);
    }

    pub fn params_key(&self) -> ParamsKey {
        let mut key = ParamsKey::new();
        let (mut batching, mut pitches, mut offsets, mut different_types) = (false, false, false, false);
        for input in &self.inputs {
            key.enable_input_data_type(input.dtype).enable_input_layout(input.layout);
            batching |= input.batch().v > 1;
            pitches |= input.padding_exists();
            offsets |= input.offset != 0;
            different_types |= input.dtype != self.output.dtype;
        }
        key.enable_output_data_type(self.output.dtype).enable_output_layout(self.output.layout);
        if batching {
            key.enable_batching();
        }
        if pitches || self.output.padding_exists() {
            key.enable_tensor_pitches();
        }
        if different_types {
            key.enable_different_types();
        }
        if offsets || self.output.offset != 0 {
            key.enable_tensor_offset();
        }
        key.enable_activation(self.activation);
        key
    }
}

/// Logical sizes only; pitches and offsets do not take part.
impl fmt::Display for BaseParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (input, output) = (self.input(), &self.output);
        write!(
            f,
            "{}_{}_{}_{}_{}_{}_",
            input.dtype,
            input.layout.as_str().to_ascii_uppercase(),
            output.layout.as_str().to_ascii_uppercase(),
            self.activation,
            self.nl_params.m,
            self.nl_params.n,
        )?;
        write!(f, "{}_{}_{}_{}_", input.x().v, input.y().v, input.feature().v, input.batch().v)?;
        write!(f, "{}_{}_{}_{}", output.x().v, output.y().v, output.feature().v, output.batch().v)
    }
}

/// Base params plus filter weights and an optional bias.
#[derive(Clone, Debug, PartialEq)]
pub struct WeightBiasParams {
    pub base: BaseParams,
    pub weights: WeightsTensor,
    pub bias: Option<DataTensor>,
}

impl WeightBiasParams {
    pub fn params_key(&self) -> ParamsKey {
        let mut key = self.base.params_key();
        key.enable_input_weights_type(self.weights.dtype);
        match &self.bias {
            None => {
                key.enable_non_bias_term();
            }
            Some(bias) if matches!(bias.layout, DataLayout::Bf | DataLayout::Fb) => {
                key.enable_bias_per_feature();
            }
            Some(bias) if bias.layout == self.base.output.layout => {
                key.enable_bias_per_output();
            }
            Some(_) => {}
        }
        key
    }
}

/// Correctness-neutral tuning hints folded into the matched key.
#[derive(Clone, Debug, PartialEq)]
pub struct OptionalParams {
    pub input_layouts: Vec<DataLayout>,
    pub output_layouts: Vec<DataLayout>,
    pub support_subgroups: bool,
    pub max_work_group_size: usize,
    pub max_local_mem_size: usize,
    pub allow_weights_reorder: bool,
    /// Kernels may assume the caller pads the input as they request.
    pub allow_padding: bool,
    pub allow_reorder_input: bool,
    /// Concatenation: one kernel per input rather than a single kernel.
    pub kernel_per_input: bool,
}

impl Default for OptionalParams {
    fn default() -> Self {
        Self {
            input_layouts: Vec::new(),
            output_layouts: Vec::new(),
            support_subgroups: false,
            max_work_group_size: 1,
            max_local_mem_size: 16 * 1024 * 1024,
            allow_weights_reorder: true,
            allow_padding: false,
            allow_reorder_input: false,
            kernel_per_input: true,
        }
    }
}

impl OptionalParams {
    /// Hints matching what `engine` can do.
    pub fn for_engine(engine: &EngineInfo) -> Self {
        Self {
            support_subgroups: engine.supports_subgroups,
            max_work_group_size: engine.max_work_group_size,
            max_local_mem_size: engine.max_local_mem_size,
            ..Self::default()
        }
    }

    /// Key contribution of the hints for a `family` request.
    pub fn params_key(&self, family: KernelType) -> ParamsKey {
        let mut key = ParamsKey::new();
        for &layout in &self.input_layouts {
            key.enable_input_layout(layout);
        }
        for &layout in &self.output_layouts {
            key.enable_output_layout(layout);
        }
        if self.support_subgroups {
            key.enable_subgroups();
        }
        if family == KernelType::Concatenation {
            if self.kernel_per_input {
                key.enable_concat_kernel_per_input();
            } else {
                key.enable_concat_one_kernel();
            }
        }
        key
    }
}

/// A request for one primitive invocation.
#[derive(Clone, Debug, PartialEq)]
pub enum Params {
    Convolution(ConvolutionParams),
    Pooling(PoolingParams),
    FullyConnected(FullyConnectedParams),
    Softmax(SoftmaxParams),
    Lrn(LrnParams),
    Activation(ActivationParams),
    Concatenation(ConcatenationParams),
    ReorderWeights(ReorderWeightsParams),
}

impl Params {
    pub fn kernel_type(&self) -> KernelType {
        match self {
            Params::Convolution(_) => KernelType::Convolution,
            Params::Pooling(_) => KernelType::Pooling,
            Params::FullyConnected(_) => KernelType::FullyConnected,
            Params::Softmax(_) => KernelType::Softmax,
            Params::Lrn(_) => KernelType::Lrn,
            Params::Activation(_) => KernelType::Activation,
            Params::Concatenation(_) => KernelType::Concatenation,
            Params::ReorderWeights(_) => KernelType::ReorderWeights,
        }
    }

    pub fn params_key(&self) -> ParamsKey {
        match self {
            Params::Convolution(p) => p.params_key(),
            Params::Pooling(p) => p.params_key(),
            Params::FullyConnected(p) => p.params_key(),
            Params::Softmax(p) => p.params_key(),
            Params::Lrn(p) => p.params_key(),
            Params::Activation(p) => p.params_key(),
            Params::Concatenation(p) => p.params_key(),
            Params::ReorderWeights(p) => p.params_key(),
        }
    }

    /// Activation-tensor fields, absent for weights reorders.
    pub fn base(&self) -> Option<&BaseParams> {
        match self {
            Params::Convolution(p) => Some(&p.weight_bias.base),
            Params::Pooling(p) => Some(&p.base),
            Params::FullyConnected(p) => Some(&p.weight_bias.base),
            Params::Softmax(p) => Some(&p.base),
            Params::Lrn(p) => Some(&p.base),
            Params::Activation(p) => Some(&p.base),
            Params::Concatenation(p) => Some(&p.base),
            Params::ReorderWeights(_) => None,
        }
    }

    pub fn layer_id(&self) -> &str {
        match self {
            Params::ReorderWeights(p) => &p.layer_id,
            other => other.base().map(|b| b.layer_id.as_str()).unwrap_or_default(),
        }
    }
}

/// Canonical signature; hashed for cost table lookups.
impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Params::Convolution(p) => p.fmt(f),
            Params::Pooling(p) => p.fmt(f),
            Params::FullyConnected(p) => p.fmt(f),
            Params::Softmax(p) => p.fmt(f),
            Params::Lrn(p) => p.fmt(f),
            Params::Activation(p) => p.fmt(f),
            Params::Concatenation(p) => p.fmt(f),
            Params::ReorderWeights(p) => p.fmt(f),
        }
    }
}

macro_rules! impl_from_params {
    ($($variant:ident($ty:ty)),+ $(,)?) => {
        $(impl From<$ty> for Params {
            fn from(value: $ty) -> Self {
                Params::$variant(value)
            }
        })+
    };
}

impl_from_params!(
    Convolution(ConvolutionParams),
    Pooling(PoolingParams),
    FullyConnected(FullyConnectedParams),
    Softmax(SoftmaxParams),
    Lrn(LrnParams),
    Activation(ActivationParams),
    Concatenation(ConcatenationParams),
    ReorderWeights(ReorderWeightsParams),
);

#[path = "params.test.rs"]
mod tests;
