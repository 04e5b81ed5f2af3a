use std::fmt;

use super::{BaseParams, WeightBiasParams};
use crate::{
    params_key::ParamsKey, tensor::{DataTensor, Layout, WeightsTensor}, types::{ConcatAxis, KernelDividerMode, LrnMode, PoolRemainder, PoolType, Size2, SoftmaxDim}
};

#[derive(Clone, Debug, PartialEq)]
pub struct ConvolutionParams {
    pub weight_bias: WeightBiasParams,
    pub filter_size: Size2,
    pub stride: Size2,
    pub padding: Size2,
    pub dilation: Size2,
    /// Number of independent filter groups.
    pub split: usize,
}

impl ConvolutionParams {
    /// Unit stride and dilation, no padding, single group. The filter size
    /// comes from the weights.
    pub fn new(input: DataTensor, output: DataTensor, weights: WeightsTensor, bias: Option<DataTensor>) -> Self {
        let filter_size = Size2::new(weights.x().v, weights.y().v);
        Self {
            weight_bias: WeightBiasParams {
                base: BaseParams::new(input, output),
                weights,
                bias,
            },
            filter_size,
            stride: Size2::splat(1),
            padding: Size2::splat(0),
            dilation: Size2::splat(1),
            split: 1,
        }
    }

    pub fn base(&self) -> &BaseParams {
        &self.weight_bias.base
    }

    pub fn base_mut(&mut self) -> &mut BaseParams {
        &mut self.weight_bias.base
    }

    pub fn input(&self) -> &DataTensor {
        self.weight_bias.base.input()
    }

    pub fn output(&self) -> &DataTensor {
        &self.weight_bias.base.output
    }

    pub fn weights(&self) -> &WeightsTensor {
        &self.weight_bias.weights
    }

    pub fn bias(&self) -> Option<&DataTensor> {
        self.weight_bias.bias.as_ref()
    }

    pub fn params_key(&self) -> ParamsKey {
        let mut key = self.weight_bias.params_key();
        if self.split > 1 {
            key.enable_split_support();
        }
        if self.dilation != Size2::splat(1) {
            key.enable_dilation();
        }
        key
    }
}

impl fmt::Display for ConvolutionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_", self.base(), self.weights().layout.as_str().to_ascii_uppercase())?;
        match self.bias() {
            Some(bias) => write!(f, "{}_", bias.layout.as_str().to_ascii_uppercase())?,
            None => f.write_str("nobias_")?,
        }
        write!(
            f,
            "{}_{}_{}_{}_{}_{}_{}_{}",
            self.filter_size.x,
            self.filter_size.y,
            self.padding.x,
            self.padding.y,
            self.stride.x,
            self.stride.y,
            self.dilation.x,
            self.dilation.y
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PoolingParams {
    pub base: BaseParams,
    pub pool_type: PoolType,
    pub remainder: PoolRemainder,
    pub divider_mode: KernelDividerMode,
    pub pool_size: Size2,
    pub stride: Size2,
    pub padding: Size2,
}

impl PoolingParams {
    pub fn new(input: DataTensor, output: DataTensor) -> Self {
        Self {
            base: BaseParams::new(input, output),
            pool_type: PoolType::Max,
            remainder: PoolRemainder::Floor,
            divider_mode: KernelDividerMode::Fixed,
            pool_size: Size2::splat(1),
            stride: Size2::splat(1),
            padding: Size2::splat(0),
        }
    }

    pub fn params_key(&self) -> ParamsKey {
        let mut key = self.base.params_key();
        key.enable_pool_type(self.pool_type)
            .enable_pool_remainder(self.remainder)
            .enable_pool_kernel_divider_mode(self.divider_mode);
        key
    }
}

impl fmt::Display for PoolingParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}_{}_{}_{}_{}_{}_{}",
            self.base,
            self.pool_type,
            self.remainder,
            self.divider_mode,
            self.pool_size.x,
            self.pool_size.y,
            self.padding.x,
            self.padding.y,
            self.stride.x,
            self.stride.y
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FullyConnectedParams {
    pub weight_bias: WeightBiasParams,
}

impl FullyConnectedParams {
    pub fn new(input: DataTensor, output: DataTensor, weights: WeightsTensor, bias: Option<DataTensor>) -> Self {
        Self {
            weight_bias: WeightBiasParams {
                base: BaseParams::new(input, output),
                weights,
                bias,
            },
        }
    }

    pub fn base(&self) -> &BaseParams {
        &self.weight_bias.base
    }

    pub fn input(&self) -> &DataTensor {
        self.weight_bias.base.input()
    }

    pub fn output(&self) -> &DataTensor {
        &self.weight_bias.base.output
    }

    pub fn weights(&self) -> &WeightsTensor {
        &self.weight_bias.weights
    }

    pub fn params_key(&self) -> ParamsKey {
        self.weight_bias.params_key()
    }
}

impl fmt::Display for FullyConnectedParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_", self.base(), self.weights().layout.as_str().to_ascii_uppercase())?;
        match &self.weight_bias.bias {
            Some(bias) => f.write_str(&bias.layout.as_str().to_ascii_uppercase()),
            None => f.write_str("nobias"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SoftmaxParams {
    pub base: BaseParams,
    pub dim: SoftmaxDim,
}

impl SoftmaxParams {
    pub fn new(input: DataTensor, output: DataTensor, dim: SoftmaxDim) -> Self {
        Self {
            base: BaseParams::new(input, output),
            dim,
        }
    }

    pub fn params_key(&self) -> ParamsKey {
        let mut key = self.base.params_key();
        key.enable_softmax_dim(self.dim);
        key
    }
}

impl fmt::Display for SoftmaxParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.base, self.dim)
    }
}

/// Local response normalization.
#[derive(Clone, Debug, PartialEq)]
pub struct LrnParams {
    pub base: BaseParams,
    pub mode: LrnMode,
    pub divider_mode: KernelDividerMode,
    pub alpha: f32,
    pub beta: f32,
    pub k: f32,
    pub local_size: usize,
}

impl LrnParams {
    pub fn new(input: DataTensor, output: DataTensor, mode: LrnMode, local_size: usize) -> Self {
        Self {
            base: BaseParams::new(input, output),
            mode,
            divider_mode: KernelDividerMode::Fixed,
            alpha: 1e-4,
            beta: 0.75,
            k: 1.0,
            local_size,
        }
    }

    pub fn params_key(&self) -> ParamsKey {
        let mut key = self.base.params_key();
        key.enable_lrn_mode(self.mode).enable_lrn_kernel_divider_mode(self.divider_mode);
        key
    }
}

impl fmt::Display for LrnParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}_{}_{}_{}",
            self.base, self.mode, self.divider_mode, self.local_size, self.alpha, self.beta, self.k
        )
    }
}

/// Standalone activation; the function lives in the base params.
#[derive(Clone, Debug, PartialEq)]
pub struct ActivationParams {
    pub base: BaseParams,
}

impl ActivationParams {
    pub fn new(input: DataTensor, output: DataTensor) -> Self {
        Self {
            base: BaseParams::new(input, output),
        }
    }

    pub fn params_key(&self) -> ParamsKey {
        self.base.params_key()
    }
}

impl fmt::Display for ActivationParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.base.fmt(f)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConcatenationParams {
    pub base: BaseParams,
    pub axis: ConcatAxis,
}

impl ConcatenationParams {
    /// `inputs` must hold at least one tensor; returns `None` otherwise.
    pub fn new(inputs: Vec<DataTensor>, output: DataTensor, axis: ConcatAxis) -> Option<Self> {
        let mut inputs = inputs.into_iter();
        let mut base = BaseParams::new(inputs.next()?, output);
        for input in inputs {
            base.push_input(input);
        }
        Some(Self { base, axis })
    }

    pub fn params_key(&self) -> ParamsKey {
        let mut key = self.base.params_key();
        key.enable_concat_axis(self.axis);
        key
    }
}

impl fmt::Display for ConcatenationParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.base, self.axis, self.base.inputs().len())
    }
}

/// Move weights from one layout or element type to another.
#[derive(Clone, Debug, PartialEq)]
pub struct ReorderWeightsParams {
    pub layer_id: String,
    pub input: WeightsTensor,
    pub output: WeightsTensor,
}

impl ReorderWeightsParams {
    pub fn new(input: WeightsTensor, output: WeightsTensor) -> Self {
        Self {
            layer_id: String::new(),
            input,
            output,
        }
    }

    pub fn params_key(&self) -> ParamsKey {
        let mut key = ParamsKey::new();
        key.enable_input_weights_type(self.input.dtype)
            .enable_output_weights_type(self.output.dtype)
            .enable_input_weights_layout(self.input.layout)
            .enable_output_weights_layout(self.output.layout);
        if self.input.padding_exists() || self.output.padding_exists() {
            key.enable_tensor_pitches();
        }
        if self.input.offset != 0 || self.output.offset != 0 {
            key.enable_tensor_offset();
        }
        key
    }
}

impl fmt::Display for ReorderWeightsParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}_{}_{}_{}_{}",
            self.input.dtype,
            self.input.layout.as_str().to_ascii_uppercase(),
            self.output.dtype,
            self.output.layout.as_str().to_ascii_uppercase(),
            self.input.x().v,
            self.input.y().v,
            self.input.ifm().v,
            self.input.ofm().v
        )
    }
}
