//! Capability/requirement key matching kernels against requests.
//!
//! A kernel advertises the union of everything it can serve; a request
//! carries exactly what it needs. [`ParamsKey::support`] is asymmetric:
//! restriction bits must be a superset, layouts only need to overlap.

use crate::{
    tensor::{DataLayout, Layout, WeightsLayout},
    types::{ActivationFunction, ConcatAxis, Datatype, KernelDividerMode, LrnMode, NormalizeMode, PoolRemainder, PoolType, SoftmaxDim, WeightsType},
};

/// Named bits of [`ParamsKey::restrict`]. Every family owns its own range.
pub mod restrict {
    pub const INPUT_F16: u64 = 1 << 0;
    pub const INPUT_F32: u64 = 1 << 1;
    pub const INPUT_INT8: u64 = 1 << 2;
    pub const OUTPUT_F16: u64 = 1 << 3;
    pub const OUTPUT_F32: u64 = 1 << 4;
    pub const OUTPUT_INT8: u64 = 1 << 5;
    pub const INPUT_WEIGHTS_F16: u64 = 1 << 6;
    pub const INPUT_WEIGHTS_F32: u64 = 1 << 7;
    pub const INPUT_WEIGHTS_INT8: u64 = 1 << 8;
    pub const OUTPUT_WEIGHTS_F16: u64 = 1 << 9;
    pub const OUTPUT_WEIGHTS_F32: u64 = 1 << 10;
    pub const OUTPUT_WEIGHTS_INT8: u64 = 1 << 11;
    pub const DIFFERENT_TYPES: u64 = 1 << 12;
    pub const TENSOR_OFFSET: u64 = 1 << 13;
    pub const TENSOR_PITCHES: u64 = 1 << 14;
    pub const BATCHING: u64 = 1 << 15;
    pub const BIAS_PER_FEATURE_MAP: u64 = 1 << 16;
    pub const BIAS_PER_OUTPUT: u64 = 1 << 17;
    pub const NON_BIAS: u64 = 1 << 18;
    pub const ACTIVATION_PRELU: u64 = 1 << 19;

    pub const POOL_MAX: u64 = 1 << 20;
    pub const POOL_AVG: u64 = 1 << 21;
    pub const POOL_REMAINDER_FLOOR: u64 = 1 << 22;
    pub const POOL_REMAINDER_CEIL: u64 = 1 << 23;
    pub const POOL_DIVIDER_FIXED: u64 = 1 << 24;
    pub const POOL_DIVIDER_DYNAMIC: u64 = 1 << 25;

    pub const LRN_ACROSS_CHANNEL: u64 = 1 << 26;
    pub const LRN_WITHIN_CHANNEL: u64 = 1 << 27;
    pub const LRN_DIVIDER_FIXED: u64 = 1 << 28;
    pub const LRN_DIVIDER_DYNAMIC: u64 = 1 << 29;

    pub const NORMALIZE_ACROSS_SPATIAL: u64 = 1 << 30;
    pub const NORMALIZE_WITHIN_SPATIAL: u64 = 1 << 31;

    pub const CONV_SPLIT: u64 = 1 << 32;
    pub const CONV_DILATION: u64 = 1 << 33;

    pub const SOFTMAX_DIM_X: u64 = 1 << 34;
    pub const SOFTMAX_DIM_Y: u64 = 1 << 35;
    pub const SOFTMAX_DIM_FEATURE: u64 = 1 << 36;

    pub const CONCAT_AXIS_X: u64 = 1 << 37;
    pub const CONCAT_AXIS_Y: u64 = 1 << 38;
    pub const CONCAT_AXIS_FEATURE: u64 = 1 << 39;
    pub const CONCAT_AXIS_BATCH: u64 = 1 << 40;
    pub const CONCAT_KERNEL_PER_INPUT: u64 = 1 << 41;
    pub const CONCAT_ONE_KERNEL: u64 = 1 << 42;
}

/// Named bits of [`ParamsKey::machine`].
pub mod machine {
    pub const SUBGROUP: u32 = 1 << 0;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ParamsKey {
    pub restrict: u64,
    pub machine: u32,
    pub input_layout: u32,
    pub output_layout: u32,
    pub input_weights_layout: u32,
    pub output_weights_layout: u32,
    pub num_dims: u32,
}

impl ParamsKey {
    pub const fn new() -> Self {
        Self {
            restrict: 0,
            machine: 0,
            input_layout: 0,
            output_layout: 0,
            input_weights_layout: 0,
            output_weights_layout: 0,
            num_dims: 0,
        }
    }

    fn set(&mut self, bits: u64) -> &mut Self {
        self.restrict |= bits;
        self
    }

    pub fn enable_input_data_type(&mut self, dt: Datatype) -> &mut Self {
        self.set(match dt {
            Datatype::F16 => restrict::INPUT_F16,
            Datatype::F32 => restrict::INPUT_F32,
            Datatype::Int8 => restrict::INPUT_INT8,
        })
    }

    pub fn enable_all_input_data_types(&mut self) -> &mut Self {
        self.set(restrict::INPUT_F16 | restrict::INPUT_F32 | restrict::INPUT_INT8)
    }

    pub fn enable_output_data_type(&mut self, dt: Datatype) -> &mut Self {
        self.set(match dt {
            Datatype::F16 => restrict::OUTPUT_F16,
            Datatype::F32 => restrict::OUTPUT_F32,
            Datatype::Int8 => restrict::OUTPUT_INT8,
        })
    }

    pub fn enable_all_output_data_types(&mut self) -> &mut Self {
        self.set(restrict::OUTPUT_F16 | restrict::OUTPUT_F32 | restrict::OUTPUT_INT8)
    }

    pub fn enable_input_weights_type(&mut self, wt: WeightsType) -> &mut Self {
        self.set(match wt {
            WeightsType::F16 => restrict::INPUT_WEIGHTS_F16,
            WeightsType::F32 => restrict::INPUT_WEIGHTS_F32,
            WeightsType::Int8 => restrict::INPUT_WEIGHTS_INT8,
        })
    }

    pub fn enable_output_weights_type(&mut self, wt: WeightsType) -> &mut Self {
        self.set(match wt {
            WeightsType::F16 => restrict::OUTPUT_WEIGHTS_F16,
            WeightsType::F32 => restrict::OUTPUT_WEIGHTS_F32,
            WeightsType::Int8 => restrict::OUTPUT_WEIGHTS_INT8,
        })
    }

    pub fn enable_different_types(&mut self) -> &mut Self {
        self.set(restrict::DIFFERENT_TYPES)
    }

    pub fn enable_input_layout(&mut self, l: DataLayout) -> &mut Self {
        self.input_layout |= 1 << l.bit();
        self.raise_num_dims(l.channels_count())
    }

    pub fn enable_all_input_layouts(&mut self) -> &mut Self {
        for &l in DataLayout::ALL {
            self.enable_input_layout(l);
        }
        self
    }

    pub fn enable_output_layout(&mut self, l: DataLayout) -> &mut Self {
        self.output_layout |= 1 << l.bit();
        self.raise_num_dims(l.channels_count())
    }

    pub fn enable_all_output_layouts(&mut self) -> &mut Self {
        for &l in DataLayout::ALL {
            self.enable_output_layout(l);
        }
        self
    }

    pub fn enable_input_weights_layout(&mut self, l: WeightsLayout) -> &mut Self {
        self.input_weights_layout |= 1 << l.bit();
        self
    }

    pub fn enable_all_input_weights_layouts(&mut self) -> &mut Self {
        for &l in WeightsLayout::ALL {
            self.enable_input_weights_layout(l);
        }
        self
    }

    pub fn enable_output_weights_layout(&mut self, l: WeightsLayout) -> &mut Self {
        self.output_weights_layout |= 1 << l.bit();
        self
    }

    pub fn enable_all_output_weights_layouts(&mut self) -> &mut Self {
        for &l in WeightsLayout::ALL {
            self.enable_output_weights_layout(l);
        }
        self
    }

    fn raise_num_dims(&mut self, dims: usize) -> &mut Self {
        self.num_dims = self.num_dims.max(dims as u32);
        self
    }

    pub fn set_num_dims(&mut self, dims: u32) -> &mut Self {
        self.num_dims = dims;
        self
    }

    pub fn enable_tensor_offset(&mut self) -> &mut Self {
        self.set(restrict::TENSOR_OFFSET)
    }

    pub fn enable_tensor_pitches(&mut self) -> &mut Self {
        self.set(restrict::TENSOR_PITCHES)
    }

    pub fn enable_batching(&mut self) -> &mut Self {
        self.set(restrict::BATCHING)
    }

    pub fn enable_subgroups(&mut self) -> &mut Self {
        self.machine |= machine::SUBGROUP;
        self
    }

    pub fn enable_bias_per_feature(&mut self) -> &mut Self {
        self.set(restrict::BIAS_PER_FEATURE_MAP)
    }

    pub fn enable_bias_per_output(&mut self) -> &mut Self {
        self.set(restrict::BIAS_PER_OUTPUT)
    }

    pub fn enable_non_bias_term(&mut self) -> &mut Self {
        self.set(restrict::NON_BIAS)
    }

    pub fn enable_activation(&mut self, f: ActivationFunction) -> &mut Self {
        if f == ActivationFunction::Prelu {
            self.set(restrict::ACTIVATION_PRELU);
        }
        self
    }

    pub fn enable_pool_type(&mut self, t: PoolType) -> &mut Self {
        self.set(match t {
            PoolType::Max => restrict::POOL_MAX,
            PoolType::Avg => restrict::POOL_AVG,
        })
    }

    pub fn enable_pool_remainder(&mut self, r: PoolRemainder) -> &mut Self {
        self.set(match r {
            PoolRemainder::Floor => restrict::POOL_REMAINDER_FLOOR,
            PoolRemainder::Ceil => restrict::POOL_REMAINDER_CEIL,
        })
    }

    pub fn enable_pool_kernel_divider_mode(&mut self, m: KernelDividerMode) -> &mut Self {
        self.set(match m {
            KernelDividerMode::Fixed => restrict::POOL_DIVIDER_FIXED,
            KernelDividerMode::Dynamic => restrict::POOL_DIVIDER_DYNAMIC,
        })
    }

    pub fn enable_lrn_mode(&mut self, m: LrnMode) -> &mut Self {
        self.set(match m {
            LrnMode::AcrossChannel => restrict::LRN_ACROSS_CHANNEL,
            LrnMode::WithinChannel => restrict::LRN_WITHIN_CHANNEL,
        })
    }

    pub fn enable_lrn_kernel_divider_mode(&mut self, m: KernelDividerMode) -> &mut Self {
        self.set(match m {
            KernelDividerMode::Fixed => restrict::LRN_DIVIDER_FIXED,
            KernelDividerMode::Dynamic => restrict::LRN_DIVIDER_DYNAMIC,
        })
    }

    pub fn enable_normalize_mode(&mut self, m: NormalizeMode) -> &mut Self {
        self.set(match m {
            NormalizeMode::AcrossSpatial => restrict::NORMALIZE_ACROSS_SPATIAL,
            NormalizeMode::WithinSpatial => restrict::NORMALIZE_WITHIN_SPATIAL,
        })
    }

    pub fn enable_split_support(&mut self) -> &mut Self {
        self.set(restrict::CONV_SPLIT)
    }

    pub fn enable_dilation(&mut self) -> &mut Self {
        self.set(restrict::CONV_DILATION)
    }

    pub fn enable_softmax_dim(&mut self, d: SoftmaxDim) -> &mut Self {
        self.set(match d {
            SoftmaxDim::X => restrict::SOFTMAX_DIM_X,
            SoftmaxDim::Y => restrict::SOFTMAX_DIM_Y,
            SoftmaxDim::Feature => restrict::SOFTMAX_DIM_FEATURE,
        })
    }

    pub fn enable_concat_axis(&mut self, a: ConcatAxis) -> &mut Self {
        self.set(match a {
            ConcatAxis::X => restrict::CONCAT_AXIS_X,
            ConcatAxis::Y => restrict::CONCAT_AXIS_Y,
            ConcatAxis::Feature => restrict::CONCAT_AXIS_FEATURE,
            ConcatAxis::Batch => restrict::CONCAT_AXIS_BATCH,
        })
    }

    pub fn enable_concat_kernel_per_input(&mut self) -> &mut Self {
        self.set(restrict::CONCAT_KERNEL_PER_INPUT)
    }

    pub fn enable_concat_one_kernel(&mut self) -> &mut Self {
        self.set(restrict::CONCAT_ONE_KERNEL)
    }

    /// Whether a kernel advertising `self` can serve `request`.
    ///
    /// Zero layout masks on either side of a data/weights pair never match,
    /// so an unconfigured key supports nothing.
    pub fn support(&self, request: &ParamsKey) -> bool {
        if self.restrict & request.restrict != request.restrict {
            return false;
        }
        if self.machine & request.machine != self.machine {
            return false;
        }
        if self.num_dims < request.num_dims {
            return false;
        }
        layouts_overlap(self.input_layout, request.input_layout, self.input_weights_layout, request.input_weights_layout)
            && layouts_overlap(self.output_layout, request.output_layout, self.output_weights_layout, request.output_weights_layout)
    }

    /// Union of both keys; symmetric.
    #[must_use]
    pub fn merge(&self, other: &ParamsKey) -> ParamsKey {
        ParamsKey {
            restrict: self.restrict | other.restrict,
            machine: self.machine | other.machine,
            input_layout: self.input_layout | other.input_layout,
            output_layout: self.output_layout | other.output_layout,
            input_weights_layout: self.input_weights_layout | other.input_weights_layout,
            output_weights_layout: self.output_weights_layout | other.output_weights_layout,
            num_dims: self.num_dims.max(other.num_dims),
        }
    }
}

fn layouts_overlap(supported_data: u32, requested_data: u32, supported_weights: u32, requested_weights: u32) -> bool {
    let data_ok = requested_data == 0 || supported_data & requested_data != 0;
    let weights_ok = requested_weights == 0 || supported_weights & requested_weights != 0;
    (requested_data | requested_weights) != 0 && data_ok && weights_ok
}

#[path = "params_key.test.rs"]
mod tests;
