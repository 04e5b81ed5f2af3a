//! Scalar enums shared by params, keys and jit generation.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! named_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub const fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

named_enum!(
    /// Element type of an activation tensor.
    Datatype { Int8 => "INT8", F16 => "F16", F32 => "F32" }
);

named_enum!(
    /// Element type of a weights tensor.
    WeightsType { Int8 => "INT8", F16 => "F16", F32 => "F32" }
);

named_enum!(
    /// Primitive family a params object or kernel belongs to.
    KernelType {
        Convolution => "convolution",
        Pooling => "pooling",
        FullyConnected => "fully_connected",
        Softmax => "softmax",
        Lrn => "lrn",
        Activation => "activation",
        Concatenation => "concatenation",
        ReorderWeights => "reorder_weights",
    }
);

named_enum!(
    ActivationFunction {
        None => "NONE",
        Logistic => "LOGISTIC",
        HyperbolicTan => "HYPERBOLIC_TAN",
        Relu => "RELU",
        ReluNegativeSlope => "RELU_NEGATIVE_SLOPE",
        Clamp => "CLAMP",
        Softrelu => "SOFTRELU",
        Abs => "ABS",
        Square => "SQUARE",
        Sqrt => "SQRT",
        Linear => "LINEAR",
        Elu => "ELU",
        Prelu => "PRELU",
    }
);

named_enum!(PoolType { Max => "MAX", Avg => "AVG" });

named_enum!(PoolRemainder { Floor => "FLOOR", Ceil => "CEIL" });

named_enum!(KernelDividerMode { Fixed => "FIXED", Dynamic => "DYNAMIC" });

named_enum!(LrnMode { AcrossChannel => "ACROSS_CHANNEL", WithinChannel => "WITHIN_CHANNEL" });

named_enum!(NormalizeMode { AcrossSpatial => "ACROSS_SPATIAL", WithinSpatial => "WITHIN_SPATIAL" });

named_enum!(SoftmaxDim { X => "X", Y => "Y", Feature => "FEATURE" });

named_enum!(ConcatAxis { X => "X", Y => "Y", Feature => "FEATURE", Batch => "BATCH" });

impl Datatype {
    /// OpenCL C spelling of the element type.
    pub const fn cl_type(self) -> &'static str {
        match self {
            Datatype::Int8 => "char",
            Datatype::F16 => "half",
            Datatype::F32 => "float",
        }
    }

    pub const fn size_in_bytes(self) -> usize {
        match self {
            Datatype::Int8 => 1,
            Datatype::F16 => 2,
            Datatype::F32 => 4,
        }
    }
}

impl WeightsType {
    pub const fn cl_type(self) -> &'static str {
        match self {
            WeightsType::Int8 => "char",
            WeightsType::F16 => "half",
            WeightsType::F32 => "float",
        }
    }

    pub const fn size_in_bytes(self) -> usize {
        match self {
            WeightsType::Int8 => 1,
            WeightsType::F16 => 2,
            WeightsType::F32 => 4,
        }
    }
}

impl From<Datatype> for WeightsType {
    fn from(value: Datatype) -> Self {
        match value {
            Datatype::Int8 => WeightsType::Int8,
            Datatype::F16 => WeightsType::F16,
            Datatype::F32 => WeightsType::F32,
        }
    }
}

/// Two-dimensional size used for filters, strides, padding and dilation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size2 {
    pub x: usize,
    pub y: usize,
}

impl Size2 {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    pub const fn splat(v: usize) -> Self {
        Self { x: v, y: v }
    }
}

/// Numeric parameters of the fused activation (`m`, `n`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NonLinearParams {
    pub m: f32,
    pub n: f32,
}

impl NonLinearParams {
    pub const fn new(m: f32, n: f32) -> Self {
        Self { m, n }
    }
}

/// Round `v` up to the next multiple of `a`.
pub const fn align(v: usize, a: usize) -> usize {
    if a == 0 { v } else { v.div_ceil(a) * a }
}

pub const fn ceil_div(v: usize, d: usize) -> usize {
    if d == 0 { 0 } else { v.div_ceil(d) }
}
