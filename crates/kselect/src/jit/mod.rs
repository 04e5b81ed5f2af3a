//! Typed builder for the `#define` block prepended to every kernel template.

mod code_builder;
mod float;

pub use code_builder::CodeBuilder;

use std::fmt;

use crate::{
    tensor::{DataTensor, ElementType, Layout, Tensor, WeightsTensor, data_channel, weights_channel}, types::{ActivationFunction, ConcatAxis, KernelDividerMode, PoolType}
};

/// Maximum tensor rank spelled out in `*_SIZES` / `*_PITCHES` arrays.
pub const TENSOR_DIM_MAX: usize = 8;

/// Conversion of a host value into kernel source text.
pub trait JitValue {
    fn to_code_string(&self) -> String;
}

impl JitValue for bool {
    fn to_code_string(&self) -> String {
        if *self { "1".into() } else { "0".into() }
    }
}

macro_rules! integer_jit_value {
    ($($t:ty),+) => {
        $(impl JitValue for $t {
            fn to_code_string(&self) -> String {
                self.to_string()
            }
        })+
    };
}

integer_jit_value!(i32, i64, u32, u64, usize);

impl JitValue for f32 {
    fn to_code_string(&self) -> String {
        if self.is_infinite() {
            let sign = if self.is_sign_negative() { "-" } else { "" };
            return format!("{sign}INFINITY");
        }
        if self.is_nan() {
            return "NAN".into();
        }
        let wide = f64::from(*self);
        format!("{}f /*{}*/", float::hex_float(wide, 6), float::short_float(wide))
    }
}

impl JitValue for f64 {
    fn to_code_string(&self) -> String {
        if self.is_infinite() {
            let sign = if self.is_sign_negative() { "-" } else { "" };
            return format!("{sign}INFINITY");
        }
        if self.is_nan() {
            return "NAN".into();
        }
        format!("{} /*{}*/", float::hex_float(*self, 13), float::short_float(*self))
    }
}

impl JitValue for &str {
    fn to_code_string(&self) -> String {
        (*self).to_string()
    }
}

impl JitValue for String {
    fn to_code_string(&self) -> String {
        self.clone()
    }
}

#[derive(Clone, Debug, PartialEq)]
enum JitConstant {
    Value { name: String, value: String },
    Data { name: String, tensor: DataTensor },
    Weights { name: String, tensor: WeightsTensor },
}

fn size_array<L: Layout>(tensor: &Tensor<L>, pick: impl Fn(&crate::tensor::Dim) -> usize) -> String {
    let mut text = String::from("(size_t []){ ");
    for dim in &tensor.dims {
        text.push_str(&pick(dim).to_string());
        text.push(',');
    }
    for _ in tensor.dims.len()..TENSOR_DIM_MAX {
        text.push_str("1,");
    }
    text.push_str(" } ");
    text
}

fn tensor_tail<L: Layout>(name: &str, tensor: &Tensor<L>, out: &mut Vec<(String, String)>) {
    out.push((format!("{name}_SIMPLE"), tensor.simple_layout().to_code_string()));
    out.push((format!("TO_{name}_TYPE"), format!("convert_{}", tensor.dtype.cl_type())));
    out.push((format!("{name}_LAYOUT_{}", tensor.layout.as_str()), "1".into()));
    out.push((format!("{name}_SIZE"), tensor.dims.len().to_string()));
    out.push((format!("{name}_SIZES"), size_array(tensor, |d| d.v)));
    out.push((format!("{name}_PITCHES"), size_array(tensor, |d| d.pitch)));
}

fn tensor_head<L: Layout>(name: &str, tensor: &Tensor<L>, out: &mut Vec<(String, String)>) {
    out.push((format!("{name}_TYPE"), tensor.dtype.cl_type().into()));
    out.push((format!("{name}_OFFSET"), tensor.offset.to_string()));
    out.push((format!("{name}_LIMIT"), tensor.length_with_padding().to_string()));
    out.push((format!("{name}_DIMS"), tensor.dims.len().to_string()));
}

impl JitConstant {
    fn name(&self) -> &str {
        match self {
            JitConstant::Value { name, .. } | JitConstant::Data { name, .. } | JitConstant::Weights { name, .. } => name,
        }
    }

    fn definitions(&self, out: &mut Vec<(String, String)>) {
        match self {
            JitConstant::Value { name, value } => out.push((name.clone(), value.clone())),
            JitConstant::Data { name, tensor } => {
                tensor_head(name, tensor, out);
                let labels = [
                    ("SIZE_X", data_channel::X),
                    ("SIZE_Y", data_channel::Y),
                    ("FEATURE_NUM", data_channel::FEATURE),
                    ("BATCH_NUM", data_channel::BATCH),
                ];
                for (label, channel) in labels {
                    out.push((format!("{name}_{label}"), tensor.channel(channel).v.to_string()));
                }
                let pitches = [
                    ("X_PITCH", data_channel::X),
                    ("Y_PITCH", data_channel::Y),
                    ("FEATURE_PITCH", data_channel::FEATURE),
                    ("BATCH_PITCH", data_channel::BATCH),
                ];
                for (label, channel) in pitches {
                    out.push((format!("{name}_{label}"), tensor.channel(channel).pitch.to_string()));
                }
                tensor_tail(name, tensor, out);
            }
            JitConstant::Weights { name, tensor } => {
                tensor_head(name, tensor, out);
                let labels = [
                    ("SIZE_X", weights_channel::X),
                    ("SIZE_Y", weights_channel::Y),
                    ("IFM_NUM", weights_channel::IFM),
                    ("OFM_NUM", weights_channel::OFM),
                ];
                for (label, channel) in labels {
                    out.push((format!("{name}_{label}"), tensor.channel(channel).v.to_string()));
                }
                let pitches = [
                    ("X_PITCH", weights_channel::X),
                    ("Y_PITCH", weights_channel::Y),
                    ("IFM_PITCH", weights_channel::IFM),
                    ("OFM_PITCH", weights_channel::OFM),
                ];
                for (label, channel) in pitches {
                    out.push((format!("{name}_{label}"), tensor.channel(channel).pitch.to_string()));
                }
                tensor_tail(name, tensor, out);
            }
        }
    }
}

/// Ordered collection of named jit constants.
///
/// Every generated `#define` goes through this builder; call sites never
/// format macro text themselves.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JitConstants {
    constants: Vec<JitConstant>,
}

impl JitConstants {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, name: impl Into<String>, value: impl JitValue) -> &mut Self {
        self.constants.push(JitConstant::Value {
            name: name.into(),
            value: value.to_code_string(),
        });
        self
    }

    /// Empty marker macro, e.g. `ACROSS_CHANNEL`.
    pub fn define_flag(&mut self, name: impl fmt::Display) -> &mut Self {
        self.define(name.to_string(), "")
    }

    /// `ACTIVATION_FUNCTION_<F>` marker.
    pub fn define_activation(&mut self, function: ActivationFunction) -> &mut Self {
        self.define_flag(format_args!("ACTIVATION_FUNCTION_{function}"))
    }

    /// `<TYPE>_POOLING` marker.
    pub fn define_pool_type(&mut self, pool_type: PoolType) -> &mut Self {
        self.define_flag(format_args!("{pool_type}_POOLING"))
    }

    /// `<MODE>_KERNEL_DIVIDER` marker.
    pub fn define_kernel_divider(&mut self, mode: KernelDividerMode) -> &mut Self {
        self.define_flag(format_args!("{mode}_KERNEL_DIVIDER"))
    }

    /// `CONCAT_<AXIS>` set to 1.
    pub fn define_concat_axis(&mut self, axis: ConcatAxis) -> &mut Self {
        self.define(format!("CONCAT_{axis}"), 1)
    }

    /// `<PREFIX>_LAYOUT_<LAYOUT>` set to 1, layout name upper-cased.
    pub fn define_layout_flag<L: Layout>(&mut self, prefix: &str, layout: L) -> &mut Self {
        self.define(format!("{prefix}_LAYOUT_{}", layout.as_str().to_ascii_uppercase()), 1)
    }

    /// Expand `tensor` into the `NAME_*` family of size, pitch and type macros.
    pub fn define_data_tensor(&mut self, name: impl Into<String>, tensor: &DataTensor) -> &mut Self {
        self.constants.push(JitConstant::Data {
            name: name.into(),
            tensor: tensor.clone(),
        });
        self
    }

    pub fn define_weights_tensor(&mut self, name: impl Into<String>, tensor: &WeightsTensor) -> &mut Self {
        self.constants.push(JitConstant::Weights {
            name: name.into(),
            tensor: tensor.clone(),
        });
        self
    }

    pub fn extend(&mut self, other: JitConstants) -> &mut Self {
        self.constants.extend(other.constants);
        self
    }

    /// Drop every constant registered under `name`.
    pub fn remove(&mut self, name: &str) -> &mut Self {
        self.constants.retain(|c| c.name() != name);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constants.iter().any(|c| c.name() == name)
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }

    /// Flattened `(macro, value)` pairs in registration order.
    pub fn definitions(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for constant in &self.constants {
            constant.definitions(&mut out);
        }
        out
    }

    /// Value text of the plain constant `name`, if registered.
    pub fn value_of(&self, name: &str) -> Option<&str> {
        self.constants.iter().find_map(|c| match c {
            JitConstant::Value { name: n, value } if n == name => Some(value.as_str()),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        tensor::{DataLayout, WeightsLayout},
        types::{Datatype, WeightsType},
    };

    #[test]
    fn scalar_values_render_as_c_literals() {
        assert_eq!(true.to_code_string(), "1");
        assert_eq!(false.to_code_string(), "0");
        assert_eq!(42usize.to_code_string(), "42");
        assert_eq!((-7i32).to_code_string(), "-7");
        assert_eq!(1.0f32.to_code_string(), "0x1.000000p+0f /*1*/");
        assert_eq!(f32::NEG_INFINITY.to_code_string(), "-INFINITY");
        assert_eq!(0.0001f32.to_code_string(), "0x1.a36e2ep-14f /*0.0001*/");
    }

    #[test]
    fn data_tensor_expands_to_the_full_macro_family() {
        let t = DataTensor::with_sizes(Datatype::F16, DataLayout::Bfyx, 13, 13, 256, 1);
        let mut jit = JitConstants::new();
        jit.define_data_tensor("INPUT0", &t);
        let defs = jit.definitions();
        let lookup = |k: &str| defs.iter().find(|(n, _)| n == k).map(|(_, v)| v.as_str());

        assert_eq!(lookup("INPUT0_TYPE"), Some("half"));
        assert_eq!(lookup("INPUT0_LIMIT"), Some("43264"));
        assert_eq!(lookup("INPUT0_SIZE_X"), Some("13"));
        assert_eq!(lookup("INPUT0_FEATURE_NUM"), Some("256"));
        assert_eq!(lookup("INPUT0_Y_PITCH"), Some("13"));
        assert_eq!(lookup("INPUT0_BATCH_PITCH"), Some("43264"));
        assert_eq!(lookup("INPUT0_SIMPLE"), Some("1"));
        assert_eq!(lookup("TO_INPUT0_TYPE"), Some("convert_half"));
        assert_eq!(lookup("INPUT0_LAYOUT_bfyx"), Some("1"));
        assert_eq!(lookup("INPUT0_SIZE"), Some("4"));
        assert_eq!(lookup("INPUT0_SIZES"), Some("(size_t []){ 13,13,256,1,1,1,1,1, } "));
        assert_eq!(lookup("INPUT0_PITCHES"), Some("(size_t []){ 1,13,169,43264,1,1,1,1, } "));
    }

    #[test]
    fn weights_tensor_uses_ifm_and_ofm_names() {
        let w = WeightsTensor::with_sizes(WeightsType::F32, WeightsLayout::Yxio, 3, 3, 8, 16);
        let mut jit = JitConstants::new();
        jit.define_weights_tensor("FILTER", &w);
        let defs = jit.definitions();
        assert!(defs.contains(&("FILTER_OFM_PITCH".to_string(), "1".to_string())));
        assert!(defs.contains(&("FILTER_IFM_PITCH".to_string(), "16".to_string())));
        assert!(defs.contains(&("FILTER_LAYOUT_yxio".to_string(), "1".to_string())));
        assert!(!defs.iter().any(|(n, _)| n == "FILTER_FEATURE_NUM"));
    }

    #[test]
    fn enum_markers_use_one_spelling() {
        let mut jit = JitConstants::new();
        jit.define_activation(ActivationFunction::Relu)
            .define_pool_type(PoolType::Max)
            .define_kernel_divider(KernelDividerMode::Fixed)
            .define_concat_axis(ConcatAxis::Feature)
            .define_layout_flag("OUTPUT", WeightsLayout::OsIyxOsv16)
            .define_flag("ACROSS_CHANNEL");
        assert_eq!(jit.value_of("ACTIVATION_FUNCTION_RELU"), Some(""));
        assert_eq!(jit.value_of("MAX_POOLING"), Some(""));
        assert_eq!(jit.value_of("FIXED_KERNEL_DIVIDER"), Some(""));
        assert_eq!(jit.value_of("CONCAT_FEATURE"), Some("1"));
        assert_eq!(jit.value_of("OUTPUT_LAYOUT_OS_IYX_OSV16"), Some("1"));
        assert_eq!(jit.value_of("ACROSS_CHANNEL"), Some(""));
    }

    #[test]
    fn remove_and_value_lookup() {
        let mut jit = JitConstants::new();
        jit.define("LWS", 16usize).define("GWS", 64usize);
        jit.remove("LWS");
        assert!(!jit.contains("LWS"));
        assert_eq!(jit.value_of("GWS"), Some("64"));
    }
}
