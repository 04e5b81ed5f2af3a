//! Kernel descriptors produced by selection and the helpers every family
//! uses to build them.

use serde::Serialize;
use tracing::warn;

use crate::{
    context::{ComputeContext, EngineInfo}, dispatch::WorkGroups, error::Result, jit::{CodeBuilder, JitConstants}, params::{BaseParams, Params}, types::Datatype, weights_reorder::CpuReorder
};

/// Static ranking estimates. Lower runs first.
pub mod priority {
    pub const FORCE_PRIORITY_1: f32 = 1e-7;
    pub const FORCE_PRIORITY_2: f32 = 2e-7;
    pub const FORCE_PRIORITY_3: f32 = 3e-7;
    pub const FORCE_PRIORITY_4: f32 = 4e-7;
    pub const FORCE_PRIORITY_5: f32 = 5e-7;
    pub const FORCE_PRIORITY_6: f32 = 6e-7;
    pub const FORCE_PRIORITY_7: f32 = 7e-7;
    pub const FORCE_PRIORITY_8: f32 = 8e-7;
    pub const FORCE_PRIORITY_9: f32 = 9e-7;
    pub const DONT_USE_IF_HAVE_SOMETHING_ELSE: f32 = 1e6;
    pub const NOT_SUPPORTED: f32 = f32::MAX;
}

/// Scheduling hint passed to the compiler through build options.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExeMode {
    #[default]
    Default,
    AgeBased,
    RoundRobin,
}

impl ExeMode {
    pub const fn build_option(self) -> &'static str {
        match self {
            ExeMode::AgeBased => "-cl-no-subgroup-ifp",
            ExeMode::Default | ExeMode::RoundRobin => "",
        }
    }
}

/// Everything the toolkit needs to compile one specialisation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct KernelString {
    pub source: String,
    pub jit: String,
    pub options: String,
    pub entry_point: String,
    pub batch_compilation: bool,
}

/// Buffer or scalar bound at one argument slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum KernelArgument {
    Input(u32),
    Output,
    Weights,
    Bias,
    Split,
    Uint32(u32),
}

/// INPUT×n, OUTPUT, then WEIGHTS and BIAS when used.
pub fn args_desc(num_inputs: u32, weights: bool, bias: bool) -> Vec<KernelArgument> {
    let mut args: Vec<KernelArgument> = (0..num_inputs).map(KernelArgument::Input).collect();
    args.push(KernelArgument::Output);
    if weights {
        args.push(KernelArgument::Weights);
    }
    if bias {
        args.push(KernelArgument::Bias);
    }
    args
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClKernelData {
    pub kernel_string: KernelString,
    pub work_groups: WorkGroups,
    pub arguments: Vec<KernelArgument>,
}

/// How the caller must transform the weights before launching.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum WeightsReorder {
    #[default]
    None,
    /// Run the generated reorder kernel on the device.
    Gpu { kernel: Box<ClKernelData>, new_buffer_size: usize },
    /// Transform on the host before upload.
    Cpu { reorder: CpuReorder, new_buffer_size: usize },
}

impl WeightsReorder {
    pub fn is_none(&self) -> bool {
        matches!(self, WeightsReorder::None)
    }

    /// Bytes of the reordered weights buffer, if a reorder applies.
    pub fn new_buffer_size(&self) -> Option<usize> {
        match self {
            WeightsReorder::None => None,
            WeightsReorder::Gpu { new_buffer_size, .. } | WeightsReorder::Cpu { new_buffer_size, .. } => Some(*new_buffer_size),
        }
    }
}

/// One way to serve a request: kernels, launch geometry and reorders.
#[derive(Clone, Debug, PartialEq)]
pub struct KernelData {
    pub kernel_name: &'static str,
    /// The request as the kernels see it, after any input or weights reorder.
    pub params: Params,
    pub kernels: Vec<ClKernelData>,
    pub estimated_time: f32,
    /// The caller must reorder the input into `params`' input layout.
    pub reorder_input: bool,
    pub weights_reorder: WeightsReorder,
}

impl KernelData {
    pub fn new(kernel_name: &'static str, params: Params) -> Self {
        Self {
            kernel_name,
            params,
            kernels: Vec::new(),
            estimated_time: priority::DONT_USE_IF_HAVE_SOMETHING_ELSE,
            reorder_input: false,
            weights_reorder: WeightsReorder::None,
        }
    }
}

pub type KernelsData = Vec<KernelData>;

/// Layer id with `.` replaced (or the template name when empty) plus a
/// context-unique counter.
pub fn entry_point(ctx: &ComputeContext, template_name: &str, layer_id: &str) -> String {
    let mut kernel_id = if layer_id.is_empty() {
        template_name.to_string()
    } else {
        layer_id.replace('.', "_")
    };
    kernel_id.push_str(&ctx.next_entry_point_id().to_string());
    kernel_id
}

/// Header prepended to the template: banner, `KERNEL`/`FUNC` macros and one
/// `#define` per constant.
pub fn create_jit(template_name: &str, constants: &JitConstants, kernel_id: &str) -> Result<String> {
    let mut code = CodeBuilder::new();
    code.add_line("\n//====================================================")
        .add_line(&format!("// Kernel template: {template_name} "))
        .add_line(&format!("// Kernel name: {kernel_id}"));
    code.value_macro("KERNEL(name)", &format!("__kernel void {kernel_id}"))?
        .decoration_macro("FUNC", "", kernel_id)?
        .decoration_macro("FUNC_CALL", "", kernel_id)?;
    for (name, value) in constants.definitions() {
        code.value_macro(&name, &value)?;
    }
    Ok(code.build())
}

/// `None` (with a warning) when the template database lacks `template_name`.
pub fn kernel_string(ctx: &ComputeContext, template_name: &str, jit: String, entry_point: String, exe_mode: ExeMode) -> Option<KernelString> {
    let Some(source) = ctx.templates().get(template_name) else {
        warn!(template = template_name, "kernel template not found");
        return None;
    };
    Some(KernelString {
        source: source.to_string(),
        jit,
        options: format!("{} -cl-mad-enable", exe_mode.build_option()),
        entry_point,
        batch_compilation: true,
    })
}

/// Specialise `template_name` for one launch. `None` means this
/// implementation cannot produce kernels for the request.
pub fn make_cl_kernel(
    ctx: &ComputeContext,
    template_name: &str,
    layer_id: &str,
    constants: &JitConstants,
    work_groups: WorkGroups,
    exe_mode: ExeMode,
    arguments: Vec<KernelArgument>,
) -> Option<ClKernelData> {
    let entry_point = entry_point(ctx, template_name, layer_id);
    let jit = match create_jit(template_name, constants, &entry_point) {
        Ok(jit) => jit,
        Err(err) => {
            warn!(template = template_name, error = %err, "jit generation failed");
            return None;
        }
    };
    let kernel_string = kernel_string(ctx, template_name, jit, entry_point, exe_mode)?;
    Some(ClKernelData {
        kernel_string,
        work_groups,
        arguments,
    })
}

/// `UNIT_*` helpers for the kernel's arithmetic type.
pub fn unit_type_jit(dtype: Datatype) -> JitConstants {
    let (unit_type, max_val, one, zero, to_unit, max_func, min_func) = match dtype {
        Datatype::Int8 => ("char", "CHAR_MAX", "(char) 1", "(char) 0", "convert_char(v)", "max", "min"),
        Datatype::F16 => ("half", "HALF_MAX", "1.0h", "0.0h", "convert_half(v)", "fmax", "fmin"),
        Datatype::F32 => ("float", "FLT_MAX", "1.0f", "0.0f", "(float)(v)", "fmax", "fmin"),
    };
    let mut jit = JitConstants::new();
    jit.define("UNIT_TYPE", unit_type)
        .define("UNIT_VAL_MAX", max_val)
        .define("UNIT_VAL_MIN", "-UNIT_VAL_MAX")
        .define("UNIT_VAL_ONE", one)
        .define("UNIT_VAL_ZERO", zero)
        .define("TO_UNIT_TYPE(v)", to_unit)
        .define("UNIT_MAX_FUNC", max_func)
        .define("UNIT_MIN_FUNC", min_func);
    jit
}

/// Output tensor, engine capabilities, activation, unit type and inputs.
pub fn base_params_jit(engine: &EngineInfo, params: &BaseParams) -> JitConstants {
    let uses = |dtype: Datatype| params.output.dtype == dtype || params.inputs().iter().any(|i| i.dtype == dtype);
    let (fp16_used, int8_used) = (uses(Datatype::F16), uses(Datatype::Int8));

    let mut jit = JitConstants::new();
    jit.define_data_tensor("OUTPUT", &params.output)
        .define("FP64_SUPPORTED", engine.supports_fp64)
        .define("FP16_SUPPORTED", engine.supports_fp16)
        .define("FP16_UNIT_USED", fp16_used)
        .define("INT8_UNIT_USED", int8_used)
        .define("NL_M", params.nl_params.m)
        .define("NL_N", params.nl_params.n)
        .define_activation(params.activation);

    let unit = if int8_used {
        Datatype::Int8
    } else if fp16_used {
        Datatype::F16
    } else {
        Datatype::F32
    };
    jit.extend(unit_type_jit(unit));

    for (idx, input) in params.inputs().iter().enumerate() {
        jit.define_data_tensor(format!("INPUT{idx}"), input);
    }
    jit
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        tensor::{DataLayout, DataTensor}, template_db::InMemoryTemplateDatabase
    };

    fn context() -> ComputeContext {
        ComputeContext::new(EngineInfo::default(), Arc::new(InMemoryTemplateDatabase::with_placeholders(["pooling_gpu_ref"])))
    }

    #[test]
    fn entry_points_replace_dots_and_stay_unique() {
        let ctx = context();
        assert_eq!(entry_point(&ctx, "pooling_gpu_ref", "conv1.pool"), "conv1_pool0");
        assert_eq!(entry_point(&ctx, "pooling_gpu_ref", ""), "pooling_gpu_ref1");
    }

    #[test]
    fn concurrent_callers_never_share_an_entry_point() {
        let ctx = context();
        let mut names: Vec<String> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| (0..64).map(|_| entry_point(&ctx, "pooling_gpu_ref", "pool")).collect::<Vec<_>>()))
                .collect();
            workers.into_iter().flat_map(|worker| worker.join().unwrap()).collect()
        });
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 256);
    }

    #[test]
    fn jit_header_declares_kernel_and_function_decorations() {
        let mut constants = JitConstants::new();
        constants.define("POOL_SIZE_X", 3);
        let jit = create_jit("pooling_gpu_ref", &constants, "pool0").unwrap();
        assert!(jit.starts_with("\n//====================================================\n// Kernel template: pooling_gpu_ref \n"));
        assert!(jit.contains("#define KERNEL(name) __kernel void pool0\n"));
        assert!(jit.contains("#define FUNC(name)  _##name##_pool0\n"));
        assert!(jit.contains("#define FUNC_CALL(name)  _##name##_pool0\n"));
        assert!(jit.ends_with("#define POOL_SIZE_X 3\n\n"));
    }

    #[test]
    fn duplicate_constants_are_rejected() {
        let mut constants = JitConstants::new();
        constants.define("FUNC", 1);
        let err = create_jit("t", &constants, "k0").unwrap_err();
        match err {
            crate::error::KernelSelectorError::DuplicateJitDefinition { name } => assert_eq!(name, "FUNC"),
            other => panic!("expected duplicate definition, got {other:?}"),
        }
    }

    #[test]
    fn missing_template_yields_no_kernel() {
        let ctx = context();
        let kernel = make_cl_kernel(&ctx, "softmax_gpu_bf", "", &JitConstants::new(), WorkGroups::default(), ExeMode::Default, Vec::new());
        assert!(kernel.is_none());
    }

    #[test]
    fn args_follow_input_output_weights_bias_order() {
        assert_eq!(
            args_desc(2, true, true),
            vec![
                KernelArgument::Input(0),
                KernelArgument::Input(1),
                KernelArgument::Output,
                KernelArgument::Weights,
                KernelArgument::Bias
            ]
        );
        assert_eq!(args_desc(1, false, false), vec![KernelArgument::Input(0), KernelArgument::Output]);
    }

    #[test]
    fn half_inputs_select_half_unit_type() {
        let input = DataTensor::with_sizes(Datatype::F16, DataLayout::Bfyx, 4, 4, 2, 1);
        let output = DataTensor::with_sizes(Datatype::F32, DataLayout::Bfyx, 4, 4, 2, 1);
        let jit = base_params_jit(&EngineInfo::default(), &BaseParams::new(input, output));
        assert_eq!(jit.value_of("UNIT_TYPE"), Some("half"));
        assert_eq!(jit.value_of("FP16_UNIT_USED"), Some("1"));
        assert_eq!(jit.value_of("UNIT_VAL_ONE"), Some("1.0h"));
        assert!(jit.contains("ACTIVATION_FUNCTION_NONE"));
        assert!(jit.contains("INPUT0"));
    }
}
