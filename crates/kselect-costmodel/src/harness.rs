//! Offline calibration: time every (kernel, parameter set) pair on the
//! device and collect the results into a cost table.

use std::{collections::BTreeMap, sync::Arc};

use kselect::{
    ClKernelData, ComputeContext, CostEntry, CostTableFile, KernelArgument, KernelData, KernelId, KernelSelectorError, OptionalParams, Params, signature_hash
};
use kselect_instrumentation::{MetricEvent, record_metric};
use thiserror::Error;
use tracing::{debug, error, info, info_span, warn};

use crate::{
    program_cache::ProgramCache, runner::{BenchmarkRunner, RunnerConfig}, toolkit::{ArgValue, BufferAccess, GpuToolkit, ToolkitError}
};

/// Largest difference between a measured and an expected time that
/// verification accepts, in milliseconds.
pub const VERIFY_TOLERANCE_MS: f32 = 0.1;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Toolkit(#[from] ToolkitError),
    #[error(transparent)]
    Selector(#[from] KernelSelectorError),
    #[error("kernel argument {0:?} has no buffer in this request")]
    MissingArgument(KernelArgument),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HarnessMode {
    /// Measure and collect a table.
    #[default]
    Calibrate,
    /// Measure and report entries that drifted from the loaded table.
    Verify,
}

/// An entry whose measurement failed; the rest of the table is unaffected.
#[derive(Clone, Debug, PartialEq)]
pub struct EntryFailure {
    pub kernel: &'static str,
    pub signature_hash: u64,
    pub reason: String,
}

/// An entry whose measured time is off from what ranking assumed.
#[derive(Clone, Debug, PartialEq)]
pub struct VerifyMismatch {
    pub kernel: &'static str,
    pub signature: String,
    pub expected_ms: f32,
    pub measured: CostEntry,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HarnessReport {
    pub table: CostTableFile,
    /// Signature text of every hash in the table.
    pub signatures: BTreeMap<u64, String>,
    pub mismatches: Vec<VerifyMismatch>,
    pub failures: Vec<EntryFailure>,
}

pub struct Harness<'t, T: GpuToolkit> {
    ctx: Arc<ComputeContext>,
    toolkit: &'t T,
    mode: HarnessMode,
    runner: RunnerConfig,
    options: OptionalParams,
    programs: ProgramCache<T::Kernel>,
}

impl<'t, T: GpuToolkit> Harness<'t, T> {
    /// Launch counts come from the environment, hints from the engine.
    pub fn new(ctx: Arc<ComputeContext>, toolkit: &'t T, mode: HarnessMode) -> Self {
        let options = OptionalParams::for_engine(&ctx.engine);
        Self {
            ctx,
            toolkit,
            mode,
            runner: RunnerConfig::from_env(),
            options,
            programs: ProgramCache::default(),
        }
    }

    #[must_use]
    pub fn with_runner_config(mut self, runner: RunnerConfig) -> Self {
        self.runner = runner;
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: OptionalParams) -> Self {
        self.options = options;
        self
    }

    pub fn programs(&self) -> &ProgramCache<T::Kernel> {
        &self.programs
    }

    /// Measure each kernel on every parameter set of its family.
    pub fn run(&self, kernels: &[KernelId], param_sets: &[Params]) -> HarnessReport {
        let device = self.ctx.engine.device_id.clone();
        let _span = info_span!("calibrate", device = %device, mode = ?self.mode).entered();
        let mut report = HarnessReport {
            table: CostTableFile::new(device.as_str()),
            signatures: BTreeMap::new(),
            mismatches: Vec::new(),
            failures: Vec::new(),
        };

        for &id in kernels {
            let imp = id.implementation();
            for params in param_sets.iter().filter(|p| p.kernel_type() == id.kernel_type()) {
                let signature = params.to_string();
                let hash = signature_hash(&signature);
                let request = params.params_key().merge(&self.options.params_key(params.kernel_type()));
                let data = if imp.supported_key().support(&request) {
                    best_data(imp.kernels_data(&self.ctx, params, &self.options))
                } else {
                    None
                };
                let (entry, estimated) = match data {
                    None => {
                        debug!(kernel = id.as_str(), %signature, "not supported");
                        (CostEntry::NotSupported, None)
                    }
                    Some(data) => match self.measure(&data) {
                        Ok(mean_ms) => {
                            info!(kernel = id.as_str(), %signature, mean_ms, "measured");
                            record_metric!(MetricEvent::KernelBenchmarked {
                                kernel: id.as_str().to_string(),
                                signature_hash: hash,
                                mean_ms,
                                iterations: self.runner.iterations,
                            });
                            (CostEntry::Measured(mean_ms as f32), Some(data.estimated_time))
                        }
                        Err(err) => {
                            error!(kernel = id.as_str(), %signature, error = %err, "benchmark entry failed");
                            record_metric!(MetricEvent::BenchmarkEntryFailed {
                                kernel: id.as_str().to_string(),
                                signature_hash: hash,
                                reason: err.to_string(),
                            });
                            report.failures.push(EntryFailure {
                                kernel: id.as_str(),
                                signature_hash: hash,
                                reason: err.to_string(),
                            });
                            continue;
                        }
                    },
                };

                if let Some(previous) = report.signatures.insert(hash, signature.clone())
                    && previous != signature
                {
                    warn!(hash, %previous, %signature, "signature hash collision");
                }
                report.table.record(id.as_str(), hash, entry);
                if self.mode == HarnessMode::Verify {
                    self.verify(id, hash, signature, entry, estimated, &mut report.mismatches);
                }
            }
        }
        info!(entries = report.signatures.len(), failures = report.failures.len(), "calibration finished");
        report
    }

    /// Compare against the loaded table, or against the kernel's own
    /// estimate when the table has no entry.
    fn verify(&self, id: KernelId, hash: u64, signature: String, measured: CostEntry, estimated: Option<f32>, out: &mut Vec<VerifyMismatch>) {
        let known = self.ctx.cost_tables().lookup(&self.ctx.engine.device_id, id.as_str(), hash);
        let expected = match (known, estimated) {
            (Some(entry), _) => entry,
            (None, Some(time)) => CostEntry::Measured(time),
            (None, None) => return,
        };
        let drifted = match (expected, measured) {
            (CostEntry::Measured(e), CostEntry::Measured(m)) => (e - m).abs() > VERIFY_TOLERANCE_MS,
            (CostEntry::NotSupported, CostEntry::NotSupported) => false,
            _ => true,
        };
        if drifted {
            warn!(kernel = id.as_str(), %signature, expected = expected.estimated_time(), measured = measured.estimated_time(), "calibration drift");
            out.push(VerifyMismatch {
                kernel: id.as_str(),
                signature,
                expected_ms: expected.estimated_time(),
                measured,
            });
        }
    }

    /// Summed mean time of every kernel in `data`.
    fn measure(&self, data: &KernelData) -> Result<f64, HarnessError> {
        let runner = BenchmarkRunner::new(self.toolkit, self.runner);
        let mut total = 0.0;
        for cl in &data.kernels {
            let program = self.programs.get_or_compile(self.toolkit, &cl.kernel_string)?;
            let _buffers = self.bind(&program, cl, data)?;
            total += runner.measure(&program, cl.work_groups)?;
        }
        Ok(total)
    }

    /// Allocate and bind one buffer per argument, sized from the request.
    fn bind(&self, program: &T::Kernel, cl: &ClKernelData, data: &KernelData) -> Result<Vec<T::Buffer>, HarnessError> {
        let mut buffers = Vec::with_capacity(cl.arguments.len());
        for (index, &argument) in cl.arguments.iter().enumerate() {
            let index = index as u32;
            let scalar = match argument {
                KernelArgument::Split => Some(0),
                KernelArgument::Uint32(value) => Some(value),
                _ => None,
            };
            if let Some(value) = scalar {
                self.toolkit.set_arg(program, index, ArgValue::Uint32(value))?;
                continue;
            }
            let (size, access) = argument_buffer(data, argument).ok_or(HarnessError::MissingArgument(argument))?;
            let buffer = self.toolkit.create_buffer(size, access)?;
            self.toolkit.set_arg(program, index, ArgValue::Buffer(&buffer))?;
            buffers.push(buffer);
        }
        Ok(buffers)
    }
}

/// Byte size and access of the buffer behind `argument`.
///
/// Weights use the reorder target size when a reorder applies.
pub fn argument_buffer(data: &KernelData, argument: KernelArgument) -> Option<(usize, BufferAccess)> {
    let params = &data.params;
    if let Params::ReorderWeights(p) = params {
        return match argument {
            KernelArgument::Input(0) => Some((p.input.physical_size(), BufferAccess::ReadOnly)),
            KernelArgument::Output => Some((p.output.physical_size(), BufferAccess::WriteOnly)),
            _ => None,
        };
    }
    let base = params.base()?;
    let weight_bias = match params {
        Params::Convolution(p) => Some(&p.weight_bias),
        Params::FullyConnected(p) => Some(&p.weight_bias),
        _ => None,
    };
    match argument {
        KernelArgument::Input(i) => base
            .inputs()
            .get(i as usize)
            .map(|input| (input.physical_size(), BufferAccess::ReadOnly)),
        KernelArgument::Output => Some((base.output.physical_size(), BufferAccess::WriteOnly)),
        KernelArgument::Weights => {
            let weights = &weight_bias?.weights;
            let size = data.weights_reorder.new_buffer_size().unwrap_or_else(|| weights.physical_size());
            Some((size, BufferAccess::ReadOnly))
        }
        KernelArgument::Bias => {
            let bias = weight_bias?.bias.as_ref()?;
            Some((bias.physical_size(), BufferAccess::ReadOnly))
        }
        KernelArgument::Split | KernelArgument::Uint32(_) => None,
    }
}

fn best_data(data: Vec<KernelData>) -> Option<KernelData> {
    data.into_iter()
        .reduce(|best, d| if d.estimated_time < best.estimated_time { d } else { best })
}

#[path = "harness.test.rs"]
mod tests;
