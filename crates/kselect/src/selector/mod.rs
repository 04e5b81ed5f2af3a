//! Per-primitive kernel selection.
//!
//! A [`KernelSelector`] owns the candidates of one family. Candidates whose
//! key cannot serve the request are dropped, forced kernels win outright,
//! and the rest are ranked by calibrated time when the cost table knows the
//! request, by their own estimate otherwise.

mod overrides;

use std::sync::Arc;

use kselect_instrumentation::{MetricEvent, record_metric};
use tracing::{debug, debug_span, info, warn};

pub use overrides::KernelOverrides;

use crate::{
    context::ComputeContext, cost_table::{CostEntry, signature_hash}, error::{KernelSelectorError, Result}, kernel_base::KernelData, kernels::{self, KernelImpl}, params::{OptionalParams, Params}, types::KernelType
};

/// Why a kernel won.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionReason {
    /// Named by a force override.
    Forced,
    /// Ranked by a calibrated cost table entry.
    CostTable,
    /// Ranked by the kernel's own estimate.
    Priority,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SelectedKernel {
    pub kernel: &'static str,
    pub data: KernelData,
    /// Time the ranking used.
    pub effective_time: f32,
    pub reason: SelectionReason,
}

/// Outcome of one selection. `NotSupported` is an expected result, not an
/// error.
#[derive(Clone, Debug, PartialEq)]
pub enum Selection {
    Selected(SelectedKernel),
    NotSupported,
}

impl Selection {
    pub fn selected(&self) -> Option<&SelectedKernel> {
        match self {
            Selection::Selected(kernel) => Some(kernel),
            Selection::NotSupported => None,
        }
    }

    pub fn into_selected(self) -> Option<SelectedKernel> {
        match self {
            Selection::Selected(kernel) => Some(kernel),
            Selection::NotSupported => None,
        }
    }

    pub fn is_supported(&self) -> bool {
        matches!(self, Selection::Selected(_))
    }
}

struct Candidate {
    kernel: &'static str,
    data: KernelData,
    effective_time: f32,
    calibrated: bool,
    forced: bool,
}

pub struct KernelSelector {
    family: KernelType,
    implementations: Vec<Arc<dyn KernelImpl>>,
    ctx: Arc<ComputeContext>,
    overrides: KernelOverrides,
}

impl KernelSelector {
    /// Every registered kernel of `family`, with overrides read from the
    /// environment.
    pub fn new(family: KernelType, ctx: Arc<ComputeContext>) -> Self {
        Self::with_implementations(family, ctx, kernels::implementations(family)).with_overrides(KernelOverrides::from_environment())
    }

    pub fn with_implementations(family: KernelType, ctx: Arc<ComputeContext>, implementations: Vec<Arc<dyn KernelImpl>>) -> Self {
        Self {
            family,
            implementations,
            ctx,
            overrides: KernelOverrides::default(),
        }
    }

    #[must_use]
    pub fn with_overrides(mut self, overrides: KernelOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn family(&self) -> KernelType {
        self.family
    }

    pub fn implementations(&self) -> &[Arc<dyn KernelImpl>] {
        &self.implementations
    }

    pub fn overrides(&self) -> &KernelOverrides {
        &self.overrides
    }

    pub fn context(&self) -> &Arc<ComputeContext> {
        &self.ctx
    }

    /// Pick the best kernel for `params`.
    ///
    /// Fails only when `params` belongs to another family.
    pub fn select(&self, params: &Params, options: &OptionalParams) -> Result<Selection> {
        if params.kernel_type() != self.family {
            return Err(KernelSelectorError::FamilyMismatch {
                expected: self.family,
                actual: params.kernel_type(),
            });
        }
        let _span = debug_span!("select", family = %self.family, layer = params.layer_id()).entered();

        let request = params.params_key().merge(&options.params_key(self.family));
        let signature = signature_hash(&params.to_string());
        let device = self.ctx.engine.device_id.as_str();

        let mut ranked = Vec::new();
        for (index, imp) in self.implementations.iter().enumerate() {
            let name = imp.name();
            if self.overrides.is_denied(name) {
                debug!(kernel = name, "denied by override");
                continue;
            }
            if !imp.supported_key().support(&request) {
                debug!(kernel = name, "key does not cover the request");
                continue;
            }
            let calibrated = self.ctx.cost_tables().lookup(device, name, signature);
            if calibrated == Some(CostEntry::NotSupported) {
                debug!(kernel = name, "calibrated as not supported");
                continue;
            }
            ranked.push(Ranked {
                index,
                imp: &**imp,
                calibrated: calibrated.map(CostEntry::estimated_time),
                forced: self.overrides.is_forced(name),
            });
        }
        // Calibrated times are exact and estimates never beat the static
        // priority, so this order lets generation stop at the first
        // candidate that cannot win.
        ranked.sort_by(|a, b| a.bound().total_cmp(&b.bound()).then(a.index.cmp(&b.index)));

        let considered = ranked.len();
        let (forced, others): (Vec<_>, Vec<_>) = ranked.into_iter().partition(|r| r.forced);
        let mut winner = self.best_of(&forced, params, options);
        if winner.is_none() {
            if !self.overrides.force.is_empty() {
                warn!(forced = ?self.overrides.force, "no forced kernel can serve the request");
            }
            winner = self.best_of(&others, params, options);
        }

        let Some(winner) = winner else {
            info!("no kernel supports the request");
            return Ok(Selection::NotSupported);
        };
        let reason = if winner.forced {
            SelectionReason::Forced
        } else if winner.calibrated {
            SelectionReason::CostTable
        } else {
            SelectionReason::Priority
        };
        info!(kernel = winner.kernel, effective_time = winner.effective_time, ?reason, "selected kernel");
        record_metric!(MetricEvent::KernelSelected {
            family: self.family.to_string(),
            kernel: winner.kernel.to_string(),
            layer: params.layer_id().to_string(),
            estimated_time: winner.effective_time,
            candidates: considered,
        });
        Ok(Selection::Selected(SelectedKernel {
            kernel: winner.kernel,
            data: winner.data,
            effective_time: winner.effective_time,
            reason,
        }))
    }
}

/// Candidate that passed every check short of generating kernels.
struct Ranked<'a> {
    index: usize,
    imp: &'a dyn KernelImpl,
    calibrated: Option<f32>,
    forced: bool,
}

impl Ranked<'_> {
    /// Lowest effective time this candidate can reach.
    fn bound(&self) -> f32 {
        self.calibrated.unwrap_or_else(|| self.imp.priority())
    }
}

impl KernelSelector {
    /// Generate `ranked` in order and keep the lowest effective time, ties to
    /// registration order.
    fn best_of(&self, ranked: &[Ranked<'_>], params: &Params, options: &OptionalParams) -> Option<Candidate> {
        let mut best: Option<(usize, Candidate)> = None;
        for r in ranked {
            if best
                .as_ref()
                .is_some_and(|(index, leader)| (r.bound(), r.index) > (leader.effective_time, *index))
            {
                break;
            }
            let name = r.imp.name();
            let Some(data) = best_data(r.imp.kernels_data(&self.ctx, params, options)) else {
                debug!(kernel = name, "no kernels for the request");
                continue;
            };
            let effective_time = r.calibrated.unwrap_or(data.estimated_time);
            debug!(kernel = name, effective_time, calibrated = r.calibrated.is_some(), "candidate");
            let beats = best
                .as_ref()
                .is_none_or(|(index, leader)| (effective_time, r.index) < (leader.effective_time, *index));
            if beats {
                best = Some((r.index, Candidate {
                    kernel: name,
                    data,
                    effective_time,
                    calibrated: r.calibrated.is_some(),
                    forced: r.forced,
                }));
            }
        }
        best.map(|(_, candidate)| candidate)
    }
}

/// Lowest estimate among one implementation's alternatives.
fn best_data(data: Vec<KernelData>) -> Option<KernelData> {
    data.into_iter()
        .reduce(|best, d| if d.estimated_time < best.estimated_time { d } else { best })
}

#[path = "selector.test.rs"]
mod tests;
