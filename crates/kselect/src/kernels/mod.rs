//! Kernel implementations and the closed registry the selector draws from.
//!
//! Every implementation belongs to one family. Families share their
//! validation, dispatch and jit defaults through a per-family hook trait;
//! [`KernelImpl`] is the object-safe face the selector sees.

pub mod activation;
pub mod concatenation;
pub mod convolution;
pub mod fully_connected;
pub mod lrn;
pub mod pooling;
pub mod reorder_weights;
pub mod softmax;

use std::{fmt, sync::Arc};

use crate::{
    context::ComputeContext, kernel_base::{KernelsData, WeightsReorder, priority}, params::{OptionalParams, Params, ReorderWeightsParams, WeightBiasParams}, params_key::ParamsKey, tensor::{Layout, WeightsLayout}, types::{ActivationFunction, KernelType}, weights_reorder::{CpuReorder, CpuReorderKind}
};

/// One registered way to compute a primitive.
pub trait KernelImpl: Send + Sync {
    fn name(&self) -> &'static str;

    fn kernel_type(&self) -> KernelType;

    /// Static ranking estimate. Per-request estimates may raise it, never
    /// lower it.
    fn priority(&self) -> f32;

    /// Capabilities advertised to the key matcher.
    fn supported_key(&self) -> ParamsKey;

    /// False when `params` belongs to another family or the implementation
    /// rejects the request beyond what its key expresses.
    fn validate(&self, params: &Params, options: &OptionalParams) -> bool;

    /// Empty when the implementation cannot serve the request.
    fn kernels_data(&self, ctx: &ComputeContext, params: &Params, options: &OptionalParams) -> KernelsData;
}

impl fmt::Debug for dyn KernelImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelImpl")
            .field("name", &self.name())
            .field("kernel_type", &self.kernel_type())
            .finish()
    }
}

/// Wraps a family hook trait into a [`KernelImpl`].
macro_rules! family_kernel {
    ($(#[$meta:meta])* $wrapper:ident: $hooks:ident => $variant:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default)]
        pub struct $wrapper<K>(pub K);

        impl<K: $hooks> $crate::kernels::KernelImpl for $wrapper<K> {
            fn name(&self) -> &'static str {
                K::ID.as_str()
            }

            fn kernel_type(&self) -> $crate::types::KernelType {
                K::ID.kernel_type()
            }

            fn priority(&self) -> f32 {
                K::ID.priority()
            }

            fn supported_key(&self) -> $crate::params_key::ParamsKey {
                self.0.supported_key()
            }

            fn validate(&self, params: &$crate::params::Params, options: &$crate::params::OptionalParams) -> bool {
                match params {
                    $crate::params::Params::$variant(p) => self.0.validate(p, options),
                    _ => false,
                }
            }

            fn kernels_data(
                &self,
                ctx: &$crate::context::ComputeContext,
                params: &$crate::params::Params,
                options: &$crate::params::OptionalParams,
            ) -> $crate::kernel_base::KernelsData {
                match params {
                    $crate::params::Params::$variant(p) if self.0.validate(p, options) => self.0.kernels_data(ctx, p, options),
                    _ => $crate::kernel_base::KernelsData::new(),
                }
            }
        }
    };
}
pub(crate) use family_kernel;

macro_rules! kernel_ids {
    ($($variant:ident => ($name:literal, $family:ident, $priority:expr, $imp:expr)),+ $(,)?) => {
        /// Every kernel implementation known to the selector.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum KernelId {
            $($variant),+
        }

        impl KernelId {
            pub const ALL: &'static [KernelId] = &[$(KernelId::$variant),+];

            /// Kernel name, also the template it specialises.
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(KernelId::$variant => $name),+
                }
            }

            pub const fn kernel_type(self) -> KernelType {
                match self {
                    $(KernelId::$variant => KernelType::$family),+
                }
            }

            pub const fn priority(self) -> f32 {
                match self {
                    $(KernelId::$variant => $priority),+
                }
            }

            pub fn implementation(self) -> Arc<dyn KernelImpl> {
                match self {
                    $(KernelId::$variant => Arc::new($imp)),+
                }
            }
        }
    };
}

kernel_ids! {
    ConvolutionRef => ("convolution_gpu_ref", Convolution, priority::DONT_USE_IF_HAVE_SOMETHING_ELSE,
        convolution::Convolution(convolution::reference::ConvolutionRef)),
    ConvolutionGemmLike => ("convolution_gpu_bfyx_gemm_like", Convolution, priority::FORCE_PRIORITY_6,
        convolution::Convolution(convolution::gemm_like::ConvolutionGemmLike)),
    ConvolutionBfyxOsIyxOsv16 => ("convolution_gpu_bfyx_os_iyx_osv16", Convolution, priority::FORCE_PRIORITY_3,
        convolution::Convolution(convolution::bfyx_os_iyx_osv16::ConvolutionBfyxOsIyxOsv16)),
    ConvolutionYxfbYxioB16 => ("convolution_gpu_yxfb_yxio_b16", Convolution, priority::FORCE_PRIORITY_7,
        convolution::Convolution(convolution::yxfb_yxio_b16::ConvolutionYxfbYxioB16)),
    PoolingRef => ("pooling_gpu_ref", Pooling, priority::DONT_USE_IF_HAVE_SOMETHING_ELSE,
        pooling::Pooling(pooling::reference::PoolingRef)),
    PoolingAverageOpt => ("pooling_gpu_average_opt", Pooling, priority::FORCE_PRIORITY_8,
        pooling::Pooling(pooling::average_opt::PoolingAverageOpt)),
    PoolingBfyxBlockOpt => ("pooling_gpu_bfyx_block_opt", Pooling, priority::FORCE_PRIORITY_8,
        pooling::Pooling(pooling::bfyx_block_opt::PoolingBfyxBlockOpt)),
    FullyConnectedBfIoRef => ("fully_connected_gpu_bf_io_ref", FullyConnected, priority::DONT_USE_IF_HAVE_SOMETHING_ELSE,
        fully_connected::FullyConnected(fully_connected::reference::FullyConnectedBfIoRef)),
    FullyConnectedYxfbRef => ("fully_connected_gpu_yxfb_ref", FullyConnected, priority::DONT_USE_IF_HAVE_SOMETHING_ELSE,
        fully_connected::FullyConnected(fully_connected::reference::FullyConnectedYxfbRef)),
    FullyConnectedFbIoBlock => ("fully_connected_gpu_fb_io_block_fp16", FullyConnected, priority::FORCE_PRIORITY_3,
        fully_connected::FullyConnected(fully_connected::fb_io_block::FullyConnectedFbIoBlock)),
    FullyConnectedBfIoGemm => ("fully_connected_gpu_bf_io_gemm", FullyConnected, priority::FORCE_PRIORITY_6,
        fully_connected::FullyConnected(fully_connected::gemm::FullyConnectedBfIoGemm)),
    SoftmaxRef => ("softmax_gpu_ref", Softmax, priority::DONT_USE_IF_HAVE_SOMETHING_ELSE,
        softmax::Softmax(softmax::reference::SoftmaxRef)),
    SoftmaxBf => ("softmax_gpu_bf", Softmax, priority::FORCE_PRIORITY_6,
        softmax::Softmax(softmax::items_class::SoftmaxBf)),
    SoftmaxFb => ("softmax_gpu_fb", Softmax, priority::FORCE_PRIORITY_6,
        softmax::Softmax(softmax::items_class::SoftmaxFb)),
    LrnRef => ("lrn_gpu_ref", Lrn, priority::DONT_USE_IF_HAVE_SOMETHING_ELSE,
        lrn::Lrn(lrn::reference::LrnRef)),
    LrnAcrossChannelOptB8 => ("lrn_gpu_across_channel_opt_b8", Lrn, priority::FORCE_PRIORITY_9,
        lrn::Lrn(lrn::across_channel_opt_b8::LrnAcrossChannelOptB8)),
    ActivationRef => ("activation_ref", Activation, priority::DONT_USE_IF_HAVE_SOMETHING_ELSE,
        activation::Activation(activation::ActivationRef)),
    ActivationOpt => ("activation_opt", Activation, priority::FORCE_PRIORITY_6,
        activation::Activation(activation::ActivationOpt)),
    ConcatenationRef => ("concatenation_gpu_ref", Concatenation, priority::DONT_USE_IF_HAVE_SOMETHING_ELSE,
        concatenation::Concatenation(concatenation::ConcatenationRef)),
    ConcatenationDepthBfyxNoPitch => ("concatenation_gpu_depth_bfyx_no_pitch", Concatenation, priority::FORCE_PRIORITY_9,
        concatenation::Concatenation(concatenation::ConcatenationDepthBfyxNoPitch)),
    ReorderWeights => ("reorder_weights", ReorderWeights, priority::DONT_USE_IF_HAVE_SOMETHING_ELSE,
        reorder_weights::ReorderWeightsKernel),
}

impl KernelId {
    pub fn from_name(name: &str) -> Option<KernelId> {
        Self::ALL.iter().copied().find(|id| id.as_str() == name)
    }
}

impl fmt::Display for KernelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registered implementations of `family`, in registration order.
pub fn implementations(family: KernelType) -> Vec<Arc<dyn KernelImpl>> {
    KernelId::ALL
        .iter()
        .filter(|id| id.kernel_type() == family)
        .map(|id| id.implementation())
        .collect()
}

/// Every template name the registered kernels may request.
pub fn template_names() -> Vec<String> {
    let mut names: Vec<String> = KernelId::ALL.iter().map(|id| id.as_str().to_string()).collect();
    for postfix in ["_fp16", "_fp32"] {
        names.push(format!("{}{postfix}", KernelId::ConvolutionYxfbYxioB16.as_str()));
    }
    names
}

/// Activations fused kernels evaluate inline.
pub(crate) fn check_activation_support(function: ActivationFunction) -> bool {
    matches!(
        function,
        ActivationFunction::None | ActivationFunction::Relu | ActivationFunction::ReluNegativeSlope
    )
}

/// Weights already in `layout` or reorderable into it.
pub(crate) fn check_weights(params: &WeightBiasParams, layout: WeightsLayout, options: &OptionalParams) -> bool {
    params.weights.layout == layout || options.allow_weights_reorder
}

/// Reorder the weights of `params` into `layout`, updating its descriptor.
///
/// `Some(WeightsReorder::None)` when nothing has to move, `None` when no
/// reorder path exists. Simple targets run the generated reorder kernel;
/// the blocked `os_iyx_osv16` layout is produced on the host.
pub(crate) fn update_weights(
    ctx: &ComputeContext,
    params: &mut WeightBiasParams,
    layout: WeightsLayout,
    options: &OptionalParams,
) -> Option<WeightsReorder> {
    if params.weights.layout == layout {
        return Some(WeightsReorder::None);
    }
    if !options.allow_weights_reorder {
        return None;
    }
    let target = params.weights.transform(layout);
    let reorder = if layout.is_simple() {
        let mut reorder_params = ReorderWeightsParams::new(params.weights.clone(), target.clone());
        reorder_params.layer_id = format!("{}_reorder_", params.base.layer_id);
        let kernel = reorder_weights::best_reorder_kernel(ctx, reorder_params)?;
        WeightsReorder::Gpu {
            kernel: Box::new(kernel),
            new_buffer_size: target.physical_size(),
        }
    } else if layout == WeightsLayout::OsIyxOsv16 && params.weights.layout.is_simple() {
        let reorder = CpuReorder::new(CpuReorderKind::Osv16, params.weights.clone(), params.weights.dtype);
        let new_buffer_size = reorder.new_buffer_size();
        WeightsReorder::Cpu { reorder, new_buffer_size }
    } else {
        return None;
    };
    params.weights = target;
    Some(reorder)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use crate::{context::{ComputeContext, EngineInfo}, template_db::InMemoryTemplateDatabase};

    /// Context whose template database knows every registered kernel.
    pub(crate) fn context() -> ComputeContext {
        let names = super::template_names();
        let templates = InMemoryTemplateDatabase::with_placeholders(names.iter().map(String::as_str));
        ComputeContext::new(EngineInfo::default(), Arc::new(templates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_the_registry() {
        for &id in KernelId::ALL {
            assert_eq!(KernelId::from_name(id.as_str()), Some(id));
            let imp = id.implementation();
            assert_eq!(imp.name(), id.as_str());
            assert_eq!(imp.kernel_type(), id.kernel_type());
        }
        assert_eq!(KernelId::from_name("convolution_gpu_winograd"), None);
    }

    #[test]
    fn every_family_has_a_reference_fallback() {
        for &family in KernelType::ALL {
            let imps = implementations(family);
            assert!(!imps.is_empty(), "{family} has no kernels");
            assert!(
                imps.iter().any(|k| k.priority() == priority::DONT_USE_IF_HAVE_SOMETHING_ELSE),
                "{family} has no fallback"
            );
        }
    }

    #[test]
    fn fused_activation_support_is_limited() {
        assert!(check_activation_support(ActivationFunction::Relu));
        assert!(!check_activation_support(ActivationFunction::Prelu));
    }
}
