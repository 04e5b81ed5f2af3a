//! Work-group-per-data-set kernels for 2D (or flattenable) inputs.

use super::{SoftmaxDispatch, SoftmaxKernel, default_dispatch, max_local_size, spread_items};
use crate::{
    kernels::KernelId, params::{OptionalParams, SoftmaxParams}, params_key::ParamsKey, tensor::DataLayout, types::{Datatype, SoftmaxDim}
};

fn key(layouts: [DataLayout; 2]) -> ParamsKey {
    let mut k = ParamsKey::new();
    for dtype in [Datatype::F16, Datatype::F32] {
        k.enable_input_data_type(dtype).enable_output_data_type(dtype);
    }
    for layout in layouts {
        k.enable_input_layout(layout).enable_output_layout(layout);
    }
    for &dim in SoftmaxDim::ALL {
        k.enable_softmax_dim(dim);
    }
    k.enable_batching();
    k
}

/// Batch-major: one work group per batch.
#[derive(Clone, Copy, Debug, Default)]
pub struct SoftmaxBf;

impl SoftmaxKernel for SoftmaxBf {
    const ID: KernelId = KernelId::SoftmaxBf;

    fn supported_key(&self) -> ParamsKey {
        key([DataLayout::Bfyx, DataLayout::Bf])
    }

    fn set_default(&self, params: &SoftmaxParams, options: &OptionalParams) -> Option<SoftmaxDispatch> {
        let mut dispatch = default_dispatch(params, Self::ID.priority());
        let max_lws = max_local_size(options, dispatch.base.fp16_unit_used);
        let (lws, items) = spread_items(1, dispatch.data_set_size, max_lws);
        dispatch.items_num = items;
        dispatch.base.work_groups.global = [lws, dispatch.data_sets_count, 1];
        dispatch.base.work_groups.local = [lws, 1, 1];
        dispatch.base.leftovers = dispatch.data_set_size % lws;
        (items > 0).then_some(dispatch)
    }
}

/// Feature-major: all batches share one work group.
#[derive(Clone, Copy, Debug, Default)]
pub struct SoftmaxFb;

impl SoftmaxKernel for SoftmaxFb {
    const ID: KernelId = KernelId::SoftmaxFb;

    fn supported_key(&self) -> ParamsKey {
        key([DataLayout::Yxfb, DataLayout::Fb])
    }

    fn set_default(&self, params: &SoftmaxParams, options: &OptionalParams) -> Option<SoftmaxDispatch> {
        let mut dispatch = default_dispatch(params, Self::ID.priority());
        let max_lws = max_local_size(options, dispatch.base.fp16_unit_used);
        let (lws, items) = spread_items(dispatch.data_sets_count, dispatch.data_set_size, max_lws);
        dispatch.items_num = items;
        dispatch.base.work_groups.global = [lws, 1, 1];
        dispatch.base.work_groups.local = [lws, 1, 1];
        dispatch.base.leftovers = (dispatch.data_set_size * dispatch.data_sets_count) % lws.max(1);
        (items > 0).then_some(dispatch)
    }
}
