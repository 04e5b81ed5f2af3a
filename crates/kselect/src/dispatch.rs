//! Launch geometry shared by every kernel family.

use serde::Serialize;

use crate::tensor::{DataTensor, Layout, data_channel};

/// Largest local size the generic heuristics ever pick along one dimension.
pub const DEFAULT_LWS_CAP: usize = 32;

const OPTIMAL_LWS_MAX: usize = 256;
const OPTIMAL_LWS_VALUES: [usize; 17] = [256, 224, 192, 160, 128, 96, 64, 32, 16, 8, 7, 6, 5, 4, 3, 2, 1];

/// Global and local work sizes of one enqueue.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct WorkGroups {
    pub global: [usize; 3],
    pub local: [usize; 3],
}

impl WorkGroups {
    pub const fn new(global: [usize; 3], local: [usize; 3]) -> Self {
        Self { global, local }
    }

    /// No zero sizes and every global size is a multiple of its local size.
    pub fn is_valid(&self) -> bool {
        self.global
            .iter()
            .zip(&self.local)
            .all(|(&g, &l)| g != 0 && l != 0 && g % l == 0)
    }
}

/// Per-invocation launch geometry and flags. Recomputed on every request.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct DispatchData {
    pub work_groups: WorkGroups,
    pub fp16_unit_used: bool,
    pub needs_boundary_check: bool,
    pub leftovers: usize,
    /// Static estimate used for ranking.
    pub efficiency: f32,
}

impl DispatchData {
    pub fn new(global: [usize; 3], local: [usize; 3], fp16_unit_used: bool, efficiency: f32) -> Self {
        Self {
            work_groups: WorkGroups::new(global, local),
            fp16_unit_used,
            needs_boundary_check: false,
            leftovers: 0,
            efficiency,
        }
    }

    pub fn gws(&self) -> [usize; 3] {
        self.work_groups.global
    }

    pub fn lws(&self) -> [usize; 3] {
        self.work_groups.local
    }
}

/// Largest divisor of `value` that does not exceed `cap`, found by decrementing.
pub fn largest_divisor_up_to(value: usize, cap: usize) -> usize {
    let mut candidate = value.min(cap).max(1);
    while value % candidate != 0 {
        candidate -= 1;
    }
    candidate
}

/// Local sizes for `gws` whose product stays within 256 work items.
///
/// Each dimension takes the biggest preferred value that fits the remaining
/// budget and divides its global size.
pub fn optimal_lws(gws: [usize; 3]) -> [usize; 3] {
    let mut lws = [1usize; 3];
    let mut total = 1;
    for (dim, &global) in gws.iter().enumerate() {
        let rest = OPTIMAL_LWS_MAX / total;
        let chosen = OPTIMAL_LWS_VALUES
            .iter()
            .copied()
            .filter(|&v| v <= rest)
            .find(|&v| global % v == 0)
            .unwrap_or(1);
        lws[dim] = chosen;
        total *= chosen;
    }
    lws
}

/// Global sizes following the physical order of `tensor`, with the y
/// extent folded into its neighbour so at most three dimensions remain.
pub fn tensor_friendly_work_groups(tensor: &DataTensor) -> [usize; 3] {
    let y_index = tensor.layout.channel_index(data_channel::Y);
    let mut sizes: Vec<usize> = Vec::with_capacity(3);
    for (idx, dim) in tensor.dims.iter().enumerate() {
        match (Some(idx) == y_index, sizes.last_mut()) {
            (true, Some(last)) => *last *= dim.v,
            _ => sizes.push(dim.v),
        }
    }
    sizes.resize(3, 1);
    let mut global = [1usize; 3];
    for (slot, size) in global.iter_mut().zip(sizes.into_iter().take(3)) {
        *slot = size;
    }
    if tensor.dims.len() > 4 {
        global[2] *= tensor.dims[4..].iter().map(|d| d.v).product::<usize>();
    }
    global
}

/// `GWS_*` index macros matching [`tensor_friendly_work_groups`] for `tensor`.
pub fn tensor_friendly_work_groups_jit(tensor: &DataTensor) -> crate::jit::JitConstants {
    let mut jit = crate::jit::JitConstants::new();
    let y_index = tensor.layout.channel_index(data_channel::Y);
    let mut slot = 0usize;
    let mut slot_of = [None; data_channel::COUNT];
    for idx in 0..tensor.dims.len() {
        if Some(idx) == y_index && idx > 0 {
            slot_of[idx] = Some(slot - 1);
            continue;
        }
        slot_of[idx] = Some(slot.min(2));
        slot += 1;
    }
    let position = |channel| tensor.layout.channel_index(channel).and_then(|idx| slot_of.get(idx).copied().flatten());
    if let Some(batch) = position(data_channel::BATCH) {
        jit.define("GWS_BATCH", batch);
    }
    if let Some(feature) = position(data_channel::FEATURE) {
        jit.define("GWS_FEATURE", feature);
    }
    jit.define("GWS_YX", position(data_channel::X).unwrap_or(2));
    jit
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{tensor::DataLayout, types::Datatype};

    #[test]
    fn largest_divisor_walks_down_from_cap() {
        assert_eq!(largest_divisor_up_to(96, 32), 32);
        assert_eq!(largest_divisor_up_to(55, 32), 11);
        assert_eq!(largest_divisor_up_to(13, 32), 13);
        assert_eq!(largest_divisor_up_to(37, 32), 1);
    }

    #[test]
    fn optimal_lws_respects_total_budget() {
        assert_eq!(optimal_lws([55, 55, 96]), [5, 5, 8]);
        assert_eq!(optimal_lws([256, 4, 1]), [256, 1, 1]);
        assert_eq!(optimal_lws([13, 13, 384]), [1, 1, 192]);
        let lws = optimal_lws([1024, 1024, 1024]);
        assert!(lws.iter().product::<usize>() <= 256);
    }

    #[test]
    fn tensor_friendly_groups_merge_y_into_x() {
        let tensor = DataTensor::with_sizes(Datatype::F16, DataLayout::Bfyx, 13, 7, 64, 2);
        assert_eq!(tensor_friendly_work_groups(&tensor), [91, 64, 2]);
        let jit = tensor_friendly_work_groups_jit(&tensor);
        assert_eq!(jit.value_of("GWS_YX"), Some("0"));
        assert_eq!(jit.value_of("GWS_FEATURE"), Some("1"));
        assert_eq!(jit.value_of("GWS_BATCH"), Some("2"));
    }

    #[test]
    fn work_groups_reject_zero_and_uneven_sizes() {
        assert!(WorkGroups::new([64, 2, 1], [16, 1, 1]).is_valid());
        assert!(!WorkGroups::new([0, 1, 1], [1, 1, 1]).is_valid());
        assert!(!WorkGroups::new([30, 1, 1], [16, 1, 1]).is_valid());
    }
}
