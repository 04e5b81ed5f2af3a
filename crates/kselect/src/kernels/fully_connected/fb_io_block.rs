use super::{FullyConnectedKernel, default_dispatch, fully_connected_jit};
use crate::{
    context::EngineInfo, dispatch::DispatchData, jit::JitConstants, kernel_base::priority, kernels::KernelId, params::{FullyConnectedParams, OptionalParams}, params_key::ParamsKey, tensor::{DataLayout, WeightsLayout}, types::{Datatype, WeightsType, ceil_div}
};

const SUB_GROUP_SIZE: usize = 16;
const UNIT_BYTE_SIZE: usize = 2;
const CHUNK_BYTE_SIZE: usize = 4;
const UNITS_PER_CHUNK: usize = CHUNK_BYTE_SIZE / UNIT_BYTE_SIZE;
const UNITS_PER_SG_READ: usize = SUB_GROUP_SIZE * UNITS_PER_CHUNK;

/// Half-precision `fb` kernel reading 32 responses per sub-group block read.
#[derive(Clone, Copy, Debug, Default)]
pub struct FullyConnectedFbIoBlock;

impl FullyConnectedKernel for FullyConnectedFbIoBlock {
    const ID: KernelId = KernelId::FullyConnectedFbIoBlock;

    fn supported_key(&self) -> ParamsKey {
        let mut k = ParamsKey::new();
        k.enable_input_data_type(Datatype::F16)
            .enable_output_data_type(Datatype::F16)
            .enable_input_weights_type(WeightsType::F16)
            .enable_all_input_layouts()
            .enable_output_layout(DataLayout::Fb)
            .enable_batching()
            .enable_bias_per_feature()
            .enable_non_bias_term()
            .enable_subgroups();
        k
    }

    fn layouts(&self, _params: &FullyConnectedParams) -> (DataLayout, WeightsLayout) {
        (DataLayout::Fb, WeightsLayout::Io)
    }

    fn validate(&self, params: &FullyConnectedParams, options: &OptionalParams) -> bool {
        let output = params.output();
        let batches = output.batch().v;
        batches % 8 == 0
            && (output.length() / batches.max(1)) % 8 == 0
            && super::plan_layouts(params, DataLayout::Fb, WeightsLayout::Io, options).is_some()
    }

    fn set_default(&self, params: &FullyConnectedParams) -> Option<DispatchData> {
        let output = params.output();
        let (batch, responses) = (output.batch().v, output.feature().v);
        if batch == 0 || batch % UNITS_PER_SG_READ != 0 || responses == 0 || (responses * UNIT_BYTE_SIZE) % 4 != 0 {
            return None;
        }
        let mut dispatch = default_dispatch(params);
        dispatch.work_groups.global = [ceil_div(responses, UNITS_PER_SG_READ) * SUB_GROUP_SIZE, batch / UNITS_PER_SG_READ, 1];
        dispatch.work_groups.local = [SUB_GROUP_SIZE, 1, 1];
        Some(dispatch)
    }

    fn jit_constants(&self, engine: &EngineInfo, params: &FullyConnectedParams, dispatch: &DispatchData) -> JitConstants {
        let responses = params.output().feature().v;
        let mut jit = fully_connected_jit(engine, params);
        jit.define("SUB_GROUP_SIZE", dispatch.lws()[0])
            .define("WORK_ITEMS_PER_BATCH", dispatch.gws()[1])
            .define("UNIT_BYTE_SIZE", UNIT_BYTE_SIZE)
            .define("CHUNK_TYPE", "uint")
            .define("CHUNK_BYTE_SIZE", CHUNK_BYTE_SIZE)
            .define("UNITS_PER_CHUNK", UNITS_PER_CHUNK)
            .define("BYTES_PER_SG_READ", SUB_GROUP_SIZE * CHUNK_BYTE_SIZE)
            .define("UNITS_PER_SG_READ", UNITS_PER_SG_READ)
            .define("RG_COUNT", ceil_div(responses, UNITS_PER_SG_READ))
            .define("LAST_RG_SIZE", responses % UNITS_PER_SG_READ);
        jit
    }

    fn estimated_time(&self, params: &FullyConnectedParams) -> f32 {
        if params.input().dtype == Datatype::F16 && params.output().batch().v >= 16 {
            priority::FORCE_PRIORITY_3
        } else {
            priority::FORCE_PRIORITY_5
        }
    }
}
