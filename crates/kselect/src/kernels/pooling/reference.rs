use super::PoolingKernel;
use crate::{kernels::KernelId, params_key::ParamsKey, tensor::DataLayout, types::{Datatype, KernelDividerMode, PoolRemainder, PoolType}};

/// One output element per work item, every pooling mode.
#[derive(Clone, Copy, Debug, Default)]
pub struct PoolingRef;

impl PoolingKernel for PoolingRef {
    const ID: KernelId = KernelId::PoolingRef;

    fn supported_key(&self) -> ParamsKey {
        let mut k = ParamsKey::new();
        k.enable_input_data_type(Datatype::F16)
            .enable_input_data_type(Datatype::F32)
            .enable_output_data_type(Datatype::F16)
            .enable_output_data_type(Datatype::F32);
        for layout in [DataLayout::Bfyx, DataLayout::Yxfb, DataLayout::Byxf] {
            k.enable_input_layout(layout).enable_output_layout(layout);
        }
        k.enable_tensor_offset().enable_tensor_pitches().enable_batching();
        for &pool_type in PoolType::ALL {
            k.enable_pool_type(pool_type);
        }
        for &remainder in PoolRemainder::ALL {
            k.enable_pool_remainder(remainder);
        }
        for &mode in KernelDividerMode::ALL {
            k.enable_pool_kernel_divider_mode(mode);
        }
        k
    }
}
