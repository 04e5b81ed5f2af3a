pub use context::{ComputeContext, EngineInfo};
pub use cost_table::{COST_TABLE_VERSION, CostEntry, CostTableFile, CostTables, format_hash, parse_hash, signature_hash};
pub use error::{KernelSelectorError, Result};
pub use kernel_base::{ClKernelData, KernelArgument, KernelData, KernelString, KernelsData, WeightsReorder};
pub use kernels::{KernelId, KernelImpl};
pub use params::{OptionalParams, Params};
pub use params_key::ParamsKey;
pub use selector::{KernelOverrides, KernelSelector, SelectedKernel, Selection, SelectionReason};
pub use template_db::{InMemoryTemplateDatabase, TemplateDatabase};

pub mod context;
pub mod cost_table;
pub mod dispatch;
pub mod error;
pub mod jit;
pub mod kernel_base;
pub mod kernels;
pub mod params;
pub mod params_key;
pub mod selector;
pub mod template_db;
pub mod tensor;
pub mod types;
pub mod weights_reorder;
