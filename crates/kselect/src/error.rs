use std::path::PathBuf;

use thiserror::Error;

use crate::types::KernelType;

#[derive(Debug, Error)]
pub enum KernelSelectorError {
    #[error("jit constant '{name}' is defined more than once")]
    DuplicateJitDefinition { name: String },
    #[error("reorder destination holds {actual} bytes but the layout needs {expected}")]
    ReorderSizeMismatch { expected: usize, actual: usize },
    #[error("reorder source holds {actual} bytes but the tensor describes {expected}")]
    ReorderSourceMismatch { expected: usize, actual: usize },
    #[error("no CPU reorder from {from} to {to}")]
    UnsupportedReorder { from: String, to: String },
    #[error("unknown kernel '{0}'")]
    UnknownKernel(String),
    #[error("params for {actual} passed to a {expected} selector")]
    FamilyMismatch { expected: KernelType, actual: KernelType },
    #[error("cost table {path}: {source}")]
    CostTableIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cost table {path}: {source}")]
    CostTableFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("cost table version {found} is not supported (expected {expected})")]
    CostTableVersion { found: u32, expected: u32 },
    #[error("cost table hash '{0}' is not a 64-bit hex value")]
    CostTableHash(String),
}

pub type Result<T, E = KernelSelectorError> = std::result::Result<T, E>;
