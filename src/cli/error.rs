use std::path::PathBuf;

use kselect::KernelSelectorError;
use kselect_costmodel::EmitError;
use thiserror::Error;

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// No curated layer carries this name
    #[error("unknown layer '{name}' (known: {known})")]
    UnknownLayer { name: String, known: String },

    #[error("unknown kernel family '{0}'")]
    UnknownFamily(String),

    #[error(transparent)]
    Selector(#[from] KernelSelectorError),

    #[error(transparent)]
    Emit(#[from] EmitError),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
