//! Argument parsing and the subcommands of the `kselect` binary.

pub mod commands;
pub mod config;
pub mod error;

pub use config::{CliConfig, Command};
pub use error::CliError;
