use std::path::PathBuf;

use clap::{Parser, Subcommand};
use kselect::{KernelOverrides, types::KernelType};
use tracing::Level;

use crate::cli::error::CliError;

/// Command-line interface of the kselect kernel selection engine
#[derive(Debug, Parser)]
#[command(name = "kselect")]
#[command(about = "Pick and specialise GPU kernels for neural network layers", long_about = None)]
pub struct CliConfig {
    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List registered kernels with their static priority
    List {
        /// Only this family (e.g. convolution, pooling)
        #[arg(long, value_parser = parse_family)]
        family: Option<KernelType>,
    },
    /// Run selection for a curated layer
    Select {
        /// Curated layer name (e.g. conv1, pool1, fc6)
        #[arg(long)]
        layer: String,

        /// Kernel that bypasses ranking when it can serve the layer
        #[arg(long = "force", value_name = "KERNEL")]
        force: Vec<String>,

        /// Kernel excluded from selection
        #[arg(long = "deny", value_name = "KERNEL")]
        deny: Vec<String>,
    },
    /// Convert a calibration data file into Rust source
    EmitTable {
        #[arg(long)]
        input: PathBuf,

        /// Defaults to standard output
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

pub fn parse_family(text: &str) -> Result<KernelType, CliError> {
    KernelType::ALL
        .iter()
        .copied()
        .find(|family| family.as_str().eq_ignore_ascii_case(text))
        .ok_or_else(|| CliError::UnknownFamily(text.to_string()))
}

impl CliConfig {
    /// `base` raised by one level per `-v`.
    pub fn log_level(&self, base: Level) -> Level {
        match self.verbose {
            0 => base,
            1 => base.max(Level::DEBUG),
            _ => Level::TRACE,
        }
    }

    /// Flag overrides layered over `environment`; flags win conflicts.
    pub fn overrides(&self, environment: &KernelOverrides) -> Result<KernelOverrides, CliError> {
        match &self.command {
            Command::Select { force, deny, .. } => {
                let flags = KernelOverrides::from_names(force.clone(), deny.clone())?;
                Ok(environment.merge(&flags))
            }
            _ => Ok(environment.clone()),
        }
    }
}

#[path = "config.test.rs"]
mod tests;
