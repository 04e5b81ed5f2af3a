use anyhow::Result;
use clap::Parser;
use kselect::{CostTables, KernelOverrides};
use kselect_instrumentation::{AppConfig, init_logging};

mod cli;

use cli::{CliConfig, Command, commands};

fn main() -> Result<()> {
    let cli = CliConfig::parse();
    let mut config = AppConfig::from_env()?;
    config.log_level = cli.log_level(config.log_level);
    init_logging(&config);

    let output = match &cli.command {
        Command::List { family } => commands::list(*family),
        Command::Select { layer, .. } => {
            let tables = match &config.cost_table_path {
                Some(path) => CostTables::load_file(path)?,
                None => CostTables::new(),
            };
            let overrides = cli.overrides(&KernelOverrides::from_environment())?;
            commands::select(commands::placeholder_context(tables), layer, overrides)?
        }
        Command::EmitTable { input, output } => {
            let source = commands::emit_table(input, output.as_deref())?;
            if output.is_some() { String::new() } else { source }
        }
    };
    print!("{output}");
    Ok(())
}
