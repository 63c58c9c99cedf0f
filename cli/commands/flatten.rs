use crate::cli_args::FlattenArgs;
use crate::load_config_for_command;
use crate::output::{self, ConsoleProgress};
use anyhow::{Context, Result};
use log;
use xflatten_core::{FlattenSettings, flatten_to_file};

pub fn handle_flatten_command(args: FlattenArgs, quiet: bool) -> Result<()> {
    let config = load_config_for_command(&args.config, &args.syntax, Some(&args.rules))
        .context("Failed to load configuration")?;

    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| config.flatten.output_file.clone());
    log::info!(
        "Flattening {} into {}",
        args.root.display(),
        output_path.display()
    );
    output::print_flatten_header(&args.root, &output_path, quiet);

    let settings = FlattenSettings::from_config(&config).context("Invalid flatten settings")?;
    let mut progress = ConsoleProgress::new(quiet, &config.syntax.directive);
    let report = flatten_to_file(&args.root, &output_path, settings, &mut progress)
        .with_context(|| format!("Failed to flatten {}", args.root.display()))?;

    log::debug!("Flatten report: {:?}", report);
    output::print_flatten_summary(&report, &output_path, quiet);
    Ok(())
}
