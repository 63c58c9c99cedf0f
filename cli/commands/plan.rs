use crate::cli_args::PlanArgs;
use crate::load_config_for_command;
use crate::output;
use anyhow::{Context, Result};
use log;
use xflatten_core::{EntryFile, FlattenSettings, Flattener};

pub fn handle_plan_command(args: PlanArgs) -> Result<()> {
    let config = load_config_for_command(&args.config, &args.syntax, Some(&args.rules))
        .context("Failed to load configuration")?;
    let settings = FlattenSettings::from_config(&config).context("Invalid flatten settings")?;

    let entry = EntryFile::locate(&args.root)?;
    let entry_dir = entry.dir().to_path_buf();
    let plan = Flattener::new(entry, settings)
        .with_output_path(&config.flatten.output_file)
        .plan()
        .with_context(|| format!("Failed to plan {}", args.root.display()))?;
    log::debug!("Planned {} directives", plan.len());

    match args.format.as_str() {
        "json" => output::print_json(&plan),
        _ => output::print_plan_table(&plan, &entry_dir),
    }
}
