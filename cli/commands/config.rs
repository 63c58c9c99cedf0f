use crate::cli_args::ConfigArgs;
use crate::output;
use anyhow::{Context, Result, bail};
use colored::Colorize;
use log;
use std::path::Path;
use xflatten_core::Config;
use xflatten_core::config::{DEFAULT_CONFIG_DIR, DEFAULT_CONFIG_FILENAME};

pub fn handle_config_command(args: &ConfigArgs, project_root: &Path, quiet: bool) -> Result<()> {
    let content = Config::default()
        .to_toml_string()
        .context("Failed to serialize default configuration")?;

    if !args.save {
        return output::write_to_stdout(&content);
    }

    let path = project_root
        .join(DEFAULT_CONFIG_DIR)
        .join(DEFAULT_CONFIG_FILENAME);
    if path.exists() && !args.force {
        bail!(
            "Config file already exists at {} (use --force to overwrite)",
            path.display()
        );
    }
    log::info!("Saving default configuration to {}", path.display());
    output::write_to_file(&path, &content)?;
    if !quiet {
        println!(
            "{} Default config saved to: {}",
            "✅".green(),
            path.display().to_string().blue()
        );
    }
    Ok(())
}
