mod cli_args;
mod commands;
mod output;

use anyhow::{Context, Result};
use clap::Parser;
use clap::error::ErrorKind;
use colored::*;
use log;
use std::env;
use std::process;

use cli_args::{Cli, Commands, ConfigFileOpts, FlattenRulesOpts, SyntaxOpts};
use xflatten_core::{AppError, Config, Replacement};

fn main() {
    let cli_args = match Cli::try_parse() {
        Ok(args) => args,
        Err(e) => process::exit(report_usage_error(e)),
    };

    setup_logging(cli_args.quiet, cli_args.verbose);

    let quiet = cli_args.quiet;

    log::debug!("CLI args parsed: {:?}", cli_args);

    let exit_code = match run_app(cli_args, quiet) {
        Ok(code) => {
            log::info!("Application finished with code {}.", code);
            code
        }
        Err(e) => {
            let exit_code = exit_code_for(&e);
            if !quiet || exit_code == 2 {
                eprintln!("{} {:#}", "Error:".red().bold(), e);
            } else {
                log::error!("Application failed: {:#}", e);
            }
            exit_code
        }
    };
    log::debug!("Exiting with code {}", exit_code);
    process::exit(exit_code);
}

/// Help and version go out normally; anything else (a missing root path
/// included) prints the usage text to stdout and exits with 1.
fn report_usage_error(e: clap::Error) -> i32 {
    match e.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            let _ = e.print();
            0
        }
        _ => {
            println!("{}", e.render());
            1
        }
    }
}

fn exit_code_for(e: &anyhow::Error) -> i32 {
    match e.downcast_ref::<AppError>() {
        Some(AppError::Config(_)) => 2,
        Some(AppError::TomlParse(_)) => 2,
        Some(AppError::TomlSerialize(_)) => 2,
        Some(AppError::Pattern(_)) => 2,
        Some(AppError::RootNotFound(_)) => 1,
        Some(AppError::FileRead { .. }) => 1,
        Some(AppError::FileWrite { .. }) => 1,
        Some(AppError::DirCreation { .. }) => 1,
        Some(AppError::Io(_)) => 1,
        Some(AppError::InvalidArgument(_)) => 1,
        Some(_) => 1,
        None => 1,
    }
}

fn setup_logging(quiet: bool, verbose: u8) {
    let log_level = if quiet {
        log::LevelFilter::Off
    } else {
        match verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();
    log::trace!("Logger initialized with level: {:?}", log_level);
}

fn run_app(cli: Cli, quiet: bool) -> Result<i32> {
    let Some(command) = cli.command else {
        // arg_required_else_help already covers a bare invocation
        return Ok(1);
    };
    match command {
        Commands::Flatten(args) => {
            log::debug!("Executing 'flatten' command...");
            commands::flatten::handle_flatten_command(args, quiet)?;
        }
        Commands::Plan(args) => {
            log::debug!("Executing 'plan' command...");
            commands::plan::handle_plan_command(args)?;
        }
        Commands::Lint(args) => {
            log::debug!("Executing 'lint' command...");
            if !commands::lint::handle_lint_command(args, quiet)? {
                return Ok(1);
            }
        }
        Commands::Config(args) => {
            log::debug!("Executing 'config' command...");
            let project_root = env::current_dir().context("Failed to determine working directory")?;
            commands::config::handle_config_command(&args, &project_root, quiet)?;
        }
    }
    Ok(0)
}

fn merge_config_with_cli_overrides(
    mut config: Config,
    syntax: &SyntaxOpts,
    rules: Option<&FlattenRulesOpts>,
) -> Config {
    log::trace!("Applying CLI overrides to config...");

    if let Some(directive) = &syntax.directive {
        config.syntax.directive = directive.clone();
    }
    if let Some(extension) = &syntax.extension {
        config.syntax.extension = extension.trim_start_matches('.').to_string();
    }
    if let Some(marker) = &syntax.comment_marker {
        config.syntax.comment_marker = marker.clone();
    }

    if let Some(rules) = rules {
        config.flatten.exclude.extend(rules.exclude.iter().cloned());
        config.flatten.replacements.extend(
            rules
                .replace
                .chunks_exact(2)
                .map(|pair| Replacement::new(pair[0].clone(), pair[1].clone())),
        );
    }

    log::trace!("Config after CLI overrides: {:?}", config);
    config
}

/// Loads the config file (if any) from the working directory and applies the
/// command's overrides.
pub fn load_config_for_command(
    config_opts: &ConfigFileOpts,
    syntax: &SyntaxOpts,
    rules: Option<&FlattenRulesOpts>,
) -> Result<Config> {
    let project_root = env::current_dir().context("Failed to determine working directory")?;
    let config_path = Config::resolve_config_path(
        &project_root,
        config_opts.config_file.as_ref(),
        config_opts.no_config,
    )
    .context("Failed to resolve configuration path")?;

    let config = match &config_path {
        Some(path) => Config::load_from_path(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    let config = merge_config_with_cli_overrides(config, syntax, rules);
    config
        .validate()
        .context("Invalid configuration after applying command-line overrides")?;
    Ok(config)
}
