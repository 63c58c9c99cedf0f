use crate::cli_args::LintArgs;
use crate::load_config_for_command;
use crate::output::{self, FileOffenses};
use anyhow::{Context, Result};
use log;
use xflatten_core::{TodoCommentRule, lint, lint_file};

/// Returns `Ok(true)` when no offenses were found.
pub fn handle_lint_command(args: LintArgs, quiet: bool) -> Result<bool> {
    let mut config = load_config_for_command(&args.config, &args.syntax, None)
        .context("Failed to load configuration")?;
    if !args.keywords.is_empty() {
        config.lint.keywords = args.keywords.clone();
    }
    let marker = config.syntax.comment_marker.as_str();
    let rule = TodoCommentRule::new(&config.lint.keywords, marker)
        .context("Failed to build lint rule")?;
    log::debug!("Lint keywords: {:?}", rule.keywords().collect::<Vec<_>>());

    let targets = lint::collect_lint_targets(&args.paths, &config.syntax.extension)
        .context("Failed to collect files to lint")?;

    let mut results = Vec::new();
    for path in &targets {
        match lint_file(path, &rule, marker) {
            Ok(offenses) if offenses.is_empty() => {}
            Ok(offenses) => results.push(FileOffenses {
                path: path.clone(),
                offenses,
            }),
            Err(e) => log::warn!("Skipping {}: {}", path.display(), e),
        }
    }

    match args.format.as_str() {
        "json" => output::print_json(&results)?,
        _ => output::print_lint_text(&results, targets.len(), quiet),
    }
    Ok(results.is_empty())
}
