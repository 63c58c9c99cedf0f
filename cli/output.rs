use anyhow::{Context, Result};
use colored::*;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use xflatten_core::{Disposition, FlattenEvent, FlattenProgress, FlattenReport, Offense, PlannedReference};

/// Prints run progress to stdout as it happens.
pub struct ConsoleProgress {
    quiet: bool,
    directive: String,
}

impl ConsoleProgress {
    pub fn new(quiet: bool, directive: &str) -> Self {
        Self {
            quiet,
            directive: directive.to_string(),
        }
    }
}

impl FlattenProgress for ConsoleProgress {
    fn report(&mut self, event: &FlattenEvent<'_>) {
        if self.quiet {
            log::trace!("Progress (quiet): {:?}", event);
            return;
        }
        match event {
            FlattenEvent::DirectivesFound { count } => {
                println!("Found {} {} statements", count.to_string().cyan(), self.directive);
            }
            FlattenEvent::Processing {
                index,
                total,
                reference,
            } => {
                println!("Processing {}/{}: {}", index, total, reference);
            }
            FlattenEvent::SkippedExcluded { reference } => {
                println!("{} {}", "Skipping excluded file:".yellow(), reference);
            }
            FlattenEvent::SkippedDuplicate {
                reference,
                canonical,
            } => {
                log::debug!("'{}' already inlined as {}", reference, canonical.display());
            }
            FlattenEvent::SkippedOutput { reference, path } => {
                println!(
                    "{} '{}' refers to the output file {}, skipping",
                    "Warning:".yellow().bold(),
                    reference,
                    path.display()
                );
            }
            FlattenEvent::Missing { path } => {
                println!(
                    "{} File not found: {}",
                    "Warning:".yellow().bold(),
                    path.display()
                );
            }
            FlattenEvent::ReadFailed { path, error } => {
                println!(
                    "{} Could not read {}: {}",
                    "Warning:".yellow().bold(),
                    path.display(),
                    error
                );
            }
            FlattenEvent::Inlined {
                path,
                lines_written,
                directives_rewritten,
                ..
            } => {
                log::debug!(
                    "Inlined {} ({} lines, {} directives re-pointed)",
                    path.display(),
                    lines_written,
                    directives_rewritten
                );
            }
        }
    }
}

pub fn print_flatten_header(root: &Path, output: &Path, quiet: bool) {
    if quiet {
        return;
    }
    println!("Reading root file from: {}", root.display().to_string().blue());
    println!("Output will be written to: {}", output.display().to_string().blue());
}

pub fn print_flatten_summary(report: &FlattenReport, output: &Path, quiet: bool) {
    if quiet {
        return;
    }
    println!(
        "{} Flattening complete! Output written to: {}",
        "✅".green(),
        output.display().to_string().blue()
    );
    println!(
        "Total files processed: {}",
        report.processed.len().to_string().cyan()
    );
    if report.warning_count() > 0 {
        println!(
            "{}",
            format!("{} warning(s) during flattening", report.warning_count()).yellow()
        );
    }
}

pub fn print_plan_table(plan: &[PlannedReference], entry_dir: &Path) -> Result<()> {
    if plan.is_empty() {
        println!("{}", "(No directives found in root file)".yellow());
        return Ok(());
    }
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("#").fg(Color::Green),
        Cell::new("Directive").fg(Color::Green),
        Cell::new("Resolved").fg(Color::Green),
        Cell::new("Dir").fg(Color::Green),
        Cell::new("Action").fg(Color::Green),
    ]);
    for (i, item) in plan.iter().enumerate() {
        let resolved = relative_display(&item.resolved, entry_dir);
        let (label, color) = match item.disposition {
            Disposition::Inline => ("inline", Color::Cyan),
            Disposition::Excluded => ("excluded", Color::Yellow),
            Disposition::Duplicate => ("duplicate", Color::DarkGrey),
            Disposition::Output => ("output file", Color::Red),
            Disposition::Missing => ("missing", Color::Red),
        };
        table.add_row(vec![
            Cell::new(i + 1).set_alignment(comfy_table::CellAlignment::Right),
            Cell::new(item.reference.as_str()),
            Cell::new(resolved).fg(Color::DarkGrey),
            Cell::new(&item.relative_dir),
            Cell::new(label).fg(color),
        ]);
    }
    println!("{table}");
    Ok(())
}

fn relative_display(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}

#[derive(Debug, Serialize)]
pub struct FileOffenses {
    pub path: PathBuf,
    pub offenses: Vec<Offense>,
}

pub fn print_lint_text(results: &[FileOffenses], files_inspected: usize, quiet: bool) {
    let mut total = 0;
    for file in results {
        for offense in &file.offenses {
            total += 1;
            println!(
                "{}:{}:{}: {} {}",
                file.path.display().to_string().cyan(),
                offense.line,
                offense.column,
                "W:".yellow(),
                offense.message
            );
        }
    }
    if quiet {
        return;
    }
    let summary = format!(
        "{} file(s) inspected, {} offense(s) detected",
        files_inspected, total
    );
    if total == 0 {
        println!("\n{}", summary.green());
    } else {
        println!("\n{}", summary.red());
    }
}

pub fn print_json<T: Serialize>(data: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(data).context("Failed to serialize JSON output")?;
    write_to_stdout(&content)
}

pub fn write_to_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let mut file =
        File::create(path).with_context(|| format!("Failed to create file {}", path.display()))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write to file {}", path.display()))?;
    Ok(())
}

pub fn write_to_stdout(content: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(content.as_bytes())
        .context("Failed to write to stdout")?;
    if !content.ends_with('\n') {
        handle
            .write_all(b"\n")
            .context("Failed to write newline to stdout")?;
    }
    handle.flush().context("Failed to flush stdout")?;
    Ok(())
}
