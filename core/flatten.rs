//! Flattening run: walks the entry file's directives once, inlining each direct
//! child at most once and re-pointing the directives found inside it.
//!
//! Only direct children of the entry file are inlined. Directives inside an
//! inlined child stay live in the output; they are rewritten to resolve from
//! the output file's directory, never expanded.

use crate::config::Config;
use crate::directive::{DirectiveMatcher, ReferencePath, SourceSyntax};
use crate::error::{AppError, Result};
use crate::extract::extract_references;
use crate::relocate::{
    LineOutcome, LineTransformer, Replacement, ReplacementSet, canonical_path, lexical_normalize,
    relative_dir,
};
use indexmap::IndexSet;
use log;
#[cfg(feature = "serde_support")]
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// The root source of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryFile {
    path: PathBuf,
    dir: PathBuf,
}

impl EntryFile {
    pub fn locate(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(AppError::RootNotFound(path.to_path_buf()));
        }
        let absolute = std::path::absolute(path)?;
        let dir = absolute
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(Self {
            path: absolute,
            dir,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Base for resolving every directive path.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[derive(Debug, Clone)]
pub struct FlattenSettings {
    matcher: DirectiveMatcher,
    exclusions: IndexSet<ReferencePath>,
    replacements: Vec<Replacement>,
}

impl Default for FlattenSettings {
    fn default() -> Self {
        Self {
            matcher: DirectiveMatcher::default_syntax().clone(),
            exclusions: IndexSet::new(),
            replacements: Vec::new(),
        }
    }
}

impl FlattenSettings {
    pub fn new(syntax: SourceSyntax) -> Result<Self> {
        Ok(Self {
            matcher: DirectiveMatcher::new(syntax)?,
            ..Self::default()
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config.syntax.clone())?
            .with_exclusions(&config.flatten.exclude)
            .with_replacements(config.flatten.replacements.iter().cloned()))
    }

    pub fn with_exclusions<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for path in paths {
            let normalized = ReferencePath::normalize(path.as_ref(), self.matcher.syntax());
            log::trace!("Excluding '{}'", normalized);
            self.exclusions.insert(normalized);
        }
        self
    }

    pub fn with_replacements<I>(mut self, replacements: I) -> Self
    where
        I: IntoIterator<Item = Replacement>,
    {
        self.replacements.extend(replacements);
        self
    }

    pub fn matcher(&self) -> &DirectiveMatcher {
        &self.matcher
    }

    pub fn replacements(&self) -> &[Replacement] {
        &self.replacements
    }

    pub fn is_excluded(&self, reference: &ReferencePath) -> bool {
        self.exclusions.contains(reference)
    }
}

#[derive(Debug)]
pub enum FlattenEvent<'a> {
    DirectivesFound {
        count: usize,
    },
    Processing {
        index: usize,
        total: usize,
        reference: &'a ReferencePath,
    },
    SkippedExcluded {
        reference: &'a ReferencePath,
    },
    SkippedDuplicate {
        reference: &'a ReferencePath,
        canonical: &'a Path,
    },
    /// The directive points at the file being written.
    SkippedOutput {
        reference: &'a ReferencePath,
        path: &'a Path,
    },
    Missing {
        path: &'a Path,
    },
    ReadFailed {
        path: &'a Path,
        error: &'a io::Error,
    },
    Inlined {
        reference: &'a ReferencePath,
        path: &'a Path,
        lines_written: usize,
        directives_rewritten: usize,
    },
}


/// Receives progress while a run is in flight.
pub trait FlattenProgress {
    fn report(&mut self, event: &FlattenEvent<'_>);
}

impl FlattenProgress for () {
    fn report(&mut self, _event: &FlattenEvent<'_>) {}
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde_support", derive(Serialize))]
pub struct FlattenReport {
    pub entry: PathBuf,
    pub directives_found: usize,
    /// Canonical paths in the order they entered the processed set.
    pub processed: Vec<PathBuf>,
    pub inlined: Vec<PathBuf>,
    pub excluded: Vec<ReferencePath>,
    pub duplicates: usize,
    pub self_references: usize,
    pub missing: Vec<PathBuf>,
    pub unreadable: Vec<PathBuf>,
    pub lines_written: usize,
    pub directives_rewritten: usize,
}

impl FlattenReport {
    pub fn warning_count(&self) -> usize {
        self.missing.len() + self.unreadable.len() + self.self_references
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde_support", derive(Serialize))]
#[cfg_attr(feature = "serde_support", serde(rename_all = "snake_case"))]
pub enum Disposition {
    Inline,
    Excluded,
    Duplicate,
    Output,
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde_support", derive(Serialize))]
pub struct PlannedReference {
    pub reference: ReferencePath,
    pub resolved: PathBuf,
    pub relative_dir: String,
    pub disposition: Disposition,
}

enum Resolution {
    Excluded,
    Duplicate(PathBuf),
    Output(PathBuf),
    Missing(PathBuf),
    Inline { target: PathBuf, relative_dir: String },
}

/// One flattening run. Consumed by [`Flattener::run`] or [`Flattener::plan`],
/// so the processed set never leaks into another run.
#[derive(Debug)]
pub struct Flattener {
    entry: EntryFile,
    settings: FlattenSettings,
    output_path: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    processed: IndexSet<PathBuf>,
}

impl Flattener {
    pub fn new(entry: EntryFile, settings: FlattenSettings) -> Self {
        Self {
            entry,
            settings,
            output_path: None,
            output_dir: None,
            processed: IndexSet::new(),
        }
    }

    /// Directives resolving to `path` are skipped instead of read back while
    /// the output is being written, and re-pointed directives are made
    /// relative to the directory `path` sits in.
    pub fn with_output_path(mut self, path: &Path) -> Self {
        self.output_path = Some(canonical_path(path));
        let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        self.output_dir = lexical_normalize(&absolute).parent().map(Path::to_path_buf);
        self
    }

    pub fn run<W: Write>(
        mut self,
        mut out: W,
        progress: &mut dyn FlattenProgress,
    ) -> Result<FlattenReport> {
        let references = extract_references(self.entry.path(), self.settings.matcher())?;
        let replacements = ReplacementSet::compile(self.settings.replacements())?;
        let total = references.len();
        progress.report(&FlattenEvent::DirectivesFound { count: total });

        let mut report = FlattenReport {
            entry: self.entry.path().to_path_buf(),
            directives_found: total,
            ..FlattenReport::default()
        };

        for (i, reference) in references.iter().enumerate() {
            progress.report(&FlattenEvent::Processing {
                index: i + 1,
                total,
                reference,
            });
            match self.resolve(reference) {
                Resolution::Excluded => {
                    log::debug!("Skipping excluded file: {}", reference);
                    report.excluded.push(reference.clone());
                    progress.report(&FlattenEvent::SkippedExcluded { reference });
                }
                Resolution::Duplicate(canonical) => {
                    log::debug!("Already inlined: {}", canonical.display());
                    report.duplicates += 1;
                    progress.report(&FlattenEvent::SkippedDuplicate {
                        reference,
                        canonical: &canonical,
                    });
                }
                Resolution::Output(path) => {
                    report.self_references += 1;
                    progress.report(&FlattenEvent::SkippedOutput {
                        reference,
                        path: &path,
                    });
                }
                Resolution::Missing(path) => {
                    report.missing.push(path.clone());
                    progress.report(&FlattenEvent::Missing { path: &path });
                }
                Resolution::Inline {
                    target,
                    relative_dir,
                } => {
                    let transformer = LineTransformer::new(
                        self.settings.matcher(),
                        &replacements,
                        relative_dir,
                    );
                    relocate_file(
                        reference,
                        &target,
                        &transformer,
                        &mut out,
                        progress,
                        &mut report,
                    )?;
                }
            }
        }

        out.flush()?;
        report.processed = self.processed.into_iter().collect();
        log::debug!(
            "Run complete: {} processed, {} inlined, {} lines written",
            report.processed.len(),
            report.inlined.len(),
            report.lines_written
        );
        Ok(report)
    }

    /// Resolves every directive of the entry file the way [`Flattener::run`]
    /// would, without reading children or writing anything.
    pub fn plan(mut self) -> Result<Vec<PlannedReference>> {
        let references = extract_references(self.entry.path(), self.settings.matcher())?;
        let mut planned = Vec::with_capacity(references.len());
        for reference in references {
            let resolved = self.entry.dir().join(reference.as_str());
            let relative_dir = relative_dir(self.rewrite_base(), &resolved);
            let disposition = match self.resolve(&reference) {
                Resolution::Excluded => Disposition::Excluded,
                Resolution::Duplicate(_) => Disposition::Duplicate,
                Resolution::Output(_) => Disposition::Output,
                Resolution::Missing(_) => Disposition::Missing,
                Resolution::Inline { .. } => Disposition::Inline,
            };
            planned.push(PlannedReference {
                reference,
                resolved,
                relative_dir,
                disposition,
            });
        }
        Ok(planned)
    }

    /// Directory the output's directives are resolved from. Without an output
    /// file that is the entry directory.
    fn rewrite_base(&self) -> &Path {
        self.output_dir.as_deref().unwrap_or(self.entry.dir())
    }

    fn resolve(&mut self, reference: &ReferencePath) -> Resolution {
        if self.settings.is_excluded(reference) {
            return Resolution::Excluded;
        }
        let target = self.entry.dir().join(reference.as_str());
        let canonical = canonical_path(&target);
        if self.processed.contains(&canonical) {
            return Resolution::Duplicate(canonical);
        }
        self.processed.insert(canonical.clone());

        if self.output_path.as_ref() == Some(&canonical) {
            return Resolution::Output(target);
        }
        if !target.exists() {
            return Resolution::Missing(target);
        }
        let relative_dir = relative_dir(self.rewrite_base(), &target);
        Resolution::Inline {
            target,
            relative_dir,
        }
    }
}

/// Streams one child into `out`. Read failures are reported and leave any
/// lines already written in place; write failures abort the run.
fn relocate_file<W: Write>(
    reference: &ReferencePath,
    path: &Path,
    transformer: &LineTransformer<'_>,
    out: &mut W,
    progress: &mut dyn FlattenProgress,
    report: &mut FlattenReport,
) -> Result<()> {
    log::debug!(
        "Inlining {} (relative dir '{}')",
        path.display(),
        transformer.relative_dir()
    );
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            report.unreadable.push(path.to_path_buf());
            progress.report(&FlattenEvent::ReadFailed { path, error: &e });
            return Ok(());
        }
    };

    let mut reader = BufReader::new(file);
    let mut buffer = Vec::new();
    let mut lines_written = 0;
    let mut directives_rewritten = 0;
    loop {
        buffer.clear();
        match reader.read_until(b'\n', &mut buffer) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                report.lines_written += lines_written;
                report.directives_rewritten += directives_rewritten;
                report.unreadable.push(path.to_path_buf());
                progress.report(&FlattenEvent::ReadFailed { path, error: &e });
                return Ok(());
            }
        }
        // Only the '\n' terminator is dropped; a '\r' stays with the line.
        let line = buffer.strip_suffix(b"\n").unwrap_or(&buffer);
        match transformer.transform(line) {
            LineOutcome::Dropped => continue,
            LineOutcome::Kept(text) => write_line(out, &text)?,
            LineOutcome::Rewritten { line, .. } => {
                directives_rewritten += 1;
                write_line(out, &line)?;
            }
        }
        lines_written += 1;
    }

    report.lines_written += lines_written;
    report.directives_rewritten += directives_rewritten;
    report.inlined.push(path.to_path_buf());
    progress.report(&FlattenEvent::Inlined {
        reference,
        path,
        lines_written,
        directives_rewritten,
    });
    Ok(())
}

fn write_line<W: Write>(out: &mut W, line: &[u8]) -> io::Result<()> {
    out.write_all(line)?;
    out.write_all(b"\n")
}

/// Flattens `entry` into a freshly created `output` file. The output may not
/// be the entry file itself.
pub fn flatten_to_file(
    entry: &Path,
    output: &Path,
    settings: FlattenSettings,
    progress: &mut dyn FlattenProgress,
) -> Result<FlattenReport> {
    let entry = EntryFile::locate(entry)?;
    if canonical_path(entry.path()) == canonical_path(output) {
        return Err(AppError::InvalidArgument(format!(
            "Output file {} is the root file itself",
            output.display()
        )));
    }

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| AppError::DirCreation {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    let file = File::create(output).map_err(|e| AppError::FileWrite {
        path: output.to_path_buf(),
        source: e,
    })?;
    let mut writer = BufWriter::new(file);

    let report = Flattener::new(entry, settings)
        .with_output_path(output)
        .run(&mut writer, progress)
        .map_err(|e| match e {
            AppError::Io(source) => AppError::FileWrite {
                path: output.to_path_buf(),
                source,
            },
            other => other,
        })?;
    writer.flush().map_err(|e| AppError::FileWrite {
        path: output.to_path_buf(),
        source: e,
    })?;
    Ok(report)
}

/// Flattens `entry` into memory. Directives are re-pointed relative to the
/// entry directory, and bytes that are not UTF-8 are replaced.
pub fn flatten_to_string(entry: &Path, settings: FlattenSettings) -> Result<(String, FlattenReport)> {
    let entry = EntryFile::locate(entry)?;
    let mut buffer = Vec::new();
    let report = Flattener::new(entry, settings).run(&mut buffer, &mut ())?;
    let text = String::from_utf8_lossy(&buffer).into_owned();
    Ok((text, report))
}
