//! Moving a file's lines into the flattened output: comment stripping, literal
//! replacements, and re-pointing nested directives so they still resolve from
//! the directory of the output file.
//!
//! Lines are handled as raw bytes. Only the directive literal itself is read as
//! text, so sources in any ASCII-compatible encoding pass through untouched.

use crate::directive::{DirectiveMatcher, SourceSyntax, is_comment_only};
use crate::error::Result;
use log;
use regex::bytes::{NoExpand, Regex};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fs;
use std::path::{Component, Path, PathBuf};

pub const CURRENT_DIR: &str = ".";

/// An exact substring replacement applied to every kept line.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Replacement {
    pub from: String,
    pub to: String,
}

impl Replacement {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Compiled form of the configured replacements, applied in order to raw line
/// bytes. Entries with an empty `from` are ignored.
#[derive(Debug, Clone, Default)]
pub struct ReplacementSet {
    rules: Vec<(Regex, Vec<u8>)>,
}

impl ReplacementSet {
    pub fn compile(replacements: &[Replacement]) -> Result<Self> {
        let mut rules = Vec::with_capacity(replacements.len());
        for r in replacements.iter().filter(|r| !r.from.is_empty()) {
            let pattern = Regex::new(&regex::escape(&r.from))?;
            rules.push((pattern, r.to.as_bytes().to_vec()));
        }
        Ok(Self { rules })
    }

    pub fn apply<'a>(&self, line: &'a [u8]) -> Cow<'a, [u8]> {
        let mut current = Cow::Borrowed(line);
        for (pattern, to) in &self.rules {
            let replaced = match pattern.replace_all(&current, NoExpand(to.as_slice())) {
                Cow::Owned(replaced) => replaced,
                Cow::Borrowed(_) => continue,
            };
            current = Cow::Owned(replaced);
        }
        current
    }
}

/// Resolves `.` and `..` without touching the filesystem.
pub fn lexical_normalize(path: &Path) -> PathBuf {
    let mut parts: Vec<Component> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }
    parts.iter().collect()
}

/// Dedup key for a file. Existing files are fully resolved (symlinks included);
/// missing ones fall back to their lexically normalized absolute form.
pub fn canonical_path(path: &Path) -> PathBuf {
    match fs::canonicalize(path) {
        Ok(resolved) => resolved,
        Err(e) => {
            log::trace!(
                "Cannot canonicalize {} ({}), using lexical form",
                path.display(),
                e
            );
            let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
            lexical_normalize(&absolute)
        }
    }
}

/// Directory of `target`, relative to `base_dir`, as a `/`-separated string.
/// Returns `.` when the target sits directly in `base_dir`.
pub fn relative_dir(base_dir: &Path, target: &Path) -> String {
    let target = lexical_normalize(target);
    let target_dir = target.parent().unwrap_or(Path::new(""));
    let base = lexical_normalize(base_dir);
    let rel = pathdiff::diff_paths(target_dir, &base).unwrap_or_else(|| target_dir.to_path_buf());
    let segments: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect();
    if segments.is_empty() {
        CURRENT_DIR.to_string()
    } else {
        segments.join("/")
    }
}

/// Joins two `/`-separated relative paths, collapsing `.` and `..` segments.
/// Leading `..` segments that cannot be collapsed are kept.
pub fn join_relative(dir: &str, path: &str) -> String {
    if path.starts_with('/') {
        return path.to_string();
    }
    let mut segments: Vec<&str> = Vec::new();
    for segment in dir.split('/').chain(path.split('/')) {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }
    if segments.is_empty() {
        CURRENT_DIR.to_string()
    } else {
        segments.join("/")
    }
}

/// Re-expresses a directive path declared inside a file at `dir` (relative to
/// the output's base directory) so it resolves from that base instead.
pub fn rewrite_reference(dir: &str, declared: &str, syntax: &SourceSyntax) -> String {
    let stripped = syntax.strip_extension(declared);
    if dir == CURRENT_DIR {
        stripped.to_string()
    } else {
        join_relative(dir, stripped)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome<'a> {
    /// Blank or comment-only line, not written.
    Dropped,
    Kept(Cow<'a, [u8]>),
    /// A directive whose literal now points at `target`.
    Rewritten { line: Vec<u8>, target: String },
}

/// Per-file line transformer; `relative_dir` is the file's own directory
/// relative to the directory the output is resolved from.
pub struct LineTransformer<'a> {
    matcher: &'a DirectiveMatcher,
    replacements: &'a ReplacementSet,
    relative_dir: String,
}

impl<'a> LineTransformer<'a> {
    pub fn new(
        matcher: &'a DirectiveMatcher,
        replacements: &'a ReplacementSet,
        relative_dir: impl Into<String>,
    ) -> Self {
        Self {
            matcher,
            replacements,
            relative_dir: relative_dir.into(),
        }
    }

    pub fn relative_dir(&self) -> &str {
        &self.relative_dir
    }

    pub fn transform<'l>(&self, line: &'l [u8]) -> LineOutcome<'l> {
        let syntax = self.matcher.syntax();
        if is_comment_only(line, &syntax.comment_marker) {
            return LineOutcome::Dropped;
        }
        let replaced = self.replacements.apply(line);
        match self.matcher.parse(&replaced) {
            Some(directive) => {
                let target = rewrite_reference(&self.relative_dir, &directive.path, syntax);
                let line = self.matcher.rewrite(&replaced, &target);
                log::trace!("Rewrote directive '{}' -> '{}'", directive.path, target);
                LineOutcome::Rewritten { line, target }
            }
            None => LineOutcome::Kept(replaced),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn syntax() -> SourceSyntax {
        SourceSyntax::default()
    }

    #[test]
    fn lexical_normalize_collapses_segments() {
        assert_eq!(
            lexical_normalize(Path::new("/a/b/./c/../d.rb")),
            PathBuf::from("/a/b/d.rb")
        );
        assert_eq!(lexical_normalize(Path::new("/../x")), PathBuf::from("/x"));
        assert_eq!(lexical_normalize(Path::new("../x/./y")), PathBuf::from("../x/y"));
    }

    #[test]
    fn relative_dir_of_sibling_is_current() {
        assert_eq!(relative_dir(Path::new("/p/lib"), Path::new("/p/lib/a.rb")), ".");
        assert_eq!(
            relative_dir(Path::new("/p/lib"), Path::new("/p/lib/./x/../a.rb")),
            "."
        );
    }

    #[test]
    fn relative_dir_handles_depth_and_parents() {
        assert_eq!(
            relative_dir(Path::new("/p/lib"), Path::new("/p/lib/b/c.rb")),
            "b"
        );
        assert_eq!(
            relative_dir(Path::new("/p/lib"), Path::new("/p/lib/b/c/d/e.rb")),
            "b/c/d"
        );
        assert_eq!(
            relative_dir(Path::new("/p/lib"), Path::new("/p/other/e.rb")),
            "../other"
        );
    }

    #[test]
    fn rewrite_reference_rules() {
        let s = syntax();
        assert_eq!(rewrite_reference(".", "d.rb", &s), "d");
        assert_eq!(rewrite_reference(".", "./d", &s), "./d");
        assert_eq!(rewrite_reference("b", "x.rb", &s), "b/x");
        assert_eq!(rewrite_reference("b/c", "mixin/x", &s), "b/c/mixin/x");
        assert_eq!(rewrite_reference("b/c", "../x", &s), "b/x");
        assert_eq!(rewrite_reference("b", "../../x", &s), "../x");
        assert_eq!(rewrite_reference("../other", "y", &s), "../other/y");
    }

    #[test]
    fn replacements_are_exact_and_ordered() {
        let reps = ReplacementSet::compile(&[
            Replacement::new("'..', '..'", "'..'"),
            Replacement::new("'..'", "'.'"),
            Replacement::new("", "x"),
        ])
        .unwrap();
        assert_eq!(
            reps.apply(b"File.join(__dir__, '..', '..')"),
            &b"File.join(__dir__, '.')"[..]
        );
        assert!(matches!(reps.apply(b"nothing here"), Cow::Borrowed(_)));
        assert_eq!(
            ReplacementSet::compile(&[Replacement::new("$1.*", "${x}")])
                .unwrap()
                .apply(b"a $1.* b"),
            &b"a ${x} b"[..]
        );
    }

    #[test]
    fn replacements_keep_surrounding_bytes() {
        let reps = ReplacementSet::compile(&[Replacement::new("OLD", "NEW")]).unwrap();
        assert_eq!(reps.apply(b"\xe9 OLD \xff"), &b"\xe9 NEW \xff"[..]);
    }

    #[test]
    fn transformer_drops_rewrites_and_keeps() {
        let matcher = DirectiveMatcher::default_syntax();
        let reps = ReplacementSet::compile(&[Replacement::new("OLD", "NEW")]).unwrap();
        let t = LineTransformer::new(matcher, &reps, "cop");

        assert_eq!(t.transform(b"   "), LineOutcome::Dropped);
        assert_eq!(t.transform(b"  # doc"), LineOutcome::Dropped);
        assert_eq!(
            t.transform(b"  x = OLD"),
            LineOutcome::Kept(Cow::Owned(b"  x = NEW".to_vec()))
        );
        assert_eq!(
            t.transform(b"require_relative \"base.rb\""),
            LineOutcome::Rewritten {
                line: b"require_relative \"cop/base\"".to_vec(),
                target: "cop/base".to_string(),
            }
        );
    }

    #[test]
    fn transformer_leaves_malformed_directive_as_code() {
        let matcher = DirectiveMatcher::default_syntax();
        let reps = ReplacementSet::default();
        let t = LineTransformer::new(matcher, &reps, "cop");
        assert_eq!(
            t.transform(b"require_relative path_var"),
            LineOutcome::Kept(Cow::Borrowed(&b"require_relative path_var"[..]))
        );
    }
}
