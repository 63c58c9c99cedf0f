//! TODO-style comment check.
//!
//! The rule itself only looks at comment tokens. [`collect_comments`] is a small
//! line scanner that produces those tokens from source text: a comment starts at
//! the first comment marker on a line that is not inside a quoted string.

use crate::error::{AppError, Result};
use log;
use regex::Regex;
#[cfg(feature = "serde_support")]
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const MESSAGE_SUFFIX: &str = "-style comment found. Remove it or convert it to a ticket.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentToken {
    /// 1-based.
    pub line: usize,
    /// 1-based, in characters.
    pub column: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde_support", derive(Serialize))]
pub struct Offense {
    pub line: usize,
    pub column: usize,
    pub keyword: String,
    pub message: String,
}

pub fn collect_comments(source: &str, marker: &str) -> Vec<CommentToken> {
    let mut comments = Vec::new();
    if marker.is_empty() {
        return comments;
    }
    for (index, line) in source.lines().enumerate() {
        if let Some((column, start)) = comment_start(line, marker) {
            comments.push(CommentToken {
                line: index + 1,
                column,
                text: line[start..].to_string(),
            });
        }
    }
    comments
}

/// Returns (1-based char column, byte offset) of the first marker outside a
/// string literal.
fn comment_start(line: &str, marker: &str) -> Option<(usize, usize)> {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (column, (offset, ch)) in line.char_indices().enumerate() {
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                } else if ch == '\\' {
                    escaped = true;
                } else if ch == q {
                    quote = None;
                }
            }
            None => {
                if line[offset..].starts_with(marker) {
                    return Some((column + 1, offset));
                }
                if ch == '\'' || ch == '"' {
                    quote = Some(ch);
                }
            }
        }
    }
    None
}

#[derive(Debug, Clone)]
pub struct TodoCommentRule {
    keywords: Vec<(String, Regex)>,
}

impl TodoCommentRule {
    /// Keywords are case-sensitive whole words, checked in the given order.
    pub fn new<I, S>(keywords: I, marker: &str) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut compiled = Vec::new();
        for keyword in keywords {
            let keyword = keyword.as_ref();
            if keyword.is_empty() {
                return Err(AppError::InvalidArgument(
                    "Lint keywords cannot be empty strings".to_string(),
                ));
            }
            let pattern = Regex::new(&format!(
                r"^\s*{}\s*{}\b",
                regex::escape(marker),
                regex::escape(keyword)
            ))?;
            compiled.push((keyword.to_string(), pattern));
        }
        Ok(Self { keywords: compiled })
    }

    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.keywords.iter().map(|(k, _)| k.as_str())
    }

    pub fn check(&self, comments: &[CommentToken]) -> Vec<Offense> {
        if self.keywords.is_empty() {
            return Vec::new();
        }
        comments
            .iter()
            .filter_map(|comment| {
                let (keyword, _) = self
                    .keywords
                    .iter()
                    .find(|(_, pattern)| pattern.is_match(&comment.text))?;
                Some(Offense {
                    line: comment.line,
                    column: comment.column,
                    keyword: keyword.clone(),
                    message: format!("{}{}", keyword, MESSAGE_SUFFIX),
                })
            })
            .collect()
    }
}

pub fn lint_source(source: &str, rule: &TodoCommentRule, marker: &str) -> Vec<Offense> {
    rule.check(&collect_comments(source, marker))
}

pub fn lint_file(path: &Path, rule: &TodoCommentRule, marker: &str) -> Result<Vec<Offense>> {
    let bytes = fs::read(path).map_err(|e| AppError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(lint_source(&String::from_utf8_lossy(&bytes), rule, marker))
}

/// Expands directories into the files below them that carry `extension`.
/// Explicit file arguments are kept as given.
pub fn collect_lint_targets(paths: &[PathBuf], extension: &str) -> Result<Vec<PathBuf>> {
    let extension = extension.trim_start_matches('.');
    let mut targets = Vec::new();
    for path in paths {
        if path.is_file() {
            targets.push(path.clone());
        } else if path.is_dir() {
            let mut found = Vec::new();
            for entry in WalkDir::new(path).follow_links(false) {
                let entry = entry?;
                if entry.file_type().is_file()
                    && entry.path().extension().is_some_and(|e| e == extension)
                {
                    found.push(entry.into_path());
                }
            }
            found.sort();
            log::debug!("Found {} lint targets under {}", found.len(), path.display());
            targets.extend(found);
        } else {
            return Err(AppError::InvalidArgument(format!(
                "Lint target not found: {}",
                path.display()
            )));
        }
    }
    Ok(targets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn rule(keywords: &[&str]) -> TodoCommentRule {
        TodoCommentRule::new(keywords.iter().copied(), "#").unwrap()
    }

    #[test]
    fn collects_comments_outside_strings() {
        let source = "x = 1 # note\ns = \"a # b\" # real\nt = 'it\\'s # no'\n  # full line\n";
        let comments = collect_comments(source, "#");
        let texts: Vec<(usize, usize, &str)> = comments
            .iter()
            .map(|c| (c.line, c.column, c.text.as_str()))
            .collect();
        assert_eq!(
            texts,
            vec![(1, 7, "# note"), (2, 13, "# real"), (4, 3, "# full line")]
        );
    }

    #[test]
    fn flags_configured_keywords_as_whole_words() {
        let r = rule(&["TODO", "FIXME"]);
        let offenses = lint_source(
            "# TODO: later\n#FIXME\n# TODOS are fine\n# todo lower\nx # TODO inline\n# a TODO later\n",
            &r,
            "#",
        );
        let found: Vec<(usize, &str)> = offenses
            .iter()
            .map(|o| (o.line, o.keyword.as_str()))
            .collect();
        assert_eq!(found, vec![(1, "TODO"), (2, "FIXME"), (5, "TODO")]);
        assert_eq!(
            offenses[1].message,
            "FIXME-style comment found. Remove it or convert it to a ticket."
        );
    }

    #[test]
    fn first_configured_keyword_wins() {
        let offenses = lint_source("# FIX ME now\n", &rule(&["FIX", "FIX ME"]), "#");
        assert_eq!(offenses.len(), 1);
        assert_eq!(offenses[0].keyword, "FIX");

        let offenses = lint_source("# FIX ME now\n", &rule(&["FIX ME", "FIX"]), "#");
        assert_eq!(offenses[0].keyword, "FIX ME");
    }

    #[test]
    fn empty_keyword_set_flags_nothing() {
        let r = rule(&[]);
        assert!(lint_source("# TODO\n", &r, "#").is_empty());
        assert!(TodoCommentRule::new([""], "#").is_err());
    }

    #[test]
    fn keywords_are_escaped() {
        let r = rule(&["X.Y"]);
        assert_eq!(lint_source("# X.Y\n# XzY\n", &r, "#").len(), 1);
    }

    #[test]
    fn walks_directories_for_matching_files() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("lib/deep")).unwrap();
        fs::write(dir.path().join("lib/a.rb"), "# TODO\n").unwrap();
        fs::write(dir.path().join("lib/deep/b.rb"), "x\n").unwrap();
        fs::write(dir.path().join("lib/readme.md"), "# TODO\n").unwrap();

        let targets = collect_lint_targets(&[dir.path().join("lib")], "rb").unwrap();
        assert_eq!(targets.len(), 2);
        assert!(collect_lint_targets(&[dir.path().join("missing")], "rb").is_err());

        let offenses = lint_file(&targets[0], &rule(&["TODO"]), "#").unwrap();
        assert_eq!(offenses.len(), 1);
    }

    #[test]
    fn lints_files_that_are_not_utf8() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.rb");
        fs::write(&path, b"X = 'caf\xe9'\n# TODO: fix\n").unwrap();
        let offenses = lint_file(&path, &rule(&["TODO"]), "#").unwrap();
        assert_eq!(offenses.len(), 1);
        assert_eq!(offenses[0].line, 2);
    }
}
