//! Inclusion directive syntax: recognising `require_relative 'path'` style lines,
//! normalizing their paths, and rewriting their literals in place.

use crate::error::Result;
use log;
use once_cell::sync::Lazy;
use regex::bytes::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_DIRECTIVE: &str = "require_relative";
pub const DEFAULT_EXTENSION: &str = "rb";
pub const DEFAULT_COMMENT_MARKER: &str = "#";

static DEFAULT_MATCHER: Lazy<DirectiveMatcher> = Lazy::new(|| {
    DirectiveMatcher::new(SourceSyntax::default())
        .expect("Failed to compile built-in directive pattern")
});

/// Lexical conventions of the language being flattened.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SourceSyntax {
    #[serde(default = "default_directive")]
    pub directive: String,
    #[serde(default = "default_extension")]
    pub extension: String,
    #[serde(default = "default_comment_marker")]
    pub comment_marker: String,
}

fn default_directive() -> String {
    DEFAULT_DIRECTIVE.to_string()
}
fn default_extension() -> String {
    DEFAULT_EXTENSION.to_string()
}
fn default_comment_marker() -> String {
    DEFAULT_COMMENT_MARKER.to_string()
}

impl Default for SourceSyntax {
    fn default() -> Self {
        Self {
            directive: default_directive(),
            extension: default_extension(),
            comment_marker: default_comment_marker(),
        }
    }
}

impl SourceSyntax {
    /// The extension with its leading dot, e.g. `.rb`.
    pub fn suffix(&self) -> String {
        format!(".{}", self.extension.trim_start_matches('.'))
    }

    pub fn strip_extension<'a>(&self, path: &'a str) -> &'a str {
        path.strip_suffix(self.suffix().as_str()).unwrap_or(path)
    }
}

/// A relative path taken from an inclusion directive, always carrying the
/// extension so `"foo"` and `"foo.rb"` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ReferencePath(String);

impl ReferencePath {
    pub fn normalize(raw: &str, syntax: &SourceSyntax) -> Self {
        let mut path = syntax.strip_extension(raw).to_string();
        path.push_str(&syntax.suffix());
        ReferencePath(path)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReferencePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ReferencePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A directive literal found on a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub quote: char,
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct DirectiveMatcher {
    syntax: SourceSyntax,
    pattern: Regex,
}

impl DirectiveMatcher {
    pub fn new(syntax: SourceSyntax) -> Result<Self> {
        let source = format!(r#"{}\s+(['"])([^'"]+)['"]"#, regex::escape(&syntax.directive));
        log::trace!("Compiling directive pattern: {}", source);
        let pattern = Regex::new(&source)?;
        Ok(Self { syntax, pattern })
    }

    /// Shared matcher for the built-in `require_relative` syntax.
    pub fn default_syntax() -> &'static DirectiveMatcher {
        &DEFAULT_MATCHER
    }

    pub fn syntax(&self) -> &SourceSyntax {
        &self.syntax
    }

    /// Returns the directive on `line`, if the trimmed line starts with the
    /// keyword and carries a quoted literal. Lines with the keyword but no
    /// literal are not directives.
    ///
    /// Lines are plain bytes; nothing outside the literal has to be UTF-8.
    pub fn parse(&self, line: impl AsRef<[u8]>) -> Option<Directive> {
        let line = line.as_ref();
        if !line
            .trim_ascii()
            .starts_with(self.syntax.directive.as_bytes())
        {
            return None;
        }
        let caps = self.pattern.captures(line)?;
        Some(Directive {
            quote: quote_of(&caps),
            path: String::from_utf8_lossy(&caps[2]).into_owned(),
        })
    }

    /// Replaces the first directive literal on `line` with `new_path`, keeping
    /// the opening quote character and every byte around the literal.
    pub fn rewrite(&self, line: impl AsRef<[u8]>, new_path: &str) -> Vec<u8> {
        self.pattern
            .replacen(line.as_ref(), 1, |caps: &Captures| {
                let quote = [quote_of(caps) as u8];
                let parts: [&[u8]; 5] = [
                    self.syntax.directive.as_bytes(),
                    b" ",
                    &quote,
                    new_path.as_bytes(),
                    &quote,
                ];
                parts.concat()
            })
            .into_owned()
    }

    pub fn reference(&self, line: impl AsRef<[u8]>) -> Option<ReferencePath> {
        self.parse(line)
            .map(|d| ReferencePath::normalize(&d.path, &self.syntax))
    }
}

fn quote_of(caps: &Captures) -> char {
    match caps[1].first() {
        Some(b'"') => '"',
        _ => '\'',
    }
}

/// Blank lines, a bare marker, and marker-plus-space lines carry no code.
pub fn is_comment_only(line: impl AsRef<[u8]>, marker: &str) -> bool {
    let trimmed = line.as_ref().trim_ascii();
    trimmed.is_empty()
        || trimmed == marker.as_bytes()
        || trimmed
            .strip_prefix(marker.as_bytes())
            .is_some_and(|rest| rest.first() == Some(&b' '))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_appends_extension_once() {
        let syntax = SourceSyntax::default();
        assert_eq!(ReferencePath::normalize("foo", &syntax).as_str(), "foo.rb");
        assert_eq!(ReferencePath::normalize("foo.rb", &syntax).as_str(), "foo.rb");
        assert_eq!(
            ReferencePath::normalize("foo", &syntax),
            ReferencePath::normalize("foo.rb", &syntax)
        );
        assert_eq!(
            ReferencePath::normalize("lib/foo.rbx", &syntax).as_str(),
            "lib/foo.rbx.rb"
        );
    }

    #[test]
    fn parse_reads_either_quote_style() {
        let m = DirectiveMatcher::default_syntax();
        assert_eq!(
            m.parse("  require_relative 'a/b'"),
            Some(Directive { quote: '\'', path: "a/b".into() })
        );
        assert_eq!(
            m.parse("require_relative \"c.rb\" # load c"),
            Some(Directive { quote: '"', path: "c.rb".into() })
        );
    }

    #[test]
    fn parse_skips_malformed_and_unrelated_lines() {
        let m = DirectiveMatcher::default_syntax();
        assert_eq!(m.parse("require_relative"), None);
        assert_eq!(m.parse("require_relative some_var"), None);
        assert_eq!(m.parse("require 'set'"), None);
        assert_eq!(m.parse("x = 1 # require_relative 'a'"), None);
    }

    #[test]
    fn rewrite_preserves_quotes_and_surroundings() {
        let m = DirectiveMatcher::default_syntax();
        assert_eq!(
            m.rewrite("    require_relative \"mixin/x.rb\" if defined?(Y)", "cop/mixin/x"),
            b"    require_relative \"cop/mixin/x\" if defined?(Y)"
        );
        assert_eq!(
            m.rewrite("require_relative 'z'", "dir/z"),
            b"require_relative 'dir/z'"
        );
    }

    #[test]
    fn custom_keyword_is_escaped() {
        let syntax = SourceSyntax {
            directive: "load.rel".into(),
            extension: "ext".into(),
            comment_marker: "//".into(),
        };
        let m = DirectiveMatcher::new(syntax).unwrap();
        assert_eq!(m.reference("load.rel 'x'").unwrap().as_str(), "x.ext");
        assert!(m.parse("loadxrel 'x'").is_none());
    }

    #[test]
    fn comment_only_lines() {
        assert!(is_comment_only("", "#"));
        assert!(is_comment_only("   \t", "#"));
        assert!(is_comment_only("  #", "#"));
        assert!(is_comment_only("# a note", "#"));
        assert!(!is_comment_only("#!/usr/bin/env ruby", "#"));
        assert!(is_comment_only("# frozen_string_literal: true", "#"));
        assert!(!is_comment_only("#frozen", "#"));
        assert!(!is_comment_only("x = 1 # trailing", "#"));
    }

    #[test]
    fn non_utf8_bytes_around_a_directive_survive() {
        let m = DirectiveMatcher::default_syntax();
        let line = b"require_relative 'a' # caf\xe9";
        assert_eq!(m.reference(line).unwrap().as_str(), "a.rb");
        assert_eq!(
            m.rewrite(line, "lib/a"),
            b"require_relative 'lib/a' # caf\xe9"
        );
        assert!(is_comment_only(b"# Autor: Jos\xe9", "#"));
        assert!(!is_comment_only(b"X = 'caf\xe9'", "#"));
    }
}
