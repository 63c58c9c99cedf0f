use crate::directive::{DirectiveMatcher, ReferencePath};
use crate::error::{AppError, Result};
use log;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Collects the directive paths of a single file, in file order. Referenced
/// files are not opened, and the file's encoding is never checked.
pub fn extract_references(entry: &Path, matcher: &DirectiveMatcher) -> Result<Vec<ReferencePath>> {
    log::debug!("Extracting directives from: {}", entry.display());
    let file = File::open(entry).map_err(|e| AppError::FileRead {
        path: entry.to_path_buf(),
        source: e,
    })?;

    let mut reader = BufReader::new(file);
    let mut buffer = Vec::new();
    let mut references = Vec::new();
    let mut line_number = 0;
    loop {
        buffer.clear();
        let read = reader
            .read_until(b'\n', &mut buffer)
            .map_err(|e| AppError::FileRead {
                path: entry.to_path_buf(),
                source: e,
            })?;
        if read == 0 {
            break;
        }
        line_number += 1;
        let line = buffer.strip_suffix(b"\n").unwrap_or(&buffer);
        if let Some(reference) = matcher.reference(line) {
            log::trace!("Line {}: directive to '{}'", line_number, reference);
            references.push(reference);
        }
    }
    log::debug!("Found {} directives in {}", references.len(), entry.display());
    Ok(references)
}

/// Same as [`extract_references`] but over in-memory source.
pub fn extract_references_from_str(source: &str, matcher: &DirectiveMatcher) -> Vec<ReferencePath> {
    source.lines().filter_map(|line| matcher.reference(line)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const ROOT: &str = r#"# frozen_string_literal: true

require 'set'
require_relative 'a'
  require_relative "b/c.rb"
require_relative
require_relative(dynamic)
x = 1 # require_relative 'ignored'
require_relative 'a.rb'
"#;

    #[test]
    fn keeps_order_and_duplicates() {
        let refs = extract_references_from_str(ROOT, DirectiveMatcher::default_syntax());
        let paths: Vec<&str> = refs.iter().map(ReferencePath::as_str).collect();
        assert_eq!(paths, vec!["a.rb", "b/c.rb", "a.rb"]);
    }

    #[test]
    fn reads_entry_file_from_disk() {
        let dir = TempDir::new().unwrap();
        let entry = dir.path().join("root.rb");
        fs::write(&entry, ROOT).unwrap();
        let refs = extract_references(&entry, DirectiveMatcher::default_syntax()).unwrap();
        assert_eq!(refs.len(), 3);
    }

    #[test]
    fn missing_entry_is_a_read_error() {
        let dir = TempDir::new().unwrap();
        let err = extract_references(&dir.path().join("nope.rb"), DirectiveMatcher::default_syntax())
            .unwrap_err();
        assert!(matches!(err, AppError::FileRead { .. }));
    }

    #[test]
    fn latin1_bytes_in_the_root_are_not_an_error() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("root.rb");
        fs::write(&root, b"# Autor: Jos\xe9\nrequire_relative 'a'\nX = '\xff'\n").unwrap();

        let refs = extract_references(&root, DirectiveMatcher::default_syntax()).unwrap();
        let paths: Vec<&str> = refs.iter().map(ReferencePath::as_str).collect();
        assert_eq!(paths, vec!["a.rb"]);
    }
}
