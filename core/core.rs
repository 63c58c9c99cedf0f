pub mod config;
pub mod directive;
pub mod error;
pub mod extract;
pub mod flatten;
pub mod lint;
pub mod relocate;

pub use config::{Config, FlattenConfig, LintConfig};
pub use directive::{Directive, DirectiveMatcher, ReferencePath, SourceSyntax};
pub use error::{AppError, Result};
pub use extract::extract_references;
pub use flatten::{
    Disposition, EntryFile, FlattenEvent, FlattenProgress, FlattenReport, FlattenSettings,
    Flattener, PlannedReference, flatten_to_file, flatten_to_string,
};
pub use lint::{CommentToken, Offense, TodoCommentRule, collect_comments, lint_file};
pub use relocate::Replacement;
