pub mod config;
pub mod flatten;
pub mod lint;
pub mod plan;
