use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Args, Debug, Clone, Default)]
pub struct ConfigFileOpts {
    #[arg(
        long = "config",
        help = "Specify path/filename of the TOML config file (default: .xtools/xflatten/xflatten.toml).",
        value_name = "CONFIG_FILE",
        conflicts_with = "no_config",
        help_heading = "Configuration"
    )]
    pub config_file: Option<String>,

    #[arg(
        long,
        help = "Disable loading any TOML config file.",
        conflicts_with = "config_file",
        help_heading = "Configuration"
    )]
    pub no_config: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct SyntaxOpts {
    #[arg(
        long,
        help = "Directive keyword that includes a sibling file [default: require_relative].",
        value_name = "KEYWORD",
        help_heading = "Source Syntax"
    )]
    pub directive: Option<String>,

    #[arg(
        long,
        help = "Source file extension, without the dot [default: rb].",
        value_name = "EXT",
        help_heading = "Source Syntax"
    )]
    pub extension: Option<String>,

    #[arg(
        long,
        help = "Line comment marker [default: #].",
        value_name = "MARKER",
        help_heading = "Source Syntax"
    )]
    pub comment_marker: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct FlattenRulesOpts {
    #[arg(
        long = "exclude",
        value_name = "PATH",
        action = clap::ArgAction::Append,
        help = "Never inline this directive path (relative to the root file). Repeatable.",
        help_heading = "Flattening Rules"
    )]
    pub exclude: Vec<String>,

    #[arg(
        long = "replace",
        num_args = 2,
        value_names = ["FROM", "TO"],
        action = clap::ArgAction::Append,
        help = "Replace the exact text FROM with TO on every inlined line. Repeatable.",
        help_heading = "Flattening Rules"
    )]
    pub replace: Vec<String>,
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Flatten a root source file and its relative includes into one file.",
    long_about = "xflatten reads the require_relative directives of a root file, inlines each \ndirect child once (comments stripped, nested directives re-pointed) and writes \none consolidated file. It also ships a TODO-comment lint.",
    help_template = "{about-section}\nUsage: {usage}\n\n{all-args}{after-help}",
    after_help = "EXAMPLES:\n  xflatten flatten lib/rubocop.rb concatenated_rubocop.rb\n  xflatten plan lib/rubocop.rb -f json\n  xflatten lint lib --keyword TODO --keyword HACK",
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true, help = "Increase message verbosity (-v, -vv).")]
    pub verbose: u8,

    #[arg(
        short,
        long,
        global = true,
        help = "Silence progress messages and warnings."
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    #[command(
        visible_alias = "f",
        about = "Flatten ROOT and its direct children into OUTPUT."
    )]
    Flatten(FlattenArgs),

    #[command(
        visible_alias = "p",
        about = "Show what flatten would do with each directive of ROOT."
    )]
    Plan(PlanArgs),

    #[command(visible_alias = "l", about = "Report TODO-style comments.")]
    Lint(LintArgs),

    #[command(about = "Show or save the default configuration file structure.")]
    Config(ConfigArgs),
}

#[derive(Args, Debug, Clone)]
pub struct FlattenArgs {
    #[arg(required = true, help = "Root file whose directives are flattened.")]
    pub root: PathBuf,

    #[arg(help = "Output file [default: flattened.rb or [flatten].output_file].")]
    pub output: Option<PathBuf>,

    #[clap(flatten)]
    pub config: ConfigFileOpts,
    #[clap(flatten)]
    pub syntax: SyntaxOpts,
    #[clap(flatten)]
    pub rules: FlattenRulesOpts,
}

#[derive(Args, Debug, Clone)]
pub struct PlanArgs {
    #[arg(required = true, help = "Root file whose directives are inspected.")]
    pub root: PathBuf,

    #[arg(short = 'f', long, help = "Set the output format.", value_name = "FORMAT", value_parser = ["text", "json"], default_value = "text")]
    pub format: String,

    #[clap(flatten)]
    pub config: ConfigFileOpts,
    #[clap(flatten)]
    pub syntax: SyntaxOpts,
    #[clap(flatten)]
    pub rules: FlattenRulesOpts,
}

#[derive(Args, Debug, Clone)]
pub struct LintArgs {
    #[arg(required = true, num_args = 1.., help = "Files or directories to inspect.")]
    pub paths: Vec<PathBuf>,

    #[arg(
        long = "keyword",
        value_name = "KEYWORD",
        action = clap::ArgAction::Append,
        help = "Keyword to flag (replaces [lint].keywords). Repeatable."
    )]
    pub keywords: Vec<String>,

    #[arg(short = 'f', long, help = "Set the output format.", value_name = "FORMAT", value_parser = ["text", "json"], default_value = "text")]
    pub format: String,

    #[clap(flatten)]
    pub config: ConfigFileOpts,
    #[clap(flatten)]
    pub syntax: SyntaxOpts,
}

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    #[arg(long, help = "Save default config structure to the default path.")]
    pub save: bool,

    #[arg(long, requires = "save", help = "Overwrite an existing config file.")]
    pub force: bool,
}
