use crate::directive::SourceSyntax;
use crate::error::{AppError, Result};
use crate::relocate::Replacement;
use log;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_DIR: &str = ".xtools/xflatten";
pub const DEFAULT_CONFIG_FILENAME: &str = "xflatten.toml";
pub const DEFAULT_OUTPUT_FILENAME: &str = "flattened.rb";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub syntax: SourceSyntax,
    #[serde(default)]
    pub flatten: FlattenConfig,
    #[serde(default)]
    pub lint: LintConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FlattenConfig {
    #[serde(default = "default_output_file")]
    pub output_file: PathBuf,
    /// Directive paths (relative to the entry file) that are never inlined.
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub replacements: Vec<Replacement>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LintConfig {
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,
}

/// `name` or `name.toml` inside the config directory.
fn named_config_path(config_dir: &Path, name: &Path) -> Result<PathBuf> {
    let file_name = match name.extension() {
        Some(ext) if ext == "toml" => name.to_path_buf(),
        _ => PathBuf::from(format!("{}.toml", name.display())),
    };
    let path = config_dir.join(file_name);
    if path.exists() {
        Ok(path)
    } else {
        Err(AppError::Config(format!(
            "Config '{}' not found in {}",
            name.display(),
            config_dir.display()
        )))
    }
}

/// A path given on the command line; `.toml` is tried when it has no
/// extension and does not exist as written.
fn explicit_config_path(mut path: PathBuf) -> Result<PathBuf> {
    if !path.exists() && path.extension().is_none() {
        path.set_extension("toml");
    }
    if path.exists() {
        Ok(path)
    } else {
        Err(AppError::Config(format!(
            "Config file not found: {}",
            path.display()
        )))
    }
}

fn default_output_file() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_FILENAME)
}
fn default_keywords() -> Vec<String> {
    vec!["TODO".to_string(), "FIXME".to_string()]
}

impl Default for FlattenConfig {
    fn default() -> Self {
        Self {
            output_file: default_output_file(),
            exclude: Vec::new(),
            replacements: Vec::new(),
        }
    }
}
impl Default for LintConfig {
    fn default() -> Self {
        Self {
            keywords: default_keywords(),
        }
    }
}

impl Config {
    /// Picks the config file for a run: nothing with `--no-config`, the given
    /// path or name with `--config`, otherwise the default file if it exists.
    /// A bare name (no separators) is looked up in the default directory.
    pub fn resolve_config_path(
        project_root: &Path,
        cli_config_file: Option<&String>,
        cli_disable_config: bool,
    ) -> Result<Option<PathBuf>> {
        if cli_disable_config {
            log::debug!("Config file loading disabled.");
            return Ok(None);
        }
        let config_dir = project_root.join(DEFAULT_CONFIG_DIR);

        let Some(requested) = cli_config_file else {
            let default_path = config_dir.join(DEFAULT_CONFIG_FILENAME);
            if !default_path.exists() {
                log::debug!("No config at {}", default_path.display());
                return Ok(None);
            }
            log::debug!("Using default config {}", default_path.display());
            return Ok(Some(default_path));
        };

        let expanded = PathBuf::from(shellexpand::tilde(requested).as_ref());
        let is_bare_name = !expanded.is_absolute()
            && expanded.components().count() == 1
            && !requested.contains(['/', '\\']);
        let resolved = if is_bare_name {
            named_config_path(&config_dir, &expanded)?
        } else {
            explicit_config_path(expanded)?
        };
        log::debug!("Using config {}", resolved.display());
        Ok(Some(resolved))
    }

    pub fn load_from_path(config_path: &Path) -> Result<Self> {
        log::info!("Loading configuration from: {}", config_path.display());
        let toml_content = fs::read_to_string(config_path).map_err(|e| AppError::FileRead {
            path: config_path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&toml_content).map_err(|e| match e {
            AppError::TomlParse(msg) => AppError::TomlParse(format!(
                "Error parsing config file '{}': {}. Check TOML syntax and structure.",
                config_path.display(),
                msg
            )),
            other => other,
        })
    }

    pub fn from_toml_str(toml_content: &str) -> Result<Self> {
        let config = toml::from_str::<Config>(toml_content)
            .map_err(|e| AppError::TomlParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        let syntax = &self.syntax;
        if syntax.directive.trim().is_empty() {
            return Err(AppError::Config("[syntax].directive cannot be empty".to_string()));
        }
        if syntax.extension.trim_start_matches('.').is_empty() {
            return Err(AppError::Config("[syntax].extension cannot be empty".to_string()));
        }
        if syntax.comment_marker.is_empty() {
            return Err(AppError::Config(
                "[syntax].comment_marker cannot be empty".to_string(),
            ));
        }
        if let Some(pos) = self.flatten.replacements.iter().position(|r| r.from.is_empty()) {
            return Err(AppError::Config(format!(
                "[[flatten.replacements]] entry {} has an empty 'from' string",
                pos + 1
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_document_yields_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.lint.keywords, vec!["TODO", "FIXME"]);
        assert_eq!(config.flatten.output_file, PathBuf::from("flattened.rb"));
    }

    #[test]
    fn parses_all_sections() {
        let config = Config::from_toml_str(
            r#"
[syntax]
extension = "rb"

[flatten]
output_file = "out/all.rb"
exclude = ["rubocop/version.rb", "rubocop/cli/command/lsp"]

[[flatten.replacements]]
from = "File.join(File.dirname(__FILE__), '..', '..')"
to = "File.join(File.dirname(__FILE__), '..')"

[lint]
keywords = ["HACK"]
"#,
        )
        .unwrap();
        assert_eq!(config.syntax.directive, "require_relative");
        assert_eq!(config.flatten.exclude.len(), 2);
        assert_eq!(config.flatten.replacements.len(), 1);
        assert_eq!(config.lint.keywords, vec!["HACK"]);
    }

    #[test]
    fn rejects_unknown_fields_and_empty_replacement() {
        assert!(matches!(
            Config::from_toml_str("[flatten]\nbogus = 1\n"),
            Err(AppError::TomlParse(_))
        ));
        assert!(matches!(
            Config::from_toml_str("[[flatten.replacements]]\nfrom = \"\"\nto = \"x\"\n"),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn default_config_round_trips_through_toml() {
        let text = Config::default().to_toml_string().unwrap();
        assert_eq!(Config::from_toml_str(&text).unwrap(), Config::default());
    }

    #[test]
    fn resolves_named_config_in_default_dir() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join(DEFAULT_CONFIG_DIR);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("rubocop.toml"), "").unwrap();

        let found =
            Config::resolve_config_path(root.path(), Some(&"rubocop".to_string()), false).unwrap();
        assert_eq!(found, Some(dir.join("rubocop.toml")));

        assert!(Config::resolve_config_path(root.path(), None, true).unwrap().is_none());
        assert!(Config::resolve_config_path(root.path(), None, false).unwrap().is_none());
        assert!(
            Config::resolve_config_path(root.path(), Some(&"missing".to_string()), false).is_err()
        );
    }

    #[test]
    fn bundled_rubocop_config_is_valid() {
        let config = Config::from_toml_str(include_str!("../demos/rubocop.toml")).unwrap();
        assert_eq!(
            config.flatten.output_file,
            PathBuf::from("concatenated_rubocop.rb")
        );
        assert_eq!(config.flatten.exclude.len(), 3);
        assert_eq!(config.flatten.replacements.len(), 2);
    }
}
