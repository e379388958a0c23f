//! Configuration Loader
//! - Reads `frametest.toml` for engine settings
//! - Provides CLI argument parsing with clap for the demo host

use crate::reporter::{HumanReporter, JsonReporter, Reporter};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "frametest.toml";

// =============================================================================
// CLI Configuration
// =============================================================================

/// Output format for results and diagnostics
#[derive(ValueEnum, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text (diagnostics to stderr, results to stdout)
    #[default]
    Human,
    /// Machine-readable NDJSON (to stdout)
    Json,
}

/// frametest demo host - drives the sample tests from a simulated frame loop
#[derive(Parser, Debug)]
#[command(name = "frametest", version, about = "Frame-loop test engine demo host")]
pub struct Cli {
    /// Only run tests whose name or class contains one of these (case-insensitive)
    pub filter: Vec<String>,

    /// Output format (also: FRAMETEST_FORMAT env var)
    #[arg(long, value_enum, env = "FRAMETEST_FORMAT")]
    pub format: Option<OutputFormat>,

    /// Config file (default: ./frametest.toml if present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Record panics in test code as failures instead of aborting the run
    #[arg(long)]
    pub catch_panics: bool,

    /// Give up after this many frames with tests still pending
    #[arg(long)]
    pub max_ticks: Option<u64>,
}

// =============================================================================
// File Configuration
// =============================================================================

/// Engine settings. Every field is optional in the file.
#[derive(Deserialize, Default, Clone, Debug, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Filter terms applied before the first tick; empty runs everything
    pub filter: Vec<String>,
    pub format: OutputFormat,
    pub catch_panics: bool,
}

#[derive(Deserialize, Default)]
struct ConfigFile {
    frametest: Option<EngineConfig>,
}

impl EngineConfig {
    /// Parse the `[frametest]` table of a config document
    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(contents).context("invalid frametest config")?;
        Ok(file.frametest.unwrap_or_default())
    }

    /// CLI values win over file values
    pub fn merge_cli(mut self, cli: &Cli) -> Self {
        if !cli.filter.is_empty() {
            self.filter = cli.filter.clone();
        }
        if let Some(format) = cli.format {
            self.format = format;
        }
        self.catch_panics |= cli.catch_panics;
        self
    }

    pub fn reporter(&self) -> Box<dyn Reporter> {
        match self.format {
            OutputFormat::Human => Box::new(HumanReporter),
            OutputFormat::Json => Box::new(JsonReporter),
        }
    }
}

/// Load `frametest.toml` from `root`. A missing file yields the defaults.
pub fn load_config(root: &Path) -> Result<EngineConfig> {
    let config_path = root.join(CONFIG_FILE_NAME);
    if !config_path.exists() {
        tracing::debug!(path = %config_path.display(), "no config file, using defaults");
        return Ok(EngineConfig::default());
    }
    load_config_file(&config_path)
}

/// Load an explicit config file, which must exist
pub fn load_config_file(path: &Path) -> Result<EngineConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    EngineConfig::from_toml(&contents).with_context(|| format!("failed to parse {}", path.display()))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_table() {
        let toml_content = r#"
[frametest]
filter = ["async", "Test 2"]
format = "json"
catch_panics = true
"#;
        let config = EngineConfig::from_toml(toml_content).unwrap();
        assert_eq!(config.filter, vec!["async", "Test 2"]);
        assert_eq!(config.format, OutputFormat::Json);
        assert!(config.catch_panics);
    }

    #[test]
    fn test_parse_empty_document() {
        let config = EngineConfig::from_toml("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_parse_other_tables_ignored() {
        let toml_content = r#"
[package]
name = "game"

[frametest]
format = "human"
"#;
        let config = EngineConfig::from_toml(toml_content).unwrap();
        assert_eq!(config.format, OutputFormat::Human);
        assert!(config.filter.is_empty());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let toml_content = r#"
[frametest]
fromat = "json"
"#;
        assert!(EngineConfig::from_toml(toml_content).is_err());
    }

    #[test]
    fn test_cli_overrides_file() {
        let cli = Cli::parse_from(["frametest", "--format", "json", "--catch-panics", "async"]);
        let config = EngineConfig {
            filter: vec!["sync".to_string()],
            format: OutputFormat::Human,
            catch_panics: false,
        }
        .merge_cli(&cli);

        assert_eq!(config.filter, vec!["async"]);
        assert_eq!(config.format, OutputFormat::Json);
        assert!(config.catch_panics);
    }

    #[test]
    fn test_cli_without_args_keeps_file_values() {
        // Built directly so FRAMETEST_FORMAT in the environment cannot leak in
        let cli = Cli {
            filter: Vec::new(),
            format: None,
            config: None,
            catch_panics: false,
            max_ticks: None,
        };
        let file = EngineConfig {
            filter: vec!["sync".to_string()],
            format: OutputFormat::Json,
            catch_panics: true,
        };
        assert_eq!(file.clone().merge_cli(&cli), file);
    }
}
