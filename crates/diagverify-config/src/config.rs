use std::path::Path;

use diagverify_types::{CompileMode, OutputFormat, DEFAULT_TIMEOUT_SECS};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::paths::get_config_path;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jobs: Option<usize>,
    #[serde(default)]
    pub ignore_unexpected_notes: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            timeout_seconds: default_timeout_seconds(),
            jobs: None,
            ignore_unexpected_notes: false,
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// Name of a built-in compiler preset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    /// Explicit command line; replaces the preset's command when non-empty.
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default)]
    pub mode: CompileMode,
    #[serde(default)]
    pub target_flags: Vec<String>,
    #[serde(default = "default_accepted_exit_codes")]
    pub accepted_exit_codes: Vec<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_format: Option<OutputFormat>,
    #[serde(default = "default_isolate_workdir")]
    pub isolate_workdir: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            preset: None,
            command: Vec::new(),
            mode: CompileMode::default(),
            target_flags: Vec::new(),
            accepted_exit_codes: default_accepted_exit_codes(),
            output_format: None,
            isolate_workdir: default_isolate_workdir(),
        }
    }
}

fn default_accepted_exit_codes() -> Vec<i32> {
    vec![0, 1]
}

fn default_isolate_workdir() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub harness: HarnessConfig,
    #[serde(default)]
    pub compiler: CompilerConfig,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&get_config_path())
    }

    /// Missing files yield the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
