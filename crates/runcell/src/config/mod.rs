use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

pub use crate::config::language::{
    CompileConfig, DEFAULT_ENTRY, EntryRule, FileExtension, Language, Placeholders, RunConfig,
};
pub use crate::config::toolchain::ToolchainConfig;
use crate::types::ResourceLimits;

pub mod language;
mod loader;
pub mod toolchain;

/// Example configuration embedded at compile time.
///
/// This is also the default driver table. Library users can access it to
/// generate a starter config file.
pub const EXAMPLE_CONFIG: &str = include_str!("../../runcell.example.toml");

/// Prefix for environment variables layered over configuration by [`Config::load`]
pub const ENV_PREFIX: &str = "RUNCELL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid characters in file extension")]
    InvalidFileExtChars,

    #[error("failed to parse config: {0}")]
    Parse(#[from] config::ConfigError),

    #[error("language '{0}' not found in configuration")]
    LanguageNotFound(String),

    #[error("toolchain '{0}' not found in configuration")]
    ToolchainNotFound(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Config for runcell
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Directory under which per-request session directories are created.
    ///
    /// Defaults to `runcell` inside the system temp directory.
    #[serde(default)]
    pub work_root: Option<PathBuf>,

    /// Largest accepted source submission in bytes
    #[serde(default = "default_max_code_bytes")]
    pub max_code_bytes: usize,

    /// Largest accepted stdin payload in bytes
    #[serde(default = "default_max_input_bytes")]
    pub max_input_bytes: usize,

    /// Default resource limits applied to all executions.
    /// This will be overridden if the code execution request specifies different limits
    #[serde(default)]
    pub default_limits: ResourceLimits,

    /// Toolchain configurations keyed by logical tool ID
    #[serde(default)]
    pub toolchains: HashMap<String, ToolchainConfig>,

    /// Language configurations keyed by language ID
    #[serde(default)]
    pub languages: HashMap<String, Language>,
}

impl Config {
    /// Create a new config with embedded default languages
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty config with no languages or toolchains
    pub fn empty() -> Self {
        Self {
            work_root: None,
            max_code_bytes: default_max_code_bytes(),
            max_input_bytes: default_max_input_bytes(),
            default_limits: ResourceLimits::default(),
            toolchains: HashMap::new(),
            languages: HashMap::new(),
        }
    }

    /// Get a language by ID
    pub fn get_language(&self, id: &str) -> Result<&Language, ConfigError> {
        self.languages
            .get(id)
            .ok_or_else(|| ConfigError::LanguageNotFound(id.to_string()))
    }

    /// Get a toolchain by ID
    pub fn get_toolchain(&self, id: &str) -> Result<&ToolchainConfig, ConfigError> {
        self.toolchains
            .get(id)
            .ok_or_else(|| ConfigError::ToolchainNotFound(id.to_string()))
    }

    /// Language IDs in sorted order
    pub fn language_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.languages.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Toolchain IDs in sorted order
    pub fn toolchain_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.toolchains.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Root directory for session directories
    ///
    /// A relative `work_root` is resolved against the current directory, since
    /// children start inside their session directory and expanded paths such
    /// as `{binary}` must not depend on it.
    pub fn work_root(&self) -> PathBuf {
        let root = self
            .work_root
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("runcell"));
        std::path::absolute(&root).unwrap_or(root)
    }

    /// Merge resource limits with defaults
    pub fn effective_limits(&self, overrides: Option<&ResourceLimits>) -> ResourceLimits {
        match overrides {
            Some(limits) => self.default_limits.with_overrides(limits),
            None => self.default_limits.clone(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::parse_toml(EXAMPLE_CONFIG).expect("embedded default config should be valid")
    }
}

fn default_max_code_bytes() -> usize {
    64 * 1024
}

fn default_max_input_bytes() -> usize {
    1024 * 1024
}
