//! Configuration file loading for runcell
//!
//! Handles loading and parsing configuration files using the config crate.

use std::path::Path;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};

use crate::config::{Config, ConfigError, ENV_PREFIX, EXAMPLE_CONFIG};

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = ConfigBuilder::builder()
            .add_source(File::from(path))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config = ConfigBuilder::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load the layered configuration used by long-running callers
    ///
    /// Layers, lowest precedence first: the embedded defaults, the optional
    /// file at `path` (tables merge into the defaults, so a file may override
    /// a single field of a built-in language), then `RUNCELL_`-prefixed
    /// environment variables with `__` separating nested keys.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder =
            ConfigBuilder::builder().add_source(File::from_str(EXAMPLE_CONFIG, FileFormat::Toml));

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_code_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_code_bytes must be greater than zero".to_string(),
            ));
        }

        for (id, tool) in &self.toolchains {
            if tool.program.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "toolchain '{id}' has empty program"
                )));
            }
        }

        for (id, lang) in &self.languages {
            if lang.name.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "language '{id}' has empty name"
                )));
            }
            if lang.extension.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "language '{id}' has empty extension"
                )));
            }
            if let Some(ref template) = lang.source_name
                && (template.is_empty() || template.contains('/') || template.contains(".."))
            {
                return Err(ConfigError::Invalid(format!(
                    "language '{id}' has invalid source name '{template}'"
                )));
            }
            match (&lang.run.tool, &lang.run.program) {
                (Some(_), Some(_)) => {
                    return Err(ConfigError::Invalid(format!(
                        "language '{id}' run step sets both tool and program"
                    )));
                }
                (None, None) => {
                    return Err(ConfigError::Invalid(format!(
                        "language '{id}' has empty run command"
                    )));
                }
                (_, Some(program)) if program.is_empty() => {
                    return Err(ConfigError::Invalid(format!(
                        "language '{id}' has empty run command"
                    )));
                }
                _ => {}
            }
            if let Some(ref compile) = lang.compile
                && (compile.output_name.is_empty() || compile.output_name.contains('/'))
            {
                return Err(ConfigError::Invalid(format!(
                    "language '{id}' has invalid compile output name"
                )));
            }
            for tool in lang.tools() {
                if !self.toolchains.contains_key(tool) {
                    return Err(ConfigError::Invalid(format!(
                        "language '{id}' references unknown toolchain '{tool}'"
                    )));
                }
            }
        }

        Ok(())
    }
}
