use std::borrow::Cow;
use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize, de};

use crate::config::ConfigError;
use crate::guard::ContentRule;
use crate::types::ResourceLimits;

const INVALID_FILE_EXT_CHARS: [char; 2] = ['/', '.'];

/// Entry identifier used when a driver has no better source for one
pub const DEFAULT_ENTRY: &str = "Main";

/// Configuration for a programming language
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Language {
    /// Human-readable name for the language (e.g., "C (GCC)")
    pub name: String,

    /// File extension
    pub extension: FileExtension,

    /// Source file name template (e.g., "{entry}.java").
    ///
    /// Defaults to `main.<extension>`.
    #[serde(default)]
    pub source_name: Option<String>,

    /// How the entry identifier is derived from the submitted source
    #[serde(default)]
    pub entry: EntryRule,

    /// Marker the source must begin with; prepended when missing (e.g., "<?php")
    #[serde(default)]
    pub prelude: Option<String>,

    /// Textual content rule checked before anything is written to disk
    #[serde(default)]
    pub guard: Option<ContentRule>,

    /// Compilation configuration (None for interpreted languages)
    #[serde(default)]
    pub compile: Option<CompileConfig>,

    /// Execution configuration
    pub run: RunConfig,
}

impl Language {
    /// Check if the language is compiled
    pub fn is_compiled(&self) -> bool {
        self.compile.is_some()
    }

    /// Get the source file name for the given entry identifier
    pub fn source_name(&self, entry: &str) -> String {
        match self.source_name {
            Some(ref template) => template.replace("{entry}", entry),
            None => format!("main.{}", self.extension),
        }
    }

    /// Get the artifact name for the given entry identifier (compiled languages only)
    pub fn output_name(&self, entry: &str) -> Option<String> {
        self.compile
            .as_ref()
            .map(|compile| compile.output_name.replace("{entry}", entry))
    }

    /// Derive the entry identifier for a submission
    pub fn entry_for(&self, code: &str) -> String {
        self.entry.derive(code)
    }

    /// Prepend the prelude marker when the code does not already start with it
    pub fn prepare_source<'a>(&self, code: &'a str) -> Cow<'a, str> {
        match self.prelude {
            Some(ref prelude) if !code.trim_start().starts_with(prelude.as_str()) => {
                Cow::Owned(format!("{prelude}\n{code}"))
            }
            _ => Cow::Borrowed(code),
        }
    }

    /// Logical tools this language depends on, compile stage first
    pub fn tools(&self) -> impl Iterator<Item = &str> {
        self.compile
            .as_ref()
            .map(|c| c.tool.as_str())
            .into_iter()
            .chain(self.run.tool.as_deref())
    }

    /// Expand placeholders in the given command
    pub fn expand_command(command: &[String], placeholders: &Placeholders<'_>) -> Vec<String> {
        command
            .iter()
            .map(|arg| placeholders.expand(arg))
            .collect()
    }
}

/// Values substituted into command templates
#[derive(Debug, Clone, Copy)]
pub struct Placeholders<'a> {
    /// `{source}`: source file name inside the session directory
    pub source: &'a str,
    /// `{output}`: artifact file name inside the session directory
    pub output: &'a str,
    /// `{binary}`: absolute path of the artifact
    pub binary: &'a str,
    /// `{entry}`: entry identifier
    pub entry: &'a str,
    /// `{workdir}`: absolute path of the session directory
    pub workdir: &'a str,
}

impl Placeholders<'_> {
    fn expand(&self, arg: &str) -> String {
        arg.replace("{source}", self.source)
            .replace("{output}", self.output)
            .replace("{binary}", self.binary)
            .replace("{entry}", self.entry)
            .replace("{workdir}", self.workdir)
    }
}

/// Rule for deriving the entry identifier from source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryRule {
    /// Always use the given name
    Fixed {
        #[serde(default = "default_entry")]
        name: String,
    },

    /// Use the first `public class <Ident>` declaration, or `fallback`
    PublicClass {
        #[serde(default = "default_entry")]
        fallback: String,
    },
}

impl EntryRule {
    pub fn derive(&self, code: &str) -> String {
        match self {
            EntryRule::Fixed { name } => name.clone(),
            EntryRule::PublicClass { fallback } => {
                find_public_class(code).unwrap_or_else(|| fallback.clone())
            }
        }
    }
}

impl Default for EntryRule {
    fn default() -> Self {
        EntryRule::Fixed {
            name: default_entry(),
        }
    }
}

fn default_entry() -> String {
    DEFAULT_ENTRY.to_owned()
}

/// Scan for `public class <Ident>` and return the identifier
fn find_public_class(code: &str) -> Option<String> {
    let tokens: Vec<&str> = code.split_whitespace().collect();
    tokens.windows(3).find_map(|window| {
        if window[0] != "public" || window[1] != "class" {
            return None;
        }
        let ident: String = window[2]
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == '$')
            .collect();
        match ident.chars().next() {
            Some(first) if !first.is_ascii_digit() => Some(ident),
            _ => None,
        }
    })
}

/// File extension without dot (e.g., "cpp")
#[derive(Debug, Clone, Serialize)]
pub struct FileExtension(String);

impl FileExtension {
    pub fn new(extension: &str) -> Result<Self, ConfigError> {
        let contains_invalid = extension
            .chars()
            .any(|c| INVALID_FILE_EXT_CHARS.contains(&c));
        if contains_invalid {
            return Err(ConfigError::InvalidFileExtChars);
        }
        Ok(Self(extension.to_owned()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for FileExtension {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        FileExtension::new(&s).map_err(|_| {
            de::Error::invalid_value(
                de::Unexpected::Str(&s),
                &"a file extension without '/' or '.' characters",
            )
        })
    }
}

impl std::fmt::Display for FileExtension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Configuration for the compilation step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileConfig {
    /// Logical toolchain ID of the compiler (key into `[toolchains]`)
    pub tool: String,

    /// Compiler arguments with placeholders
    #[serde(default)]
    pub args: Vec<String>,

    /// Artifact name produced in the session directory (e.g., "main")
    pub output_name: String,

    /// Environment variables to set during compilation
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Resource limits for compilation (overrides defaults)
    #[serde(default)]
    pub limits: Option<ResourceLimits>,
}

/// Configuration for the execution step
///
/// Exactly one of `tool` (a logical toolchain such as an interpreter) or
/// `program` (a template such as `{binary}` naming the compiled artifact)
/// must be set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Logical toolchain ID of the runtime
    #[serde(default)]
    pub tool: Option<String>,

    /// Program template, used when the artifact itself is executed
    #[serde(default)]
    pub program: Option<String>,

    /// Arguments with placeholders
    #[serde(default)]
    pub args: Vec<String>,

    /// Environment Variables to set
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Resource limits for execution (overrides defaults)
    #[serde(default)]
    pub limits: Option<ResourceLimits>,
}
