use serde::{Deserialize, Serialize};

/// Configuration for a logical toolchain binary (a compiler, interpreter or runtime)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolchainConfig {
    /// Bare program name, looked up on PATH when no override is set (e.g., "gcc")
    pub program: String,

    /// Environment variable holding a full path to the binary (e.g., "GCC_PATH")
    #[serde(default)]
    pub path_env: Option<String>,

    /// Environment variable holding a home directory with the binary under `bin/`
    /// (e.g., "JAVA_HOME")
    #[serde(default)]
    pub home_env: Option<String>,

    /// Argument that makes the binary print its version and exit
    #[serde(default = "default_version_arg")]
    pub version_arg: String,

    /// Installation hint shown when the binary is unavailable
    #[serde(default)]
    pub hint: Option<String>,
}

impl ToolchainConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            path_env: None,
            home_env: None,
            version_arg: default_version_arg(),
            hint: None,
        }
    }

    pub fn with_path_env(mut self, var: impl Into<String>) -> Self {
        self.path_env = Some(var.into());
        self
    }

    pub fn with_home_env(mut self, var: impl Into<String>) -> Self {
        self.home_env = Some(var.into());
        self
    }

    pub fn with_version_arg(mut self, arg: impl Into<String>) -> Self {
        self.version_arg = arg.into();
        self
    }

    /// Hint text for an unavailable binary
    pub fn describe_hint(&self) -> String {
        if let Some(ref hint) = self.hint {
            return hint.clone();
        }
        let overrides: Vec<&str> = [self.path_env.as_deref(), self.home_env.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        if overrides.is_empty() {
            format!("install '{}' and make sure it is on PATH", self.program)
        } else {
            format!(
                "install '{}' and make sure it is on PATH, or set {}",
                self.program,
                overrides.join(" or ")
            )
        }
    }
}

fn default_version_arg() -> String {
    "--version".to_owned()
}
