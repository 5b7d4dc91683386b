use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Limits applied to a single pipeline stage.
///
/// Only `wall_time_ms` and `max_output` are enforced. `memory_limit` is carried
/// through configuration so deployments can declare it, but no platform
/// resource limit is installed for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Wall clock time limit in milliseconds
    #[serde(default)]
    pub wall_time_ms: Option<u64>,

    /// Memory limit in kilobytes (advisory, not enforced)
    #[serde(default)]
    pub memory_limit: Option<u64>,

    /// Maximum captured size per output stream in kilobytes
    #[serde(default)]
    pub max_output: Option<u64>,
}

impl ResourceLimits {
    /// 1 megabyte in kilobytes
    pub const MB: u64 = 1024;

    /// Create new resource limits with the default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create limits with every field unset, for use as an override layer
    pub fn unset() -> Self {
        Self {
            wall_time_ms: None,
            memory_limit: None,
            max_output: None,
        }
    }

    /// Set the wall clock time limit in milliseconds
    pub fn with_wall_time_ms(mut self, ms: u64) -> Self {
        self.wall_time_ms = Some(ms);
        self
    }

    /// Set the advisory memory limit in kilobytes
    pub fn with_memory_limit(mut self, kb: u64) -> Self {
        self.memory_limit = Some(kb);
        self
    }

    /// Set the maximum output size in kilobytes
    pub fn with_max_output(mut self, kb: u64) -> Self {
        self.max_output = Some(kb);
        self
    }

    /// Apply overrides from another ResourceLimits, preferring values from `overrides`
    pub fn with_overrides(&self, overrides: &ResourceLimits) -> ResourceLimits {
        ResourceLimits {
            wall_time_ms: overrides.wall_time_ms.or(self.wall_time_ms),
            memory_limit: overrides.memory_limit.or(self.memory_limit),
            max_output: overrides.max_output.or(self.max_output),
        }
    }

    /// Wall clock budget, falling back to `fallback_ms` when unset
    pub fn timeout(&self, fallback_ms: u64) -> Duration {
        Duration::from_millis(self.wall_time_ms.unwrap_or(fallback_ms))
    }

    /// Output cap in bytes, if any
    pub fn max_output_bytes(&self) -> Option<usize> {
        self.max_output
            .map(|kb| usize::try_from(kb.saturating_mul(1024)).unwrap_or(usize::MAX))
    }
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            wall_time_ms: Some(10_000),
            memory_limit: Some(256 * Self::MB),
            max_output: Some(Self::MB),
        }
    }
}

/// A request to run a snippet of code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Source code to run
    pub code: String,

    /// Language ID, must name a configured language
    pub language: String,

    /// Optional input written to the program's stdin
    #[serde(default)]
    pub input: Option<String>,

    /// Optional limits for the run stage
    #[serde(default)]
    pub limits: Option<ResourceLimits>,
}

impl ExecutionRequest {
    pub fn new(language: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            language: language.into(),
            input: None,
            limits: None,
        }
    }

    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }

    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = Some(limits);
        self
    }
}

/// Result of an execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Outcome classification
    pub status: ExecutionStatus,

    /// Last pipeline stage that was attempted
    pub stage: Stage,

    /// Standard output, trimmed
    pub stdout: String,

    /// Standard error, trimmed
    pub stderr: String,

    /// Exit code if the process exited normally.
    ///
    /// `None` when the process was killed by a signal (including timeout kills).
    pub exit_code: Option<i32>,

    /// Signal number if the program was killed by a signal
    pub signal: Option<i32>,

    /// Wall clock time in milliseconds, compile stage included
    pub duration_ms: u64,

    /// Whether the wall clock budget expired and the process was killed
    pub timed_out: bool,
}

impl ExecutionResult {
    /// Check if the execution was successful (exited with code 0)
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.status, ExecutionStatus::Ok) && self.exit_code == Some(0)
    }

    /// Build a failure result that never reached a running process
    pub fn failure(
        status: ExecutionStatus,
        stage: Stage,
        message: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            status,
            stage,
            stdout: String::new(),
            stderr: message.into(),
            exit_code: Some(1),
            signal: None,
            duration_ms: millis(elapsed),
            timed_out: false,
        }
    }
}

impl Default for ExecutionResult {
    fn default() -> Self {
        Self {
            status: ExecutionStatus::Ok,
            stage: Stage::Run,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            signal: None,
            duration_ms: 0,
            timed_out: false,
        }
    }
}

pub(crate) fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// Status of an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Program exited with code 0
    Ok,

    /// Program exited with a non-zero code
    RuntimeError,

    /// Program was killed by a signal it did not get from us
    Signaled,

    /// Wall clock limit exceeded, program was killed
    TimedOut,

    /// Compiler exited with a non-zero code, the program never ran
    CompileError,

    /// A stage's binary could not be spawned
    ToolchainUnavailable,

    /// Session setup failed (directory or source file could not be created)
    InternalError,
}

impl ExecutionStatus {
    /// Short label used in CLI output and logs
    pub fn label(&self) -> &'static str {
        match self {
            ExecutionStatus::Ok => "ok",
            ExecutionStatus::RuntimeError => "runtime error",
            ExecutionStatus::Signaled => "killed by signal",
            ExecutionStatus::TimedOut => "timed out",
            ExecutionStatus::CompileError => "compilation failed",
            ExecutionStatus::ToolchainUnavailable => "toolchain unavailable",
            ExecutionStatus::InternalError => "internal error",
        }
    }
}

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Compile,
    Run,
}

impl Stage {
    /// What the stage's binary is called in user-facing messages
    pub fn role(&self) -> &'static str {
        match self {
            Stage::Compile => "compiler",
            Stage::Run => "runtime",
        }
    }
}
