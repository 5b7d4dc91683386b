//! Compilation step for code execution
//!
//! Runs the language's compiler inside the session directory and turns a
//! failed build into a `CompileError` result.

use std::time::Duration;

use tracing::{debug, instrument};

use crate::config::{Config, Language};
use crate::runner::{PreparedSource, describe_unavailable};
use crate::session::Session;
use crate::supervisor::{self, Invocation};
use crate::toolchain;
use crate::types::{ExecutionResult, ExecutionStatus, ResourceLimits, Stage};

/// Result of a compilation
#[derive(Debug, Clone)]
pub struct CompileResult {
    /// Whether compilation succeeded and produced the artifact
    pub success: bool,

    /// Execution result from the compilation process
    pub execution: ExecutionResult,

    /// Compiler diagnostics (stderr, or stdout when stderr is empty)
    pub output: String,
}

impl CompileResult {
    /// Check if compilation was successful
    pub fn is_success(&self) -> bool {
        self.success && self.execution.exit_code == Some(0)
    }

    /// Final result for a submission whose compile stage failed
    ///
    /// A compiler that ran and rejected the source becomes `CompileError` with
    /// its diagnostics on stderr and nothing on stdout. Timeouts, spawn
    /// failures and setup errors keep their own status.
    pub fn into_failure(self) -> ExecutionResult {
        let mut result = self.execution;
        if matches!(
            result.status,
            ExecutionStatus::RuntimeError | ExecutionStatus::Signaled
        ) {
            result.status = ExecutionStatus::CompileError;
            result.stdout = String::new();
            result.stderr = self.output;
        }
        result.stage = Stage::Compile;
        result
    }
}

/// Default compilation limits
fn default_compile_limits() -> ResourceLimits {
    ResourceLimits {
        wall_time_ms: Some(30_000),
        memory_limit: Some(512 * ResourceLimits::MB),
        max_output: Some(ResourceLimits::MB),
    }
}

/// Compile the prepared source in the session directory
#[instrument(skip_all, fields(language = %language.name, source = %prepared.source_name))]
pub async fn compile(
    config: &Config,
    session: &Session,
    language: &Language,
    prepared: &PreparedSource,
) -> CompileResult {
    let Some(compile_config) = language.compile.as_ref() else {
        return internal_failure(format!(
            "language '{}' does not support compilation",
            language.name
        ));
    };

    let tool = match config.get_toolchain(&compile_config.tool) {
        Ok(tool) => tool,
        Err(e) => return internal_failure(e.to_string()),
    };
    let compiler = toolchain::resolve(tool);

    // Determine limits
    let base_limits = default_compile_limits();
    let effective_limits = match compile_config.limits.as_ref() {
        Some(lang) => base_limits.with_overrides(lang),
        None => base_limits,
    };

    let args = Language::expand_command(&compile_config.args, &prepared.placeholders());
    debug!(compiler = %compiler.display(), ?args, "compiling");

    let result = supervisor::run(
        Invocation::new(&compiler, Stage::Compile)
            .args(args)
            .cwd(session.work_dir())
            .envs(&compile_config.env)
            .timeout(effective_limits.timeout(30_000))
            .max_output(effective_limits.max_output_bytes()),
    )
    .await;

    let mut execution = describe_unavailable(
        result,
        Stage::Compile,
        &compiler.to_string_lossy(),
        Some(tool),
    );

    let mut success = execution.status == ExecutionStatus::Ok;
    let mut output = if execution.stderr.is_empty() {
        execution.stdout.clone()
    } else {
        execution.stderr.clone()
    };

    if success
        && let Some(ref artifact) = prepared.output_name
        && !session.file_exists(artifact).await.unwrap_or(false)
    {
        success = false;
        output = format!("compiler exited successfully but produced no '{artifact}'");
        execution.status = ExecutionStatus::InternalError;
        execution.stderr = output.clone();
        execution.exit_code = Some(1);
    }

    debug!(
        success,
        exit_code = ?execution.exit_code,
        status = ?execution.status,
        duration_ms = execution.duration_ms,
        "compilation complete"
    );

    CompileResult {
        success,
        execution,
        output,
    }
}

fn internal_failure(message: String) -> CompileResult {
    CompileResult {
        success: false,
        execution: ExecutionResult::failure(
            ExecutionStatus::InternalError,
            Stage::Compile,
            message.clone(),
            Duration::ZERO,
        ),
        output: message,
    }
}
