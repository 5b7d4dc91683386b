//! Execution step for code running
//!
//! Runs an interpreted source or a compiled artifact with the request's input.

use std::path::PathBuf;

use tracing::{debug, instrument};

use crate::config::{Config, Language, ToolchainConfig};
use crate::runner::{PreparedSource, describe_unavailable};
use crate::session::Session;
use crate::supervisor::{self, Invocation};
use crate::toolchain;
use crate::types::{ExecutionResult, ExecutionStatus, ResourceLimits, Stage};

/// Execute the prepared program in the session directory with batch I/O
#[instrument(skip_all, fields(language = %language.name))]
pub async fn execute(
    config: &Config,
    session: &Session,
    language: &Language,
    prepared: &PreparedSource,
    input: Option<&str>,
    limits: Option<&ResourceLimits>,
) -> ExecutionResult {
    // Determine effective limits: config defaults → language run limits → user overrides
    let mut effective_limits = config.effective_limits(language.run.limits.as_ref());
    if let Some(user_limits) = limits {
        effective_limits = effective_limits.with_overrides(user_limits);
    }

    let placeholders = prepared.placeholders();
    let (program, tool) = match run_program(config, language, prepared) {
        Ok(resolved) => resolved,
        Err(message) => {
            return ExecutionResult::failure(
                ExecutionStatus::InternalError,
                Stage::Run,
                message,
                std::time::Duration::ZERO,
            );
        }
    };
    let args = Language::expand_command(&language.run.args, &placeholders);

    debug!(program = %program.display(), ?args, "executing program");

    let mut invocation = Invocation::new(&program, Stage::Run)
        .args(args)
        .cwd(session.work_dir())
        .envs(&language.run.env)
        .timeout(effective_limits.timeout(10_000))
        .max_output(effective_limits.max_output_bytes());
    if let Some(input) = input {
        invocation = invocation.input(input.as_bytes());
    }

    let result = supervisor::run(invocation).await;
    let result = describe_unavailable(result, Stage::Run, &program.to_string_lossy(), tool);

    debug!(
        status = ?result.status,
        exit_code = ?result.exit_code,
        duration_ms = result.duration_ms,
        timed_out = result.timed_out,
        "execution complete"
    );

    result
}

/// Pick the binary for the run stage: a runtime toolchain or the artifact itself
fn run_program<'a>(
    config: &'a Config,
    language: &Language,
    prepared: &PreparedSource,
) -> Result<(PathBuf, Option<&'a ToolchainConfig>), String> {
    match (&language.run.tool, &language.run.program) {
        (Some(tool_id), _) => {
            let tool = config.get_toolchain(tool_id).map_err(|e| e.to_string())?;
            Ok((toolchain::resolve(tool), Some(tool)))
        }
        (None, Some(template)) => {
            let expanded =
                Language::expand_command(std::slice::from_ref(template), &prepared.placeholders());
            let program = expanded.into_iter().next().unwrap_or_default();
            Ok((PathBuf::from(program), None))
        }
        (None, None) => Err(format!("language '{}' has empty run command", language.name)),
    }
}
