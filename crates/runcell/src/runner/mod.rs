//! Code runner for runcell
//!
//! Drives a [`Language`] record through the generic pipeline: prepare the
//! source, write it into the session directory, optionally compile it, then
//! run it. Every outcome is reported as an [`ExecutionResult`]; nothing in
//! here returns `Err`.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, instrument};

pub use crate::runner::compile::{CompileResult, compile};
pub use crate::runner::execute::execute;

mod compile;
mod execute;

use crate::config::{Config, Language, Placeholders, ToolchainConfig};
use crate::session::Session;
use crate::types::{ExecutionResult, ExecutionStatus, ResourceLimits, Stage};

/// Source text and file names derived from a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedSource {
    /// Source text as written to disk, prelude included
    pub source: String,
    /// Entry identifier (class name for JVM drivers)
    pub entry: String,
    /// Source file name inside the session directory
    pub source_name: String,
    /// Artifact file name, for compiled languages
    pub output_name: Option<String>,
    workdir: String,
    binary: String,
}

impl PreparedSource {
    /// Prepare `code` for `language` in the session directory `work_dir`
    pub fn new(language: &Language, code: &str, work_dir: &Path) -> Self {
        let source = language.prepare_source(code).into_owned();
        let entry = language.entry_for(&source);
        let source_name = language.source_name(&entry);
        let output_name = language.output_name(&entry);
        let binary = output_name
            .as_deref()
            .map(|name| work_dir.join(name).to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            source,
            entry,
            source_name,
            output_name,
            workdir: work_dir.to_string_lossy().into_owned(),
            binary,
        }
    }

    /// Values for command template expansion
    pub fn placeholders(&self) -> Placeholders<'_> {
        Placeholders {
            source: &self.source_name,
            output: self.output_name.as_deref().unwrap_or_default(),
            binary: &self.binary,
            entry: &self.entry,
            workdir: &self.workdir,
        }
    }
}

/// High-level runner for the compile and run stages
#[derive(Debug, Clone)]
pub struct Runner {
    config: Arc<Config>,
}

impl Runner {
    /// Create a new runner with the given configuration
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Create a new runner with default configuration
    pub fn with_defaults() -> Self {
        Self::new(Config::default())
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run a submission inside an already materialized session
    ///
    /// `limits` apply to the run stage only; compile stages use their own budget.
    #[instrument(skip(self, session, language, code, input), fields(session = %session.id(), language = %language.name))]
    pub async fn run(
        &self,
        session: &Session,
        language: &Language,
        code: &str,
        input: Option<&str>,
        limits: Option<&ResourceLimits>,
    ) -> ExecutionResult {
        let started = Instant::now();
        let prepared = PreparedSource::new(language, code, session.work_dir());
        let first_stage = if language.is_compiled() {
            Stage::Compile
        } else {
            Stage::Run
        };

        if let Err(e) = session
            .write_file(&prepared.source_name, prepared.source.as_bytes())
            .await
        {
            return ExecutionResult::failure(
                ExecutionStatus::InternalError,
                first_stage,
                format!("failed to write source file '{}': {e}", prepared.source_name),
                started.elapsed(),
            );
        }

        debug!(
            source_name = %prepared.source_name,
            entry = %prepared.entry,
            "wrote source file"
        );

        let mut compile_ms = 0;
        if language.compile.is_some() {
            let compiled = compile::compile(&self.config, session, language, &prepared).await;
            if !compiled.is_success() {
                return compiled.into_failure();
            }
            compile_ms = compiled.execution.duration_ms;
        }

        let mut result =
            execute::execute(&self.config, session, language, &prepared, input, limits).await;
        // Report the whole pipeline, not just the run stage
        result.duration_ms = result.duration_ms.saturating_add(compile_ms);
        result
    }
}

/// Replace the bare spawn error of a failed stage with an actionable message
pub(crate) fn describe_unavailable(
    mut result: ExecutionResult,
    stage: Stage,
    program: &str,
    tool: Option<&ToolchainConfig>,
) -> ExecutionResult {
    if result.status == ExecutionStatus::ToolchainUnavailable {
        let mut message = format!(
            "{} '{program}' could not be started: {}",
            stage.role(),
            result.stderr
        );
        if let Some(tool) = tool {
            message.push_str(&format!(" ({})", tool.describe_hint()));
        }
        result.stderr = message;
    }
    result
}
