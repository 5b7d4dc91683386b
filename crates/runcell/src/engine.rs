//! Request orchestration
//!
//! [`Engine::execute`] is the entry point callers use: it checks the request,
//! creates a session, runs the pipeline and always removes the session
//! directory afterwards.

use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::config::{Config, Language};
use crate::guard::{self, GuardError};
use crate::runner::Runner;
use crate::session::{Session, SessionState};
use crate::toolchain::{self, BinaryStatus};
use crate::types::{ExecutionRequest, ExecutionResult, ExecutionStatus, Stage};

/// Reasons a request is refused before any process is started
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RejectedError {
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("code is {size} bytes, the limit is {limit}")]
    CodeTooLarge { size: usize, limit: usize },

    #[error("input is {size} bytes, the limit is {limit}")]
    InputTooLarge { size: usize, limit: usize },

    #[error("code rejected: {0}")]
    Denied(#[from] GuardError),
}

/// Summary of one configured language
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct LanguageInfo {
    pub id: String,
    pub name: String,
    pub compiled: bool,
    pub tools: Vec<String>,
}

/// Multi-language execution engine
///
/// Cheap to clone; every clone shares the same read-only configuration.
/// Requests are independent and may run concurrently.
#[derive(Debug, Clone)]
pub struct Engine {
    runner: Runner,
}

impl Engine {
    /// Create an engine with the given configuration
    pub fn new(config: Config) -> Self {
        Self {
            runner: Runner::new(config),
        }
    }

    /// Create an engine with the embedded default configuration
    pub fn with_defaults() -> Self {
        Self::new(Config::default())
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        self.runner.config()
    }

    /// Check a submission without running it
    ///
    /// Applies the same checks `execute` does before a session directory is
    /// created: known language, size ceilings and the language's content rule.
    pub fn check(&self, request: &ExecutionRequest) -> Result<&Language, RejectedError> {
        let config = self.config();
        let language = config
            .get_language(&request.language)
            .map_err(|_| RejectedError::UnsupportedLanguage(request.language.clone()))?;

        if request.code.len() > config.max_code_bytes {
            return Err(RejectedError::CodeTooLarge {
                size: request.code.len(),
                limit: config.max_code_bytes,
            });
        }
        if let Some(ref input) = request.input
            && input.len() > config.max_input_bytes
        {
            return Err(RejectedError::InputTooLarge {
                size: input.len(),
                limit: config.max_input_bytes,
            });
        }

        guard::validate(&request.code, language.guard.as_ref())?;
        Ok(language)
    }

    /// Run a request to completion
    ///
    /// Returns `Err` only when the request is rejected before execution. Every
    /// other outcome, including compile errors, timeouts, missing toolchains
    /// and session setup failures, is an `Ok` result with the matching status.
    #[instrument(skip(self, request), fields(language = %request.language))]
    pub async fn execute(
        &self,
        request: &ExecutionRequest,
    ) -> Result<ExecutionResult, RejectedError> {
        let started = Instant::now();
        let mut session = Session::new(self.config().work_root(), &request.language);
        debug!(session = %session.id(), "session created");

        session.transition(SessionState::Validating);
        let language = match self.check(request) {
            Ok(language) => language,
            Err(e) => {
                session.transition(SessionState::Rejected);
                debug!(session = %session.id(), reason = %e, "request rejected");
                return Err(e);
            }
        };
        session.transition(SessionState::Validated);

        let first_stage = if language.is_compiled() {
            Stage::Compile
        } else {
            Stage::Run
        };

        let result = match session.materialize().await {
            Ok(()) => {
                session.transition(SessionState::Running);
                self.runner
                    .run(
                        &session,
                        language,
                        &request.code,
                        request.input.as_deref(),
                        request.limits.as_ref(),
                    )
                    .await
            }
            Err(e) => {
                warn!(session = %session.id(), error = %e, "failed to set up session");
                ExecutionResult::failure(
                    ExecutionStatus::InternalError,
                    first_stage,
                    e.to_string(),
                    started.elapsed(),
                )
            }
        };

        session.transition(SessionState::Finished(result.status));
        if let Err(e) = session.cleanup().await {
            warn!(session = %session.id(), error = %e, "failed to clean up session");
        }

        debug!(
            session = %session.id(),
            status = ?result.status,
            stage = ?result.stage,
            total_ms = crate::types::millis(started.elapsed()),
            "request finished"
        );

        Ok(result)
    }

    /// Probe every configured toolchain
    ///
    /// Probes run concurrently and are returned sorted by toolchain ID.
    /// Never fails: an unusable toolchain is reported in its status.
    pub async fn binary_statuses(&self) -> Vec<BinaryStatus> {
        let config = self.config();
        let tools = config.toolchain_ids().into_iter().filter_map(|id| {
            config
                .toolchains
                .get_key_value(id)
                .map(|(id, tool)| (id.as_str(), tool))
        });
        toolchain::probe_all(tools).await
    }

    /// Configured languages in sorted order
    pub fn languages(&self) -> Vec<LanguageInfo> {
        let config = self.config();
        config
            .language_ids()
            .into_iter()
            .filter_map(|id| {
                config.languages.get(id).map(|language| LanguageInfo {
                    id: id.to_owned(),
                    name: language.name.clone(),
                    compiled: language.is_compiled(),
                    tools: language.tools().map(str::to_owned).collect(),
                })
            })
            .collect()
    }

    /// Probe all toolchains and log the outcome, one line per toolchain
    pub async fn log_toolchain_report(&self) -> Vec<BinaryStatus> {
        let statuses = self.binary_statuses().await;
        for status in &statuses {
            if status.available {
                info!(
                    toolchain = %status.name,
                    path = %status.resolved_path.display(),
                    version = status.version.as_deref().and_then(|v| v.lines().next()).unwrap_or(""),
                    "toolchain available"
                );
            } else {
                warn!(
                    toolchain = %status.name,
                    path = %status.resolved_path.display(),
                    error = status.error.as_deref().unwrap_or(""),
                    hint = status.hint.as_deref().unwrap_or(""),
                    "toolchain unavailable"
                );
            }
        }
        statuses
    }
}
