//! Toolchain availability probes
//!
//! A probe spawns a binary with its version flag and reports what happened.
//! Probes are diagnostics only: nothing gates execution on them.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, instrument};

use crate::config::ToolchainConfig;
use crate::supervisor::{self, Invocation};
use crate::toolchain::resolve::resolve;
use crate::types::{ExecutionStatus, Stage};

/// Upper bound on a single version probe
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Availability of one toolchain binary, produced fresh by every probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BinaryStatus {
    /// Logical toolchain ID
    pub name: String,

    /// The path that was spawned
    pub resolved_path: PathBuf,

    /// Whether the version probe exited with code 0
    pub available: bool,

    /// Version text printed by the binary (stdout and stderr combined)
    pub version: Option<String>,

    /// Why the binary is unavailable
    pub error: Option<String>,

    /// How to make the binary available
    pub hint: Option<String>,
}

/// Probe a single toolchain
#[instrument(skip(tool), fields(program = %tool.program))]
pub async fn probe(name: &str, tool: &ToolchainConfig) -> BinaryStatus {
    let resolved_path = resolve(tool);

    let result = supervisor::run(
        Invocation::new(&resolved_path, Stage::Run)
            .args([tool.version_arg.as_str()])
            .timeout(PROBE_TIMEOUT),
    )
    .await;

    let mut status = BinaryStatus {
        name: name.to_owned(),
        resolved_path,
        available: false,
        version: None,
        error: None,
        hint: None,
    };

    match result.status {
        ExecutionStatus::Ok => {
            status.available = true;
            status.version = Some(combined(&result.stdout, &result.stderr));
        }
        ExecutionStatus::TimedOut => {
            status.error = Some("version probe timed out".to_owned());
        }
        _ if result.stderr.is_empty() => {
            status.error = Some(match result.exit_code {
                Some(code) => format!("version probe exited with code {code}"),
                None => "version probe was killed".to_owned(),
            });
        }
        _ => {
            status.error = Some(result.stderr);
        }
    }

    if !status.available {
        status.hint = Some(tool.describe_hint());
    }

    debug!(
        available = status.available,
        path = %status.resolved_path.display(),
        "probed toolchain"
    );

    status
}

/// Probe several toolchains concurrently, preserving input order
pub async fn probe_all<'a, I>(tools: I) -> Vec<BinaryStatus>
where
    I: IntoIterator<Item = (&'a str, &'a ToolchainConfig)>,
{
    futures::future::join_all(tools.into_iter().map(|(name, tool)| probe(name, tool))).await
}

fn combined(stdout: &str, stderr: &str) -> String {
    match (stdout.is_empty(), stderr.is_empty()) {
        (false, false) => format!("{stdout}\n{stderr}"),
        (false, true) => stdout.to_owned(),
        _ => stderr.to_owned(),
    }
}
