//! Binary resolution for logical toolchains
//!
//! Maps a toolchain record to the executable that should be spawned. The
//! environment is read on every call, never cached.

use std::ffi::OsString;
use std::path::PathBuf;

use tracing::debug;

use crate::config::ToolchainConfig;

/// Resolve a toolchain against the process environment
pub fn resolve(tool: &ToolchainConfig) -> PathBuf {
    resolve_with(tool, |var| std::env::var_os(var))
}

/// Resolve a toolchain using `lookup` for environment variables
///
/// Order: `path_env`, then `<home_env>/bin/<program>`, then the bare program
/// name (left for PATH lookup at spawn time). Never fails; whether the result
/// is runnable is only known once it is spawned.
pub fn resolve_with<F>(tool: &ToolchainConfig, lookup: F) -> PathBuf
where
    F: Fn(&str) -> Option<OsString>,
{
    let read = |var: Option<&str>| var.and_then(&lookup).filter(|value| !value.is_empty());

    if let Some(path) = read(tool.path_env.as_deref()) {
        let path = with_exe_suffix(PathBuf::from(path), std::env::consts::EXE_SUFFIX);
        debug!(program = %tool.program, path = %path.display(), "resolved from path override");
        return path;
    }

    if let Some(home) = read(tool.home_env.as_deref()) {
        let path = with_exe_suffix(
            PathBuf::from(home).join("bin").join(&tool.program),
            std::env::consts::EXE_SUFFIX,
        );
        debug!(program = %tool.program, path = %path.display(), "resolved from home override");
        return path;
    }

    PathBuf::from(&tool.program)
}

/// Prefer `<path><suffix>` when `path` has no extension and the suffixed file exists
fn with_exe_suffix(path: PathBuf, suffix: &str) -> PathBuf {
    if suffix.is_empty() || path.extension().is_some() {
        return path;
    }

    let mut candidate = path.clone().into_os_string();
    candidate.push(suffix);
    let candidate = PathBuf::from(candidate);

    if candidate.exists() { candidate } else { path }
}
