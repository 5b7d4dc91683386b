//! Integration tests for runcell
//!
//! Engine tests drive languages backed by `/bin/sh` and run on any unix host.
//! Tests against real toolchains (gcc, g++, javac, python3, node, php) need
//! them installed and are behind the `integration-tests` feature, each marked
//! `#[ignore]` with the toolchain it needs. To include them:
//!    cargo test -p runcell --features integration-tests -- --include-ignored

use std::fs;
use std::path::Path;

use runcell::{Config, Engine};

#[cfg(unix)]
mod engine;
#[cfg(feature = "integration-tests")]
mod languages;
#[cfg(unix)]
mod toolchains;

const FIXTURES_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");

/// Helper to get fixture file content
pub(crate) fn fixture_source(name: &str) -> String {
    let path = format!("{FIXTURES_PATH}/sources/{name}");
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to read fixture {path}: {e}"))
}

/// Path to a fixture config
pub(crate) fn fixture_config(name: &str) -> String {
    format!("{FIXTURES_PATH}/configs/{name}")
}

/// Engine over `config` whose sessions live under `root`
pub(crate) fn engine_in(mut config: Config, root: &Path) -> Engine {
    config.work_root = Some(root.to_path_buf());
    Engine::new(config)
}

/// Number of entries left in a work root
pub(crate) fn leftover_sessions(root: &Path) -> usize {
    fs::read_dir(root).map(|dir| dir.count()).unwrap_or(0)
}
