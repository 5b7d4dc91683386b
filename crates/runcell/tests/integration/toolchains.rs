use std::os::unix::fs::PermissionsExt;

use runcell::Engine;
use runcell::config::{Config, ToolchainConfig};
use runcell::toolchain;

use super::fixture_config;

fn fake_tool(dir: &std::path::Path, name: &str, body: &str) -> ToolchainConfig {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    ToolchainConfig::new(path.to_string_lossy())
}

#[tokio::test]
async fn test_binary_statuses_are_sorted_and_complete() {
    let config = Config::from_file(fixture_config("sh_languages.toml")).unwrap();
    let engine = Engine::new(config);

    let statuses = engine.binary_statuses().await;
    let names: Vec<&str> = statuses.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["ghost", "sh"]);

    let ghost = &statuses[0];
    assert!(!ghost.available);
    assert!(ghost.version.is_none());
    assert!(ghost.error.is_some());
    assert!(ghost.hint.as_deref().unwrap().contains("RUNCELL_TEST_GHOST_PATH"));
}

#[tokio::test]
async fn test_report_covers_every_toolchain() {
    let mut config = Config::empty();
    let dir = tempfile::tempdir().unwrap();
    config
        .toolchains
        .insert("cc".to_owned(), fake_tool(dir.path(), "cc", "echo 'cc 9.9'"));
    config
        .toolchains
        .insert("jvm".to_owned(), fake_tool(dir.path(), "jvm", "echo 'jvm 21' >&2"));
    config.toolchains.insert(
        "broken".to_owned(),
        fake_tool(dir.path(), "broken", "echo 'bad flag' >&2; exit 1"),
    );
    let engine = Engine::new(config);

    let statuses = engine.log_toolchain_report().await;
    assert_eq!(statuses.len(), 3);

    let by_name = |name: &str| statuses.iter().find(|s| s.name == name).unwrap();
    assert_eq!(by_name("cc").version.as_deref(), Some("cc 9.9"));
    assert_eq!(by_name("jvm").version.as_deref(), Some("jvm 21"));
    assert!(!by_name("broken").available);
    assert_eq!(by_name("broken").error.as_deref(), Some("bad flag"));
}

#[tokio::test]
async fn test_probes_are_independent() {
    let dir = tempfile::tempdir().unwrap();
    let real = fake_tool(dir.path(), "realcc", "echo 'realcc 1.0'");
    let tool = ToolchainConfig::new("/nonexistent/runcell/cc");

    let before = toolchain::probe("cc", &tool).await;
    assert!(!before.available);

    let after = toolchain::probe("cc", &real).await;
    assert!(after.available);
    assert_eq!(after.version.as_deref(), Some("realcc 1.0"));
}
