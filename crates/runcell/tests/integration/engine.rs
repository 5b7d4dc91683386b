use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use runcell::config::Config;
use runcell::guard::GuardError;
use runcell::{ExecutionRequest, ExecutionStatus, RejectedError, ResourceLimits, Stage};

use super::{engine_in, fixture_config, leftover_sessions};

fn sh_config() -> Config {
    Config::from_file(fixture_config("sh_languages.toml")).expect("Failed to load config")
}

#[tokio::test]
async fn test_interpreted_hello_world() {
    let root = tempfile::tempdir().unwrap();
    let engine = engine_in(sh_config(), root.path());

    let result = engine
        .execute(&ExecutionRequest::new("shell", "echo 'Hello, World!'"))
        .await
        .expect("request rejected");

    assert!(result.is_success());
    assert_eq!(result.status, ExecutionStatus::Ok);
    assert_eq!(result.stage, Stage::Run);
    assert_eq!(result.stdout, "Hello, World!");
    assert_eq!(result.stderr, "");
    assert_eq!(result.exit_code, Some(0));
    assert!(!result.timed_out);
    assert_eq!(leftover_sessions(root.path()), 0);
}

#[tokio::test]
async fn test_stdin_is_echoed() {
    let root = tempfile::tempdir().unwrap();
    let engine = engine_in(sh_config(), root.path());

    let request = ExecutionRequest::new("shell", "cat").with_input("first line\nsecond line\n");
    let result = engine.execute(&request).await.expect("request rejected");

    assert!(result.is_success());
    assert_eq!(result.stdout, "first line\nsecond line");
}

#[tokio::test]
async fn test_without_input_stdin_is_empty() {
    let root = tempfile::tempdir().unwrap();
    let engine = engine_in(sh_config(), root.path());

    let result = engine
        .execute(&ExecutionRequest::new("shell", "cat; echo done"))
        .await
        .expect("request rejected");

    assert_eq!(result.stdout, "done");
}

#[tokio::test]
async fn test_runtime_error_keeps_exit_code_and_stderr() {
    let root = tempfile::tempdir().unwrap();
    let engine = engine_in(sh_config(), root.path());

    let result = engine
        .execute(&ExecutionRequest::new(
            "shell",
            "echo partial; echo 'went wrong' >&2; exit 3",
        ))
        .await
        .expect("request rejected");

    assert!(!result.is_success());
    assert_eq!(result.status, ExecutionStatus::RuntimeError);
    assert_eq!(result.exit_code, Some(3));
    assert_eq!(result.stdout, "partial");
    assert_eq!(result.stderr, "went wrong");
}

#[tokio::test]
async fn test_program_killed_by_signal() {
    let root = tempfile::tempdir().unwrap();
    let engine = engine_in(sh_config(), root.path());

    let result = engine
        .execute(&ExecutionRequest::new("shell", "kill -9 $$"))
        .await
        .expect("request rejected");

    assert_eq!(result.status, ExecutionStatus::Signaled);
    assert_eq!(result.exit_code, None);
    assert_eq!(result.signal, Some(9));
    assert!(!result.timed_out);
}

#[tokio::test]
async fn test_timeout_kills_program() {
    let root = tempfile::tempdir().unwrap();
    let engine = engine_in(sh_config(), root.path());

    let request = ExecutionRequest::new("shell", "echo started; sleep 30")
        .with_limits(ResourceLimits::unset().with_wall_time_ms(300));
    let started = Instant::now();
    let result = engine.execute(&request).await.expect("request rejected");
    let elapsed = started.elapsed();

    assert_eq!(result.status, ExecutionStatus::TimedOut);
    assert!(result.timed_out);
    assert_eq!(result.exit_code, None);
    assert_eq!(result.stdout, "started");
    assert!(result.duration_ms >= 300);
    // An orphaned sleep may keep the pipes open; the drain grace bounds the wait
    assert!(elapsed < Duration::from_secs(5), "took {elapsed:?}");
    assert_eq!(leftover_sessions(root.path()), 0);
}

#[tokio::test]
async fn test_compile_then_run() {
    let root = tempfile::tempdir().unwrap();
    let engine = engine_in(sh_config(), root.path());

    let result = engine
        .execute(&ExecutionRequest::new("shellc", "echo compiled; echo \"$0\""))
        .await
        .expect("request rejected");

    assert!(result.is_success(), "stderr: {}", result.stderr);
    assert_eq!(result.stage, Stage::Run);
    let mut lines = result.stdout.lines();
    assert_eq!(lines.next(), Some("compiled"));
    // The artifact is run by absolute path from inside the session directory
    let program = lines.next().unwrap();
    assert!(program.starts_with(root.path().to_str().unwrap()));
    assert!(program.ends_with("/program"));
    assert_eq!(leftover_sessions(root.path()), 0);
}

#[tokio::test]
async fn test_compile_error_skips_run_stage() {
    let root = tempfile::tempdir().unwrap();
    let engine = engine_in(sh_config(), root.path());

    let result = engine
        .execute(&ExecutionRequest::new("shellc", "echo never; if then fi"))
        .await
        .expect("request rejected");

    assert_eq!(result.status, ExecutionStatus::CompileError);
    assert_eq!(result.stage, Stage::Compile);
    assert_eq!(result.stdout, "");
    assert!(!result.stderr.is_empty());
    assert!(matches!(result.exit_code, Some(code) if code != 0));
    assert_eq!(leftover_sessions(root.path()), 0);
}

#[tokio::test]
async fn test_missing_runtime_is_reported() {
    let root = tempfile::tempdir().unwrap();
    let engine = engine_in(sh_config(), root.path());

    let result = engine
        .execute(&ExecutionRequest::new("ghost", "anything"))
        .await
        .expect("request rejected");

    assert_eq!(result.status, ExecutionStatus::ToolchainUnavailable);
    assert_eq!(result.exit_code, Some(1));
    assert_eq!(result.stdout, "");
    assert!(result.stderr.starts_with("runtime '/nonexistent/runcell/ghost'"));
    assert!(result.stderr.contains("RUNCELL_TEST_GHOST_PATH"));
    assert_eq!(leftover_sessions(root.path()), 0);
}

#[tokio::test]
async fn test_guarded_code_is_rejected_without_session() {
    let root = tempfile::tempdir().unwrap();
    let engine = engine_in(sh_config(), root.path());

    let err = engine
        .execute(&ExecutionRequest::new("guarded", "rm -rf ./data"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RejectedError::Denied(GuardError::UnmarkedPattern { .. })
    ));
    assert!(!root.path().exists() || leftover_sessions(root.path()) == 0);
}

#[tokio::test]
async fn test_marker_allows_guarded_pattern() {
    let root = tempfile::tempdir().unwrap();
    let engine = engine_in(sh_config(), root.path());

    let result = engine
        .execute(&ExecutionRequest::new(
            "guarded",
            "# allow-rm\nmkdir data && rm -rf ./data && echo removed",
        ))
        .await
        .expect("request rejected");

    assert_eq!(result.stdout, "removed");
}

#[tokio::test]
async fn test_oversized_code_is_rejected() {
    let root = tempfile::tempdir().unwrap();
    let engine = engine_in(sh_config(), root.path());

    let code = format!("echo {}", "x".repeat(5000));
    let err = engine
        .execute(&ExecutionRequest::new("shell", code))
        .await
        .unwrap_err();

    assert!(matches!(err, RejectedError::CodeTooLarge { limit: 4096, .. }));
}

#[tokio::test]
async fn test_output_is_capped() {
    let root = tempfile::tempdir().unwrap();
    let engine = engine_in(sh_config(), root.path());

    let result = engine
        .execute(&ExecutionRequest::new(
            "shell",
            "head -c 200000 /dev/zero | tr '\\000' a",
        ))
        .await
        .expect("request rejected");

    assert_eq!(result.stdout.len(), 64 * 1024);
    assert!(result.stderr.contains("[stdout truncated after 65536 bytes]"));
}

#[tokio::test]
async fn test_work_root_is_created_on_demand() {
    let root = tempfile::tempdir().unwrap();
    let nested = root.path().join("a").join("b");
    let engine = engine_in(sh_config(), &nested);

    let result = engine
        .execute(&ExecutionRequest::new("shell", "echo ok"))
        .await
        .expect("request rejected");

    assert_eq!(result.stdout, "ok");
    assert!(nested.is_dir());
    assert_eq!(leftover_sessions(&nested), 0);
}

#[tokio::test]
async fn test_duration_includes_compile_stage() {
    let root = tempfile::tempdir().unwrap();
    let mut config = sh_config();
    let compile = config
        .languages
        .get_mut("shellc")
        .and_then(|language| language.compile.as_mut())
        .unwrap();
    compile.args[1] = format!("sleep 0.3 && {}", compile.args[1]);
    let engine = engine_in(config, root.path());

    let result = engine
        .execute(&ExecutionRequest::new("shellc", "echo fast"))
        .await
        .expect("request rejected");

    assert!(result.is_success());
    assert_eq!(result.stdout, "fast");
    assert!(result.duration_ms >= 300, "duration {}", result.duration_ms);
}

/// `target` spelled relative to the current directory
fn relative_to_cwd(target: &Path) -> PathBuf {
    let cwd = std::env::current_dir().unwrap();
    let mut relative = PathBuf::new();
    for _ in cwd.components().skip(1) {
        relative.push("..");
    }
    relative.join(target.strip_prefix("/").unwrap())
}

#[tokio::test]
async fn test_relative_work_root_runs_compiled_program() {
    let root = tempfile::tempdir().unwrap();
    let relative = relative_to_cwd(root.path());
    assert!(relative.is_relative());
    let engine = engine_in(sh_config(), &relative);

    let result = engine
        .execute(&ExecutionRequest::new("shellc", "echo compiled"))
        .await
        .expect("request rejected");

    assert_eq!(result.status, ExecutionStatus::Ok, "stderr: {}", result.stderr);
    assert_eq!(result.stage, Stage::Run);
    assert_eq!(result.stdout, "compiled");
    assert_eq!(leftover_sessions(root.path()), 0);
}

#[tokio::test]
async fn test_unusable_work_root_is_internal_error() {
    let root = tempfile::tempdir().unwrap();
    let blocker = root.path().join("not-a-dir");
    std::fs::write(&blocker, b"").unwrap();
    let engine = engine_in(sh_config(), &blocker);

    let result = engine
        .execute(&ExecutionRequest::new("shellc", "echo unreachable"))
        .await
        .expect("request rejected");

    assert_eq!(result.status, ExecutionStatus::InternalError);
    assert_eq!(result.stage, Stage::Compile);
    assert_eq!(result.exit_code, Some(1));
    assert!(result.stderr.contains("failed to create session directory"));
}

#[tokio::test]
async fn test_concurrent_requests_are_independent() {
    let root = tempfile::tempdir().unwrap();
    let engine = engine_in(sh_config(), root.path());

    let requests: Vec<ExecutionRequest> = (0..8)
        .map(|i| {
            ExecutionRequest::new("shell", format!("echo {i} > mine.txt; sleep 0.2; cat mine.txt; pwd"))
        })
        .collect();
    let results = futures::future::join_all(requests.iter().map(|r| engine.execute(r))).await;

    let mut dirs = HashSet::new();
    for (i, result) in results.into_iter().enumerate() {
        let result = result.expect("request rejected");
        assert!(result.is_success(), "stderr: {}", result.stderr);
        let mut lines = result.stdout.lines();
        assert_eq!(lines.next(), Some(i.to_string().as_str()));
        dirs.insert(lines.next().unwrap().to_owned());
    }

    assert_eq!(dirs.len(), 8);
    assert_eq!(leftover_sessions(root.path()), 0);
}

#[tokio::test]
async fn test_spawned_engines_share_nothing() {
    let root = tempfile::tempdir().unwrap();
    let engine = engine_in(sh_config(), root.path());

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .execute(&ExecutionRequest::new("shell", format!("echo task-{i}")))
                    .await
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let result = handle.await.unwrap().expect("request rejected");
        assert_eq!(result.stdout, format!("task-{i}"));
    }
    assert_eq!(leftover_sessions(root.path()), 0);
}
