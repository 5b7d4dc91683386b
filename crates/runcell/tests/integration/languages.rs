use std::time::{Duration, Instant};

use runcell::config::Config;
use runcell::{ExecutionRequest, ExecutionStatus, RejectedError, ResourceLimits, Stage};

use super::{engine_in, fixture_source, leftover_sessions};

async fn run(language: &str, source: &str, input: Option<&str>) -> runcell::ExecutionResult {
    let root = tempfile::tempdir().unwrap();
    let engine = engine_in(Config::default(), root.path());

    let mut request = ExecutionRequest::new(language, fixture_source(source));
    if let Some(input) = input {
        request = request.with_input(input);
    }
    let result = engine.execute(&request).await.expect("request rejected");
    assert_eq!(leftover_sessions(root.path()), 0);
    result
}

#[tokio::test]
#[ignore = "requires gcc"]
async fn test_c_hello_world() {
    let result = run("c", "hello.c", None).await;

    assert!(result.is_success(), "stderr: {}", result.stderr);
    assert_eq!(result.stdout, "Hello, World!");
    assert_eq!(result.stage, Stage::Run);
}

#[tokio::test]
#[ignore = "requires gcc"]
async fn test_c_stdin_echo() {
    let result = run("c", "echo.c", Some("alpha\nbeta\n")).await;

    assert!(result.is_success());
    assert_eq!(result.stdout, "alpha\nbeta");
}

#[tokio::test]
#[ignore = "requires gcc"]
async fn test_c_compile_error() {
    let result = run("c", "compile_error.c", None).await;

    assert_eq!(result.status, ExecutionStatus::CompileError);
    assert_eq!(result.stage, Stage::Compile);
    assert_eq!(result.stdout, "");
    assert!(result.stderr.contains("error"));
    assert!(matches!(result.exit_code, Some(code) if code != 0));
}

#[tokio::test]
#[ignore = "requires gcc"]
async fn test_c_exit_code() {
    let result = run("c", "exit_code.c", None).await;

    assert_eq!(result.status, ExecutionStatus::RuntimeError);
    assert_eq!(result.exit_code, Some(42));
}

#[tokio::test]
#[ignore = "requires g++"]
async fn test_cpp_hello_world() {
    let result = run("cpp", "hello.cpp", None).await;

    assert!(result.is_success(), "stderr: {}", result.stderr);
    assert_eq!(result.stdout, "Hello, World!");
}

#[tokio::test]
#[ignore = "requires javac and java"]
async fn test_java_hello_world_uses_public_class() {
    let result = run("java", "Hello.java", None).await;

    assert!(result.is_success(), "stderr: {}", result.stderr);
    assert_eq!(result.stdout, "Hello, World!");
}

#[tokio::test]
#[ignore = "requires javac and java"]
async fn test_java_stdin_echo() {
    let result = run("java", "Echo.java", Some("one\ntwo\n")).await;

    assert!(result.is_success(), "stderr: {}", result.stderr);
    assert_eq!(result.stdout, "one\ntwo");
}

#[tokio::test]
#[ignore = "requires python3"]
async fn test_python_hello_world() {
    let result = run("python", "hello.py", None).await;

    assert!(result.is_success(), "stderr: {}", result.stderr);
    assert_eq!(result.stdout, "Hello, World!");
}

#[tokio::test]
#[ignore = "requires python3"]
async fn test_python_stdin_echo() {
    let result = run("python", "echo.py", Some("x\ny\n")).await;

    assert_eq!(result.stdout, "x\ny");
}

#[tokio::test]
#[ignore = "requires python3"]
async fn test_python_timeout() {
    let root = tempfile::tempdir().unwrap();
    let engine = engine_in(Config::default(), root.path());
    let request = ExecutionRequest::new("python", fixture_source("spin.py"))
        .with_limits(ResourceLimits::unset().with_wall_time_ms(500));

    let started = Instant::now();
    let result = engine.execute(&request).await.expect("request rejected");

    assert_eq!(result.status, ExecutionStatus::TimedOut);
    assert!(result.timed_out);
    assert_eq!(result.exit_code, None);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(leftover_sessions(root.path()), 0);
}

#[tokio::test]
#[ignore = "requires node"]
async fn test_javascript_hello_world() {
    let result = run("javascript", "hello.js", None).await;

    assert!(result.is_success(), "stderr: {}", result.stderr);
    assert_eq!(result.stdout, "Hello, World!");
}

#[tokio::test]
#[ignore = "requires node"]
async fn test_javascript_require_with_marker() {
    let code = format!("// allow-require\n{}", fixture_source("require.js"));
    let root = tempfile::tempdir().unwrap();
    let engine = engine_in(Config::default(), root.path());

    let result = engine
        .execute(&ExecutionRequest::new("javascript", code))
        .await
        .expect("request rejected");
    assert_eq!(result.stdout, "true");
}

#[tokio::test]
async fn test_javascript_require_without_marker_is_rejected() {
    let root = tempfile::tempdir().unwrap();
    let engine = engine_in(Config::default(), root.path());

    let err = engine
        .execute(&ExecutionRequest::new("javascript", fixture_source("require.js")))
        .await
        .unwrap_err();
    assert!(matches!(err, RejectedError::Denied(_)));
}

#[tokio::test]
#[ignore = "requires php"]
async fn test_php_prelude_is_added() {
    let result = run("php", "hello.php", None).await;

    assert!(result.is_success(), "stderr: {}", result.stderr);
    assert_eq!(result.stdout, "Hello, World!");
}
