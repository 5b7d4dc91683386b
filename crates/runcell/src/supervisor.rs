//! Process spawning and I/O
//!
//! Runs a single process with its working directory pinned, feeds batched
//! stdin, drains stdout/stderr as bytes arrive and enforces a wall clock
//! timeout. Every outcome, including a failed spawn, comes back as an
//! [`ExecutionResult`].

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use crate::types::{ExecutionResult, ExecutionStatus, Stage, millis};

/// How long output readers may keep draining after the process has exited.
///
/// Background grandchildren can hold the pipes open indefinitely.
const DRAIN_GRACE: Duration = Duration::from_millis(250);

const READ_CHUNK: usize = 8192;

/// A single process invocation
#[derive(Debug, Clone)]
pub struct Invocation {
    program: PathBuf,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    input: Option<Vec<u8>>,
    env: HashMap<String, String>,
    timeout: Duration,
    max_output: Option<usize>,
    stage: Stage,
}

impl Invocation {
    /// Create an invocation for `program` with a 10 second timeout
    pub fn new(program: impl Into<PathBuf>, stage: Stage) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            input: None,
            env: HashMap::new(),
            timeout: Duration::from_secs(10),
            max_output: None,
            stage,
        }
    }

    /// Set the arguments
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the working directory
    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Set data written to stdin; stdin is closed right after
    pub fn input(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.input = Some(data.into());
        self
    }

    /// Set an environment variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set several environment variables
    pub fn envs<'a>(mut self, vars: impl IntoIterator<Item = (&'a String, &'a String)>) -> Self {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Set the wall clock timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Cap captured bytes per stream
    pub fn max_output(mut self, bytes: Option<usize>) -> Self {
        self.max_output = bytes;
        self
    }
}

/// Run a process to completion or timeout
#[instrument(skip(invocation), fields(program = %invocation.program.display(), stage = ?invocation.stage))]
pub async fn run(invocation: Invocation) -> ExecutionResult {
    let Invocation {
        program,
        args,
        cwd,
        input,
        env,
        timeout,
        max_output,
        stage,
    } = invocation;

    let started = Instant::now();

    let mut command = Command::new(&program);
    command
        .args(&args)
        .envs(&env)
        .stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(ref cwd) = cwd {
        command.current_dir(cwd);
    }

    debug!(?args, ?cwd, "spawning process");

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            debug!(error = %e, "spawn failed");
            return ExecutionResult::failure(
                ExecutionStatus::ToolchainUnavailable,
                stage,
                e.to_string(),
                started.elapsed(),
            );
        }
    };

    let stdout = Capture::start(child.stdout.take(), max_output);
    let stderr = Capture::start(child.stderr.take(), max_output);

    let feeder = match (child.stdin.take(), input) {
        (Some(mut stdin), Some(data)) => Some(tokio::spawn(async move {
            if let Err(e) = stdin.write_all(&data).await {
                // The program may exit without reading its input
                debug!(error = %e, "stdin write interrupted");
            }
            // Dropping stdin closes it
        })),
        _ => None,
    };

    let mut timed_out = false;
    let exit = match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => Ok(status),
        Ok(Err(e)) => Err(e),
        Err(_) => {
            timed_out = true;
            debug!(timeout_ms = millis(timeout), "timeout expired, killing process");
            if let Err(e) = child.kill().await {
                warn!(error = %e, "failed to kill timed out process");
            }
            child.wait().await
        }
    };
    let elapsed = started.elapsed();

    if let Some(feeder) = feeder {
        feeder.abort();
    }

    let stdout = stdout.finish().await;
    let stderr = stderr.finish().await;

    let mut stderr_text = stderr.text();
    for (name, captured) in [("stdout", &stdout), ("stderr", &stderr)] {
        if captured.truncated {
            push_line(
                &mut stderr_text,
                &format!("[{name} truncated after {} bytes]", captured.bytes.len()),
            );
        }
    }

    let exit = match exit {
        Ok(exit) => exit,
        Err(e) => {
            warn!(error = %e, "failed to wait for process");
            let mut result = ExecutionResult::failure(
                ExecutionStatus::InternalError,
                stage,
                stderr_text,
                elapsed,
            );
            push_line(&mut result.stderr, &format!("failed to wait for process: {e}"));
            result.stdout = stdout.text();
            return result;
        }
    };

    let (status, signal) = classify(exit, timed_out);
    let result = ExecutionResult {
        status,
        stage,
        stdout: stdout.text(),
        stderr: stderr_text,
        exit_code: exit.code(),
        signal,
        duration_ms: millis(elapsed),
        timed_out,
    };

    debug!(
        status = ?result.status,
        exit_code = ?result.exit_code,
        duration_ms = result.duration_ms,
        "process finished"
    );

    result
}

fn classify(exit: ExitStatus, timed_out: bool) -> (ExecutionStatus, Option<i32>) {
    let signal = exit_signal(&exit);
    let status = if timed_out {
        ExecutionStatus::TimedOut
    } else {
        match exit.code() {
            Some(0) => ExecutionStatus::Ok,
            Some(_) => ExecutionStatus::RuntimeError,
            None => ExecutionStatus::Signaled,
        }
    };
    (status, signal)
}

#[cfg(unix)]
fn exit_signal(exit: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    exit.signal()
}

#[cfg(not(unix))]
fn exit_signal(_exit: &ExitStatus) -> Option<i32> {
    None
}

fn push_line(text: &mut String, line: &str) {
    if !text.is_empty() {
        text.push('\n');
    }
    text.push_str(line);
}

/// Bytes collected from one output stream
#[derive(Debug, Default)]
struct Captured {
    bytes: Vec<u8>,
    truncated: bool,
}

impl Captured {
    fn push(&mut self, chunk: &[u8], limit: Option<usize>) {
        let room = match limit {
            Some(limit) => limit.saturating_sub(self.bytes.len()),
            None => chunk.len(),
        };
        if chunk.len() > room {
            self.truncated = true;
        }
        self.bytes.extend_from_slice(&chunk[..chunk.len().min(room)]);
    }

    fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).trim().to_owned()
    }
}

/// Background reader draining a pipe into a shared buffer
struct Capture {
    buffer: Arc<Mutex<Captured>>,
    task: Option<JoinHandle<()>>,
}

impl Capture {
    fn start<R>(reader: Option<R>, limit: Option<usize>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = Arc::new(Mutex::new(Captured::default()));
        let task = reader.map(|mut reader| {
            let buffer = Arc::clone(&buffer);
            tokio::spawn(async move {
                let mut chunk = vec![0u8; READ_CHUNK];
                loop {
                    match reader.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => buffer
                            .lock()
                            .unwrap_or_else(|poisoned| poisoned.into_inner())
                            .push(&chunk[..n], limit),
                    }
                }
            })
        });
        Self { buffer, task }
    }

    /// Wait briefly for the reader to hit EOF, then take whatever was captured
    async fn finish(self) -> Captured {
        if let Some(mut task) = self.task
            && tokio::time::timeout(DRAIN_GRACE, &mut task).await.is_err()
        {
            debug!("output still open after exit, abandoning reader");
            task.abort();
        }
        std::mem::take(
            &mut *self
                .buffer
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }
}
