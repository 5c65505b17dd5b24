//! Command Executor
//!
//! This module owns one external-process invocation end-to-end: spawn,
//! output collection, timeout race, cancellation race, and exit
//! classification. Every failure mode is converted into a failed
//! [`ExecutionOutcome`]; nothing escapes the executor as an error.

use super::sanitizer::sanitize_args;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command as TokioCommand};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default timeout for command execution in milliseconds
const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Grace window between a termination request and a forced kill
const KILL_GRACE: Duration = Duration::from_secs(5);

/// Sentinel exit code for a process that never exited normally
const NO_EXIT_CODE: i32 = -1;

/// An external command to execute, immutable once submitted.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use toolguard::tools::Command;
///
/// let command = Command::new("grep")
///     .arg("-i")
///     .arg("pattern")
///     .stdin("haystack\n")
///     .timeout(Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct Command {
    /// Program to execute
    pub program: String,

    /// Ordered arguments (sanitized before spawn)
    pub args: Vec<String>,

    /// Payload written to the process's stdin, which is then closed
    pub input: Option<String>,

    /// Per-command timeout; falls back to the executor default when unset
    pub timeout: Option<Duration>,

    /// Working directory for the process
    pub working_dir: Option<PathBuf>,

    /// Environment overrides, overlaid on the process environment
    pub env: HashMap<String, String>,
}

impl Command {
    /// Create a new command for the given program
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            input: None,
            timeout: None,
            working_dir: None,
            env: HashMap::new(),
        }
    }

    /// Append a single argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the stdin payload
    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }

    /// Set a per-command timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the working directory
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Add an environment override
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// Terminal result of one execution attempt.
///
/// Exactly one of `output`/`error` is populated: `output` iff the command
/// succeeded, `error` otherwise. `exit_code` is `-1` when the process never
/// exited normally (timeout, cancellation, spawn failure, killed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    /// Whether execution succeeded (exit code 0)
    pub success: bool,

    /// Trimmed stdout, present iff `success`
    pub output: Option<String>,

    /// Human-readable failure message, present iff not `success`
    pub error: Option<String>,

    /// Process exit code, or -1 if it never exited normally
    pub exit_code: i32,
}

impl ExecutionOutcome {
    /// Create a success outcome
    pub fn success(output: impl Into<String>, exit_code: i32) -> Self {
        Self {
            success: true,
            output: Some(output.into()),
            error: None,
            exit_code,
        }
    }

    /// Create a failure outcome
    pub fn failure(error: impl Into<String>, exit_code: i32) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.into()),
            exit_code,
        }
    }

    /// The failure message, or empty string for a success
    pub fn message(&self) -> &str {
        self.error.as_deref().unwrap_or("")
    }

    /// Get a human-readable summary
    pub fn summary(&self) -> String {
        if self.success {
            format!(
                "Success (exit code: {}, {} bytes output)",
                self.exit_code,
                self.output.as_deref().unwrap_or("").len()
            )
        } else {
            format!("Failed (exit code: {}): {}", self.exit_code, self.message())
        }
    }
}

/// Failure taxonomy for command execution
///
/// All variants convert uniformly into a failed [`ExecutionOutcome`] via
/// [`ExecutionError::into_outcome`]; the executor never propagates these
/// past its boundary.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("Command timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Command execution was aborted")]
    Cancelled,

    #[error("Failed to execute command: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Command exited with code {0}")]
    NonZeroExit(i32),
}

impl ExecutionError {
    /// Convert into the uniform outcome representation
    pub fn into_outcome(self) -> ExecutionOutcome {
        let exit_code = match self {
            ExecutionError::NonZeroExit(code) => code,
            _ => NO_EXIT_CODE,
        };
        ExecutionOutcome::failure(self.to_string(), exit_code)
    }
}

/// Executor settings, read-only during a call
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    /// Default timeout applied when a command carries none
    pub timeout: Duration,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

impl ExecutorSettings {
    /// Create settings with a custom default timeout in milliseconds
    pub fn with_timeout_ms(timeout_ms: u64) -> Self {
        Self {
            timeout: Duration::from_millis(timeout_ms),
        }
    }
}

/// How one attempt resolved; exactly one branch of the race fires.
enum Resolution {
    Exited(std::io::Result<std::process::ExitStatus>),
    TimedOut,
    Cancelled,
}

/// Supervised executor for external commands
///
/// # Behavior
///
/// 1. Arguments are sanitized against shell injection before spawn
/// 2. The process runs with piped stdin/stdout/stderr and the caller's
///    environment overrides merged over the process environment
/// 3. Natural exit, timeout, and cancellation race; the first to fire
///    resolves the attempt exactly once
/// 4. On every non-natural-exit path the process receives a termination
///    request and is force-killed after a grace window, on a detached task
///    so the caller's outcome is never delayed
#[derive(Debug, Clone, Default)]
pub struct CommandExecutor {
    settings: ExecutorSettings,
}

impl CommandExecutor {
    /// Create an executor with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an executor with custom settings
    pub fn with_settings(settings: ExecutorSettings) -> Self {
        Self { settings }
    }

    /// Get a reference to the settings
    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    /// Execute a command, racing natural exit against timeout and
    /// cancellation
    ///
    /// Never returns an error: every failure mode (spawn failure, non-zero
    /// exit, timeout, cancellation) is mapped to a failed
    /// [`ExecutionOutcome`].
    pub async fn execute(&self, command: &Command, cancel: &CancellationToken) -> ExecutionOutcome {
        let timeout = command.timeout.unwrap_or(self.settings.timeout);
        let args = sanitize_args(&command.args);

        info!(
            program = %command.program,
            args = args.len(),
            timeout_ms = timeout.as_millis() as u64,
            "executing command"
        );

        let mut process = TokioCommand::new(&command.program);
        process
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &command.working_dir {
            process.current_dir(dir);
        }
        process.envs(&command.env);

        let mut child = match process.spawn() {
            Ok(child) => child,
            Err(err) => {
                warn!(program = %command.program, error = %err, "failed to spawn process");
                return ExecutionError::Spawn(err).into_outcome();
            }
        };

        // Write the stdin payload (if any) on its own task and close the
        // stream. The write must not run on this task: a payload larger than
        // the OS pipe buffer would otherwise stall before the timeout and
        // cancellation branches are armed. Write failures are logged, not
        // surfaced: the command may legitimately exit without reading its
        // input.
        if let Some(mut stdin) = child.stdin.take() {
            match command.input.clone() {
                Some(input) => {
                    tokio::spawn(async move {
                        if let Err(err) = stdin.write_all(input.as_bytes()).await {
                            warn!(error = %err, "failed to write stdin payload");
                        }
                        // dropping the handle closes the pipe
                    });
                }
                None => drop(stdin),
            }
        }

        let stdout_task = spawn_reader(child.stdout.take());
        let stderr_task = spawn_reader(child.stderr.take());

        let resolution = tokio::select! {
            status = child.wait() => Resolution::Exited(status),
            _ = tokio::time::sleep(timeout) => Resolution::TimedOut,
            _ = cancel.cancelled() => Resolution::Cancelled,
        };

        match resolution {
            Resolution::Exited(Ok(status)) => {
                let stdout = drain(stdout_task).await;
                let stderr = drain(stderr_task).await;
                let outcome = classify_exit(status, &stdout, &stderr);
                debug!(summary = %outcome.summary(), "command resolved");
                outcome
            }
            Resolution::Exited(Err(err)) => {
                warn!(error = %err, "failed waiting on process");
                stdout_task.abort();
                stderr_task.abort();
                reap(child);
                ExecutionError::Spawn(err).into_outcome()
            }
            Resolution::TimedOut => {
                warn!(timeout_ms = timeout.as_millis() as u64, "command timed out");
                stdout_task.abort();
                stderr_task.abort();
                reap(child);
                ExecutionError::Timeout(timeout).into_outcome()
            }
            Resolution::Cancelled => {
                info!(program = %command.program, "command cancelled");
                stdout_task.abort();
                stderr_task.abort();
                reap(child);
                ExecutionError::Cancelled.into_outcome()
            }
        }
    }

    /// Execute a command, retrying transient failures per `policy`
    ///
    /// See [`crate::retry::execute_with_retry`] for the retry semantics.
    pub async fn execute_with_retry(
        &self,
        command: &Command,
        cancel: &CancellationToken,
        policy: &crate::retry::RetryPolicy,
    ) -> ExecutionOutcome {
        crate::retry::execute_with_retry(policy, cancel, || self.execute(command, cancel)).await
    }
}

/// Map a natural exit status plus collected streams to an outcome
fn classify_exit(
    status: std::process::ExitStatus,
    stdout: &str,
    stderr: &str,
) -> ExecutionOutcome {
    if status.success() {
        return ExecutionOutcome::success(stdout.trim(), status.code().unwrap_or(0));
    }

    let code = status.code().unwrap_or(NO_EXIT_CODE);
    let stderr = stderr.trim();
    let stdout = stdout.trim();
    if !stderr.is_empty() {
        ExecutionOutcome::failure(stderr, code)
    } else if !stdout.is_empty() {
        ExecutionOutcome::failure(stdout, code)
    } else {
        ExecutionError::NonZeroExit(code).into_outcome()
    }
}

/// Accumulate a stream to completion on its own task, in arrival order
fn spawn_reader<R>(reader: Option<R>) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut reader) = reader {
            if let Err(err) = reader.read_to_end(&mut buf).await {
                debug!(error = %err, "error draining output stream");
            }
        }
        // Output is assumed textual; partial/binary bytes pass through lossily
        String::from_utf8_lossy(&buf).into_owned()
    })
}

async fn drain(task: JoinHandle<String>) -> String {
    task.await.unwrap_or_default()
}

/// Tear down a process without blocking the caller: request termination,
/// then force-kill if it has not exited within the grace window.
fn reap(mut child: Child) {
    tokio::spawn(async move {
        request_termination(&mut child);
        match tokio::time::timeout(KILL_GRACE, child.wait()).await {
            Ok(_) => debug!("process exited after termination request"),
            Err(_) => {
                warn!(
                    grace_ms = KILL_GRACE.as_millis() as u64,
                    "process ignored termination request, killing"
                );
                if let Err(err) = child.start_kill() {
                    debug!(error = %err, "force kill failed");
                }
                let _ = child.wait().await;
            }
        }
    });
}

#[cfg(unix)]
fn request_termination(child: &mut Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    match child.id() {
        Some(pid) => {
            if let Err(err) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                debug!(error = %err, "SIGTERM delivery failed");
            }
        }
        // Already exited
        None => {}
    }
}

#[cfg(not(unix))]
fn request_termination(child: &mut Child) {
    if let Err(err) = child.start_kill() {
        debug!(error = %err, "termination request failed");
    }
}
