//! End-to-end executor tests against real processes.
//!
//! These exercise the public API only: spawn/exit mapping, timeout,
//! cancellation, stdin/env/working-directory plumbing, and the retry loop
//! driving the executor.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use toolguard::retry::execute_with_retry;
use toolguard::tools::{Command, CommandExecutor, ExecutionOutcome};
use toolguard::RetryPolicy;

fn executor() -> CommandExecutor {
    CommandExecutor::new()
}

#[tokio::test]
async fn successful_command_returns_trimmed_stdout() {
    let command = Command::new("echo").arg("hello from toolguard");
    let outcome = executor().execute(&command, &CancellationToken::new()).await;

    assert!(outcome.success);
    assert_eq!(outcome.exit_code, 0);
    assert_eq!(outcome.output.as_deref(), Some("hello from toolguard"));
    assert!(outcome.error.is_none());
}

#[tokio::test]
async fn nonzero_exit_maps_stderr_to_error() {
    let command = Command::new("ls").arg("/no-such-dir-for-toolguard-tests");
    let outcome = executor().execute(&command, &CancellationToken::new()).await;

    assert!(!outcome.success);
    assert_ne!(outcome.exit_code, 0);
    assert!(outcome.output.is_none());
    let message = outcome.error.as_deref().unwrap_or("");
    assert!(!message.is_empty());
}

#[tokio::test]
async fn silent_failure_reports_exit_code() {
    let command = Command::new("false");
    let outcome = executor().execute(&command, &CancellationToken::new()).await;

    assert!(!outcome.success);
    assert_eq!(outcome.exit_code, 1);
    assert_eq!(outcome.error.as_deref(), Some("Command exited with code 1"));
}

#[tokio::test]
async fn timeout_kills_and_reports() {
    let command = Command::new("sleep")
        .arg("30")
        .timeout(Duration::from_millis(200));

    let start = Instant::now();
    let outcome = executor().execute(&command, &CancellationToken::new()).await;

    assert!(!outcome.success);
    assert_eq!(outcome.exit_code, -1);
    assert!(outcome.error.as_deref().unwrap_or("").contains("timed out after 200ms"));
    // Resolved at the timeout, not at the sleep's natural end
    assert!(start.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn large_stdin_payload_does_not_block_the_timeout() {
    // A payload well past the OS pipe buffer, fed to a child that never
    // reads stdin: the write stalls, the timeout must still fire on time.
    let command = Command::new("sleep")
        .arg("30")
        .stdin("x".repeat(1024 * 1024))
        .timeout(Duration::from_millis(100));

    let start = Instant::now();
    let outcome = executor().execute(&command, &CancellationToken::new()).await;

    assert!(!outcome.success);
    assert_eq!(outcome.exit_code, -1);
    assert!(outcome.error.as_deref().unwrap_or("").contains("timed out after 100ms"));
    assert!(start.elapsed() < Duration::from_secs(1));
}

/// A timed-out child must actually be torn down, not just reported on.
#[cfg(unix)]
#[tokio::test]
async fn timeout_terminates_the_process() {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("pid");

    // The script records its own pid, then outlives the timeout by far
    let script = format!("echo $$ > {}\nsleep 30\n", pid_file.display());
    let command = Command::new("sh")
        .stdin(script)
        .timeout(Duration::from_millis(500));

    let outcome = executor().execute(&command, &CancellationToken::new()).await;
    assert!(!outcome.success);
    assert_eq!(outcome.exit_code, -1);

    let pid: i32 = std::fs::read_to_string(&pid_file)
        .expect("child never recorded its pid")
        .trim()
        .parse()
        .unwrap();
    let pid = Pid::from_raw(pid);

    // Teardown runs on a detached task; a plain sh dies on the termination
    // request, well inside the 5s escalation window. Signal 0 checks
    // liveness without delivering anything.
    let mut alive = true;
    for _ in 0..80 {
        if kill(pid, None::<Signal>).is_err() {
            alive = false;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(!alive, "child process survived teardown");
}

#[tokio::test]
async fn cancellation_aborts_promptly() {
    let command = Command::new("sleep").arg("30");
    let cancel = CancellationToken::new();

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let start = Instant::now();
    let outcome = executor().execute(&command, &cancel).await;

    assert!(!outcome.success);
    assert_eq!(outcome.exit_code, -1);
    assert!(outcome.error.as_deref().unwrap_or("").contains("aborted"));
    assert!(start.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn already_cancelled_token_resolves_without_waiting() {
    let command = Command::new("sleep").arg("30");
    let cancel = CancellationToken::new();
    cancel.cancel();

    let start = Instant::now();
    let outcome = executor().execute(&command, &cancel).await;

    assert!(!outcome.success);
    assert_eq!(outcome.exit_code, -1);
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn stdin_payload_reaches_the_process() {
    let command = Command::new("cat").stdin("line one\nline two\n");
    let outcome = executor().execute(&command, &CancellationToken::new()).await;

    assert!(outcome.success);
    assert_eq!(outcome.output.as_deref(), Some("line one\nline two"));
}

#[tokio::test]
async fn environment_overrides_are_merged() {
    let command = Command::new("printenv")
        .arg("TOOLGUARD_IT_VAR")
        .env("TOOLGUARD_IT_VAR", "integration");
    let outcome = executor().execute(&command, &CancellationToken::new()).await;

    assert!(outcome.success);
    assert_eq!(outcome.output.as_deref(), Some("integration"));
}

#[tokio::test]
async fn working_directory_is_honored() {
    let dir = tempfile::tempdir().unwrap();
    let command = Command::new("pwd").current_dir(dir.path());
    let outcome = executor().execute(&command, &CancellationToken::new()).await;

    assert!(outcome.success);
    let reported = outcome.output.unwrap_or_default();
    // Allow for symlinked temp roots (e.g. /tmp -> /private/tmp)
    assert!(reported.ends_with(
        dir.path().file_name().and_then(|n| n.to_str()).unwrap_or("")
    ));
}

#[tokio::test]
async fn spawn_failure_is_an_outcome_not_a_panic() {
    let command = Command::new("toolguard-no-such-binary-0xdead");
    let outcome = executor().execute(&command, &CancellationToken::new()).await;

    assert!(!outcome.success);
    assert_eq!(outcome.exit_code, -1);
    assert!(outcome
        .error
        .as_deref()
        .unwrap_or("")
        .starts_with("Failed to execute command:"));
}

#[tokio::test]
async fn injection_attempt_is_neutralized() {
    let command = Command::new("echo").arg("arg1; rm -rf /").arg("$(whoami)");
    let outcome = executor().execute(&command, &CancellationToken::new()).await;

    assert!(outcome.success);
    let output = outcome.output.unwrap_or_default();
    assert!(!output.contains(';'));
    assert!(!output.contains('$'));
    assert!(!output.contains('('));
    assert_eq!(output, "arg1 rm -rf / whoami");
}

#[tokio::test]
async fn retry_drives_the_executor_until_success() {
    let executor = executor();
    let policy = RetryPolicy::new().base_delay(Duration::from_millis(10));
    let cancel = CancellationToken::new();
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);

    // First two attempts report a transient failure, third runs for real
    let good = Command::new("echo").arg("recovered");
    let outcome = execute_with_retry(&policy, &cancel, || {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        let executor = &executor;
        let good = &good;
        async move {
            if n < 2 {
                ExecutionOutcome::failure("temporary network error", -1)
            } else {
                executor.execute(good, &CancellationToken::new()).await
            }
        }
    })
    .await;

    assert!(outcome.success);
    assert_eq!(outcome.output.as_deref(), Some("recovered"));
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn retry_stops_on_terminal_process_failure() {
    let executor = executor();
    let policy = RetryPolicy::new().base_delay(Duration::from_millis(10));
    // `false` produces "Command exited with code 1", which matches no pattern
    let command = Command::new("false");

    let start = Instant::now();
    let outcome = executor
        .execute_with_retry(&command, &CancellationToken::new(), &policy)
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.exit_code, 1);
    // A single attempt: no backoff sleep happened
    assert!(start.elapsed() < Duration::from_secs(1));
}
