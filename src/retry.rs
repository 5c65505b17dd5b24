//! Retry Coordination
//!
//! This module wraps command execution with bounded exponential backoff for
//! transient failures. A failed outcome's message is classified against a
//! configurable pattern list; only matches are retried, and the backoff
//! sleep is cancellable so an abort during the wait ends the loop promptly.
//!
//! # Example
//!
//! ```no_run
//! use tokio_util::sync::CancellationToken;
//! use toolguard::retry::RetryPolicy;
//! use toolguard::tools::{Command, CommandExecutor};
//!
//! #[tokio::main]
//! async fn main() {
//!     let executor = CommandExecutor::new();
//!     let policy = RetryPolicy::default();
//!     let command = Command::new("some-tool").arg("--sync");
//!
//!     let outcome = executor
//!         .execute_with_retry(&command, &CancellationToken::new(), &policy)
//!         .await;
//!     println!("{}", outcome.summary());
//! }
//! ```

use crate::tools::ExecutionOutcome;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Message fragments that mark a failure as transient.
///
/// Classification over free-text error messages is inherently fragile across
/// tool versions and locales, so the list is configuration, not code; these
/// are only the defaults.
const DEFAULT_RETRYABLE_PATTERNS: &[&str] = &[
    "network",
    "connection",
    "timed out",
    "timeout",
    "temporary",
    "rate limit",
    "server error",
    "500",
    "502",
    "503",
];

/// Retry policy for transient command failures
///
/// # Fields
///
/// * `max_attempts` - Maximum number of spawn attempts, including the first
///   (default: 3)
/// * `base_delay` - Backoff unit; attempt N waits `base_delay * 2^(N-1)`
///   before attempt N+1 (default: 1s, giving 1s, 2s, 4s, ...)
/// * `retryable_patterns` - Case-insensitive substrings that mark a failure
///   message as transient
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt)
    pub max_attempts: u32,

    /// Base delay for exponential backoff
    pub base_delay: Duration,

    /// Case-insensitive substrings identifying retryable failures
    pub retryable_patterns: Vec<String>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            retryable_patterns: DEFAULT_RETRYABLE_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of attempts
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set the backoff base delay
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Replace the retryable pattern list
    pub fn retryable_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.retryable_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Delay before the attempt following `attempt` (1-based)
    ///
    /// Exponential backoff: `base_delay * 2^(attempt-1)`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.base_delay * 2_u32.saturating_pow(attempt.saturating_sub(1))
    }

    /// Whether a failure message marks a transient error worth retrying
    pub fn is_retryable(&self, message: &str) -> bool {
        let message = message.to_lowercase();
        self.retryable_patterns
            .iter()
            .any(|pattern| message.contains(&pattern.to_lowercase()))
    }
}

/// Drive an operation through the retry loop
///
/// Calls `operation` up to `policy.max_attempts` times. Returns immediately
/// on the first success or on a non-retryable failure. Between retryable
/// failures it sleeps `base_delay * 2^(attempt-1)`, abandoning the loop with
/// the last outcome if the cancellation token fires during the wait.
///
/// The final outcome on exhaustion is the last attempt's outcome, verbatim.
pub async fn execute_with_retry<F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut operation: F,
) -> ExecutionOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ExecutionOutcome>,
{
    let mut last = ExecutionOutcome::failure("no attempts were made", -1);

    for attempt in 1..=policy.max_attempts {
        let outcome = operation().await;

        if outcome.success {
            if attempt > 1 {
                info!(attempt, "command succeeded after retry");
            }
            return outcome;
        }

        let retryable = policy.is_retryable(outcome.message());
        last = outcome;

        if !retryable {
            debug!(attempt, message = last.message(), "failure is not retryable");
            return last;
        }
        if attempt == policy.max_attempts {
            warn!(
                attempts = attempt,
                message = last.message(),
                "retries exhausted"
            );
            return last;
        }

        let delay = policy.backoff_delay(attempt);
        warn!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            message = last.message(),
            "transient failure, backing off"
        );
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel.cancelled() => {
                info!(attempt, "cancelled during backoff");
                return last;
            }
        }
    }

    last
}
