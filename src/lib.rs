//! ToolGuard Library
//!
//! This library provides supervised execution of external command-line tools:
//! argument sanitization, subprocess spawning with piped stdio, timeout
//! enforcement, cooperative cancellation, failure classification, and
//! bounded exponential-backoff retry for transient failures.

pub mod config;
pub mod logging;
pub mod retry;
pub mod tools;

pub use config::Config;
pub use retry::RetryPolicy;
pub use tools::{Command, CommandExecutor, ExecutionError, ExecutionOutcome, ExecutorSettings};
