//! Command Execution Subsystem
//!
//! This module provides supervised subprocess execution for external
//! command-line tools. It enforces strict measures to prevent shell
//! injection and runaway processes.
//!
//! # Features
//!
//! - **Argument Sanitization**: Shell metacharacters are stripped from every
//!   argument before it reaches the process boundary
//! - **Timeout Enforcement**: Every execution has a configurable timeout
//! - **Cooperative Cancellation**: A `CancellationToken` aborts a running
//!   command and kills its process
//! - **Graceful Teardown**: Processes receive a termination request first
//!   and are force-killed only after a grace window
//!
//! # Architecture
//!
//! The module is organized into:
//! - `sanitizer.rs`: Argument sanitization against shell injection
//! - `executor.rs`: Subprocess execution with timeout and cancellation
//!
//! # Example
//!
//! ```no_run
//! use tokio_util::sync::CancellationToken;
//! use toolguard::tools::{Command, CommandExecutor};
//!
//! #[tokio::main]
//! async fn main() {
//!     let executor = CommandExecutor::new();
//!     let command = Command::new("echo").arg("hello world");
//!
//!     let outcome = executor.execute(&command, &CancellationToken::new()).await;
//!     println!("Exit code: {}", outcome.exit_code);
//! }
//! ```

mod executor;
mod sanitizer;

pub use executor::{Command, CommandExecutor, ExecutionError, ExecutionOutcome, ExecutorSettings};
pub use sanitizer::sanitize_args;
