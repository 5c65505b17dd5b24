// toolguard - Supervised External Command Runner
//
// Thin CLI driver over the library: runs one command under supervision
// (sanitization, timeout, cancellation via ctrl-c, optional retry) and
// mirrors the outcome's exit code.

use anyhow::Result;
use clap::Parser;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use toolguard::tools::{Command, CommandExecutor};
use toolguard::{logging, Config};
use tracing::debug;

/// Run an external command under supervision
#[derive(Parser, Debug)]
#[command(name = "toolguard")]
#[command(version = "0.1.0")]
#[command(about = "Supervised external command execution", long_about = None)]
struct Args {
    /// Program to execute
    program: String,

    /// Arguments for the program (sanitized before spawn)
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,

    /// Timeout in milliseconds (overrides the configured default)
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Working directory for the command
    #[arg(long)]
    cwd: Option<String>,

    /// Payload to write to the command's stdin
    #[arg(long)]
    stdin: Option<String>,

    /// Environment overrides, KEY=VALUE (repeatable)
    #[arg(long = "env", value_name = "KEY=VALUE")]
    env: Vec<String>,

    /// Retry transient failures with exponential backoff
    #[arg(long)]
    retry: bool,

    /// Print the outcome as JSON instead of raw output
    #[arg(long)]
    json: bool,

    /// Path to a config file (default: XDG config dir)
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    logging::init(&config.logging)?;

    let mut command = Command::new(&args.program).args(args.args.clone());
    if let Some(timeout_ms) = args.timeout_ms {
        command = command.timeout(Duration::from_millis(timeout_ms));
    }
    if let Some(cwd) = &args.cwd {
        command = command.current_dir(cwd);
    }
    if let Some(stdin) = &args.stdin {
        command = command.stdin(stdin);
    }
    for pair in &args.env {
        match pair.split_once('=') {
            Some((key, value)) => command = command.env(key, value),
            None => anyhow::bail!("Invalid --env value (expected KEY=VALUE): {}", pair),
        }
    }

    // Ctrl-c raises the cancellation signal; the executor kills the child
    // and resolves the outcome as aborted.
    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("ctrl-c received, cancelling");
            canceller.cancel();
        }
    });

    let executor = CommandExecutor::with_settings(config.executor_settings());
    let outcome = if args.retry {
        executor
            .execute_with_retry(&command, &cancel, &config.retry_policy())
            .await
    } else {
        executor.execute(&command, &cancel).await
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else if outcome.success {
        if let Some(output) = &outcome.output {
            println!("{}", output);
        }
    } else {
        eprintln!("{}", outcome.message());
    }

    // -1 sentinel (timeout/cancel/spawn failure) still has to exit non-zero
    let code = if outcome.success {
        0
    } else if outcome.exit_code > 0 {
        outcome.exit_code.min(255)
    } else {
        1
    };
    std::process::exit(code);
}
