//! # jobctl
//!
//! Entry point of the `jobctl` command line tool.
//!
//! Every invocation resolves its settings, then either runs a short command
//! against the job database and PID file, or (for `worker run`) becomes a
//! long-running worker process.

use clap::Parser;
use jobctl_cli::app::AppContext;
use jobctl_cli::cli::{Cli, Command, WorkerCommand};
use jobctl_cli::commands;
use jobctl_cli::logging::{init_file_logging, init_logging, COMMAND_FILTER, WORKER_FILTER};
use tracing::{debug, error};

// One sequential worker per process; a single-threaded runtime is enough.
#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let ctx = match AppContext::load(&cli.global) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let filter = if cli.is_worker_process() {
        WORKER_FILTER
    } else {
        COMMAND_FILTER
    };
    let is_worker_run = matches!(
        cli.command,
        Command::Worker {
            command: WorkerCommand::Run
        }
    );
    match ctx.worker_log_file().filter(|_| is_worker_run) {
        Some(path) => {
            if let Err(e) = init_file_logging(filter, &path) {
                eprintln!("Error: cannot open log file {}: {e}", path.display());
                std::process::exit(1);
            }
        }
        None => init_logging(filter),
    }

    debug!(version = env!("CARGO_PKG_VERSION"), db = %ctx.settings().db_path, "jobctl starting");

    if let Err(e) = commands::execute(cli.command, &ctx).await {
        error!(code = e.error_code(), "Command failed: {}", e);
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
