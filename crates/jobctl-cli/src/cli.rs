//! Command line definition.

use clap::{Args, Parser, Subcommand};
use jobctl_config::{ConfigKey, DEFAULT_CONFIG_PATH};
use jobctl_core::JobState;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "jobctl")]
#[command(version)]
#[command(about = "A persistent background job queue with worker processes")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Options accepted by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Path of the SQLite job database (overrides the configured db_path)
    #[arg(long, global = true)]
    pub db: Option<String>,

    /// Path of the JSON configuration document
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a job, e.g. jobctl enqueue '{"id":"job1","command":"sleep 2"}'
    Enqueue {
        /// Job specification as JSON
        job: String,
    },

    /// Manage worker processes
    Worker {
        #[command(subcommand)]
        command: WorkerCommand,
    },

    /// Show job counts per state and active workers
    Status,

    /// List jobs, newest first
    List {
        /// Only show jobs in this state
        #[arg(long)]
        state: Option<JobState>,
    },

    /// Show every field of one job
    Info {
        /// Job id
        id: String,
    },

    /// Inspect and act on the dead letter queue
    Dlq {
        #[command(subcommand)]
        command: DlqCommand,
    },

    /// Read and change configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum WorkerCommand {
    /// Start worker processes
    Start {
        /// Number of workers to start
        #[arg(long, short = 'c', default_value = "1")]
        count: usize,

        /// Stay attached and wait for the workers to exit
        #[arg(long)]
        foreground: bool,
    },

    /// Send SIGTERM to all tracked workers
    Stop,

    /// Show running workers
    Status,

    /// Run one worker loop in this process
    #[command(hide = true)]
    Run,
}

#[derive(Subcommand, Debug)]
pub enum DlqCommand {
    /// List dead jobs
    List,

    /// Move a dead job back to pending with a fresh retry budget
    Retry {
        /// Job id
        id: String,
    },

    /// Permanently delete a dead job
    Remove {
        /// Job id
        id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print one value
    Get {
        /// Configuration key, e.g. max-retries
        key: ConfigKey,
    },

    /// Validate and store one value
    Set {
        /// Configuration key, e.g. max-retries
        key: ConfigKey,

        /// New value
        value: String,
    },

    /// Print every value
    Show,
}

impl Cli {
    /// Returns true for the long-running worker commands.
    #[must_use]
    pub fn is_worker_process(&self) -> bool {
        matches!(
            self.command,
            Command::Worker {
                command: WorkerCommand::Run | WorkerCommand::Start { .. }
            }
        )
    }
}
