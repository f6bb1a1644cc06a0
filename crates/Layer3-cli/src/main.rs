//! taskmux CLI - Main entry point

mod cli;
mod render;

use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use taskmux_foundation::{Error, TaskmuxConfig, EXIT_FAILURE};
use taskmux_task::EnvOverride;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// taskmux - run long-lived commands in detached sessions
#[derive(Parser, Debug)]
#[command(name = "taskmux")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a command in a new detached task session
    Run {
        /// Task type label, e.g. build, test, deploy
        task_type: String,

        /// Working directory (defaults to the current directory)
        #[arg(short, long)]
        workdir: Option<PathBuf>,

        /// Environment override, repeatable
        #[arg(short, long = "env", value_name = "KEY=VALUE")]
        env: Vec<EnvOverride>,

        /// Send a desktop notification when the task finishes
        #[arg(long)]
        notify: bool,

        /// Command to run; a single argument is run through `sh -c`
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "COMMAND")]
        command: Vec<String>,
    },
    /// Show live output or the recorded outcome of a task
    Check {
        name: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// List running task sessions and recent results
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show the status record of a task, or list all tasks
    Status {
        name: Option<String>,

        #[arg(long)]
        json: bool,
    },
    /// Follow a task's output until its session ends
    Tail {
        name: String,

        /// Seconds between snapshots
        #[arg(short, long)]
        interval: Option<u64>,

        /// Lines per snapshot
        #[arg(short = 'n', long)]
        lines: Option<usize>,
    },
    /// Attach the terminal to a task session
    Attach { name: String },
    /// Kill a task session, or every task session with `all`
    Kill {
        /// Session name or `all`
        target: String,
    },
    /// Run a task inside its session (used by `run`)
    #[command(hide = true)]
    Exec {
        #[arg(long)]
        name: String,

        #[arg(long)]
        log_file: PathBuf,

        #[arg(long)]
        status_file: PathBuf,

        #[arg(long)]
        workdir: PathBuf,

        #[arg(long = "env", value_name = "KEY=VALUE")]
        env: Vec<EnvOverride>,

        #[arg(long)]
        notify: bool,

        #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "COMMAND")]
        command: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // clap uses exit code 2 for usage errors; taskmux reports 1
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => EXIT_FAILURE,
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    // Logs go to stderr so reports on stdout stay clean
    let log_level = if args.debug { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let result = match TaskmuxConfig::load() {
        Ok(config) => cli::dispatch(args.command, &config).await,
        Err(e) => Err(e.into()),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => match e.downcast_ref::<Error>() {
            Some(err) => {
                eprintln!("Error: {}", err);
                if let Some(diagnostics) = err.diagnostics() {
                    eprintln!("\n{}", diagnostics);
                }
                std::process::exit(err.exit_code());
            }
            None => Err(e),
        },
    }
}
