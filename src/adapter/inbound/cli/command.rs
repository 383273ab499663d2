//! Command-line interface definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use super::paths;

/// Copy classified chat trade signals to a broker terminal
#[derive(Parser, Debug)]
#[command(name = "signal-relay")]
#[command(version)]
pub struct Cli {
    /// JSON output for scripting
    #[arg(long, global = true)]
    pub json: bool,

    /// Decrease output verbosity
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the relay in the foreground
    Run(RunArgs),

    /// Show tracked positions from the state file
    Status(ConfigPathArg),

    /// Wipe the stored state (positions, cursors, discarded ids)
    Clear(ClearArgs),

    /// Remove a lock left behind by a crashed instance
    Unlock(ConfigPathArg),
}

/// Shared argument for commands that only need the configuration file.
#[derive(Parser, Debug)]
pub struct ConfigPathArg {
    /// Path to the configuration file.
    #[arg(short, long, default_value_os_t = paths::default_config())]
    pub config: PathBuf,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigPathArg,

    /// Override the log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    pub json_logs: bool,

    /// Use the paper terminal regardless of the configured transport.
    #[arg(long)]
    pub paper: bool,
}

#[derive(Parser, Debug)]
pub struct ClearArgs {
    #[command(flatten)]
    pub config: ConfigPathArg,

    /// Confirm that open broker positions will no longer be managed.
    #[arg(long)]
    pub yes: bool,
}
