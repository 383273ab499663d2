//! Command-line adapter: argument parsing, output and command handlers.

pub mod clear;
pub mod command;
pub mod output;
pub mod paths;
pub mod run;
pub mod status;
pub mod unlock;

use self::command::{Cli, Commands};
use crate::error::Result;

/// Dispatch a parsed command line to its handler.
///
/// # Errors
///
/// Returns whatever the handler fails with; the binary maps it to exit code 1.
pub async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run(args) => run::execute(&args).await,
        Commands::Status(arg) => status::execute(&arg.config),
        Commands::Clear(args) => clear::execute(&args.config.config, args.yes),
        Commands::Unlock(arg) => unlock::execute(&arg.config),
    }
}
