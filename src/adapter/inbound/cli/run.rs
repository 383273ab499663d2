//! Handler for the `run` command.

use crate::adapter::inbound::cli::command::RunArgs;
use crate::adapter::inbound::cli::output;
use crate::error::Result;
use crate::infrastructure::bootstrap;
use crate::infrastructure::config::execution::{PaperConfig, TransportConfig};
use crate::infrastructure::config::settings::Config;

/// Load the configuration, apply command-line overrides and run until shutdown.
///
/// # Errors
///
/// Fails on configuration errors, lock contention, unreadable state or a
/// fatal chat stream error.
pub async fn execute(args: &RunArgs) -> Result<()> {
    let mut config = Config::load(&args.config.config)?;
    apply_overrides(&mut config, args);
    config.init_logging();

    output::header(env!("CARGO_PKG_VERSION"));
    output::field("Config", args.config.config.display());
    output::field("State", config.state.path.display());
    output::field("Strategy", config.trading.strategy);

    bootstrap::run(config).await?;
    output::success("Stopped");
    Ok(())
}

fn apply_overrides(config: &mut Config, args: &RunArgs) {
    if let Some(level) = &args.log_level {
        config.logging.level.clone_from(level);
    }
    if args.json_logs {
        config.logging.format = "json".into();
    }
    if args.paper {
        let reference_prices = match &config.execution.transport {
            TransportConfig::Paper(paper) => paper.reference_prices.clone(),
            _ => Default::default(),
        };
        config.execution.transport = TransportConfig::Paper(PaperConfig { reference_prices });
    }
}
