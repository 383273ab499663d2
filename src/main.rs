use clap::Parser;

use signal_relay::adapter::inbound::cli::command::Cli;
use signal_relay::adapter::inbound::cli::output::{self, OutputConfig};
use signal_relay::adapter::inbound::cli::dispatch;

fn main() {
    let _ = dotenvy::dotenv();
    let _ = rustls::crypto::ring::default_provider().install_default();

    let cli = Cli::parse();
    output::configure(OutputConfig {
        json: cli.json,
        quiet: cli.quiet,
    });

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            output::error(&format!("Failed to start async runtime: {e}"));
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(dispatch(cli)) {
        output::error(&e.to_string());
        std::process::exit(1);
    }
}
