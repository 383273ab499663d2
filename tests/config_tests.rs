//! Configuration loading from files.

use std::io::Write;

use rust_decimal_macros::dec;

use signal_relay::domain::strategy::StrategyKind;
use signal_relay::error::{ConfigError, Error};
use signal_relay::infrastructure::config::execution::TransportConfig;
use signal_relay::infrastructure::config::settings::Config;

fn write(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn example_config_loads() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config.example.toml");
    let config = Config::load(path).unwrap();

    assert_eq!(config.trading.strategy, StrategyKind::DualTarget);
    assert_eq!(config.trading.default_lot_size, dec!(0.01));
    assert_eq!(config.chat.channels, vec!["gold-signals".to_string()]);
    assert!(matches!(config.execution.transport, TransportConfig::Bridge(_)));
    assert_eq!(config.symbols.policy().resolve("xauusd").as_deref(), Some("XAUUSDm"));
}

#[test]
fn empty_file_uses_paper_defaults() {
    let file = write("");
    let config = Config::load(file.path()).unwrap();

    assert!(matches!(config.execution.transport, TransportConfig::Paper(_)));
    assert_eq!(config.state.max_closed_records, 20);
    let policy = config.routing_policy();
    assert_eq!(policy.completion_window.as_secs(), 120);
}

#[test]
fn missing_file_is_a_read_error() {
    let err = Config::load("/nonexistent/signal-relay.toml").unwrap_err();
    assert!(matches!(err, Error::Config(ConfigError::ReadFile(_))));
}

#[test]
fn invalid_confidence_is_rejected() {
    let file = write("[trading]\nmin_confidence = 1.5\n");
    let err = Config::load(file.path()).unwrap_err();
    assert!(err.to_string().contains("min_confidence"));
}

#[test]
fn ipc_transport_parses() {
    let file = write(
        "[execution.transport]\ntype = \"ipc\"\nsocket_path = \"/tmp/terminal.sock\"\n",
    );
    let config = Config::load(file.path()).unwrap();
    let TransportConfig::Ipc(ipc) = config.execution.transport else {
        panic!("expected ipc transport");
    };
    assert_eq!(ipc.socket_path.to_str(), Some("/tmp/terminal.sock"));
    assert_eq!(ipc.timeout_ms, 10_000);
}
