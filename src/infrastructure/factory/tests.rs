//! Tests for factory functions.

use std::collections::BTreeMap;

use rust_decimal_macros::dec;

use crate::domain::id::ChannelId;
use crate::infrastructure::config::execution::{
    BridgeConfig, ExecutionConfig, PaperConfig, TransportConfig,
};
use crate::infrastructure::config::settings::Config;
use crate::infrastructure::factory::{chat, execution, persistence};
use crate::testkit::domain::order;

#[tokio::test]
async fn paper_transport_is_wrapped_and_fills() {
    let config = ExecutionConfig {
        transport: TransportConfig::Paper(PaperConfig {
            reference_prices: BTreeMap::from([("XAUUSD".to_string(), dec!(2650))]),
        }),
        ..ExecutionConfig::default()
    };
    let gateway = execution::build_gateway(&config).unwrap();
    assert_eq!(gateway.transport_name(), "paper");

    let fill = gateway.place_order(&order("XAUUSD")).await.unwrap();
    assert_eq!(fill.price, dec!(2650));
}

#[test]
fn bridge_transport_is_selected_by_config() {
    let config = ExecutionConfig {
        transport: TransportConfig::Bridge(BridgeConfig {
            url: "http://127.0.0.1:8740".into(),
            timeout_ms: 1000,
            token: None,
        }),
        ..ExecutionConfig::default()
    };
    let transport = execution::build_transport(&config).unwrap();
    assert_eq!(transport.transport_name(), "bridge");
}

#[test]
fn channels_are_trimmed() {
    let mut config = Config::default();
    config.chat.channels = vec![" gold ".into(), "fx".into()];
    assert_eq!(
        chat::channels(&config),
        vec![ChannelId::new("gold"), ChannelId::new("fx")]
    );
}

#[test]
fn classifier_rejects_invalid_url() {
    let mut config = Config::default();
    config.classifier.url = "not a url".into();
    assert!(chat::build_classifier(&config).is_err());
}

#[test]
fn store_opens_empty_without_state_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default().state;
    config.path = dir.path().join("state.json");

    let store = persistence::open_store(&config).unwrap();
    assert!(store.all().is_empty());
}
