//! HTTP classifier client.
//!
//! Posts each chat message to `<url>/classify` and maps the reply onto a
//! [`ClassifiedSignal`]. The reply format is the one the classification
//! service emits:
//!
//! ```json
//! {
//!   "message_type": "new_signal_complete",
//!   "symbol": "XAUUSD",
//!   "order_type": "buy",
//!   "entry_price": 2650,
//!   "stop_loss": 2640,
//!   "take_profits": [2660, 2670],
//!   "confidence": 0.93
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::domain::message::ChatMessage;
use crate::domain::signal::{ClassifiedSignal, Direction, MessageType, OrderKind, SignalStep};
use crate::error::{ConfigError, Error, Result};
use crate::port::outbound::classifier::{Classification, SignalClassifier};

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    channel: &'a str,
    message_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<i64>,
    text: &'a str,
    edited: bool,
}

/// Reply body of the classification service.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClassifyReply {
    #[serde(default = "not_trading")]
    pub message_type: String,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub order_type: Option<String>,
    #[serde(default)]
    pub entry_price: Option<Decimal>,
    #[serde(default)]
    pub stop_loss: Option<Decimal>,
    #[serde(default)]
    pub take_profits: Vec<Decimal>,
    #[serde(default)]
    pub new_stop_loss: Option<Decimal>,
    #[serde(default)]
    pub new_take_profit: Option<Decimal>,
    #[serde(default)]
    pub re_entry_price: Option<Decimal>,
    #[serde(default)]
    pub move_sl_to_entry: bool,
    #[serde(default)]
    pub tp_hit_number: Option<u8>,
    #[serde(default)]
    pub lot_size: Option<Decimal>,
    /// Percent of each open leg to close, e.g. 70 for "close 70%".
    #[serde(default)]
    pub close_percentage: Option<u8>,
    #[serde(default)]
    pub actions: Vec<ClassifyAction>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// One step of a compound reply.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClassifyAction {
    pub action_type: String,
    #[serde(default)]
    pub order_type: Option<String>,
    #[serde(default)]
    pub entry_price: Option<Decimal>,
    #[serde(default)]
    pub stop_loss: Option<Decimal>,
    #[serde(default)]
    pub take_profits: Vec<Decimal>,
    #[serde(default)]
    pub new_stop_loss: Option<Decimal>,
    #[serde(default)]
    pub new_take_profit: Option<Decimal>,
    #[serde(default)]
    pub close_percentage: Option<u8>,
}

fn not_trading() -> String {
    "not_trading".into()
}

/// Confidence assumed when the service omits it.
const DEFAULT_CONFIDENCE: f64 = 0.5;

fn parse_message_type(raw: &str) -> Option<MessageType> {
    let normalized = raw.trim().to_uppercase();
    serde_json::from_value(serde_json::Value::String(normalized)).ok()
}

/// `buy`, `sell_limit`, `buy_stop`, ...
fn parse_order_type(raw: Option<&str>) -> (Option<Direction>, OrderKind) {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return (None, OrderKind::Market);
    };
    let raw = raw.to_lowercase();
    let (side, kind) = raw.split_once('_').unwrap_or((raw.as_str(), "market"));
    let direction = match side {
        "buy" => Some(Direction::Buy),
        "sell" => Some(Direction::Sell),
        _ => None,
    };
    let kind = match kind {
        "limit" => OrderKind::Limit,
        "stop" => OrderKind::Stop,
        _ => OrderKind::Market,
    };
    (direction, kind)
}

/// Take-profit ladder: explicit list first, else a single new target.
fn ladder(take_profits: Vec<Decimal>, new_take_profit: Option<Decimal>) -> Vec<Decimal> {
    if take_profits.is_empty() {
        new_take_profit.into_iter().collect()
    } else {
        take_profits
    }
}

impl ClassifyAction {
    fn into_step(self) -> Option<SignalStep> {
        let message_type = match self.action_type.trim().to_lowercase().as_str() {
            "new_signal" => MessageType::NewSignalComplete,
            other => parse_message_type(other)?,
        };
        let (direction, order_kind) = parse_order_type(self.order_type.as_deref());
        Some(SignalStep {
            message_type,
            reply_to: None,
            symbol: None,
            direction,
            order_kind,
            entry_price: self.entry_price,
            stop_loss: self.new_stop_loss.or(self.stop_loss),
            take_profits: ladder(self.take_profits, self.new_take_profit),
            tp_hit: None,
            move_sl_to_entry: false,
            lot_size: None,
            close_percentage: self.close_percentage,
        })
    }
}

impl ClassifyReply {
    /// Map the reply onto a signal for `message`.
    #[must_use]
    pub fn into_classification(self, message: &ChatMessage) -> Classification {
        let Some(mut message_type) = parse_message_type(&self.message_type) else {
            return Classification::NotASignal;
        };

        let stop_loss = self.new_stop_loss.or(self.stop_loss);
        let take_profits = ladder(self.take_profits, self.new_take_profit);
        if message_type == MessageType::NewSignalComplete
            && (stop_loss.is_none() || take_profits.is_empty())
        {
            message_type = MessageType::NewSignalIncomplete;
        }

        let (direction, order_kind) = parse_order_type(self.order_type.as_deref());
        let symbol = self.symbol.filter(|s| !s.trim().is_empty());
        let steps: Vec<SignalStep> = self
            .actions
            .into_iter()
            .filter_map(ClassifyAction::into_step)
            .map(|mut step| {
                step.symbol.clone_from(&symbol);
                if step.direction.is_none() {
                    step.direction = direction;
                }
                step
            })
            .collect();

        Classification::Signal(Box::new(ClassifiedSignal {
            message_id: message.id,
            channel_id: message.channel.clone(),
            reply_to: message.reply_to,
            message_type,
            symbol,
            direction,
            order_kind,
            entry_price: self.re_entry_price.or(self.entry_price),
            stop_loss,
            take_profits,
            confidence: self.confidence.unwrap_or(DEFAULT_CONFIDENCE).clamp(0.0, 1.0),
            tp_hit: self.tp_hit_number,
            move_sl_to_entry: self.move_sl_to_entry,
            lot_size: self.lot_size,
            close_percentage: self.close_percentage,
            steps,
        }))
    }
}

/// [`SignalClassifier`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpClassifier {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl HttpClassifier {
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the client cannot be
    /// built.
    pub fn new(base_url: &str, timeout: Duration, api_key: Option<String>) -> Result<Self> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::Other(format!("cannot build classifier client: {e}")))?;
        Ok(Self {
            client,
            endpoint: base.join("classify")?,
            api_key,
        })
    }
}

#[async_trait]
impl SignalClassifier for HttpClassifier {
    async fn classify(&self, message: &ChatMessage) -> Result<Classification> {
        let body = ClassifyRequest {
            channel: message.channel.as_str(),
            message_id: message.id.get(),
            reply_to: message.reply_to.map(|id| id.get()),
            text: &message.text,
            edited: message.edited,
        };
        let mut request = self.client.post(self.endpoint.clone()).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let reply = request
            .send()
            .await?
            .error_for_status()
            .map_err(|e| Error::Classification(e.to_string()))?
            .json::<ClassifyReply>()
            .await
            .map_err(|e| Error::Classification(format!("unreadable reply: {e}")))?;

        Ok(reply.into_classification(message))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::id::{ChannelId, MessageId};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn message() -> ChatMessage {
        ChatMessage {
            channel: ChannelId::new("gold"),
            id: MessageId::new(501),
            reply_to: Some(MessageId::new(480)),
            text: "GOLD BUY 2650 SL 2640 TP 2660 TP 2670".into(),
            edited: false,
            date: Utc::now(),
        }
    }

    fn signal(json: &str) -> ClassifiedSignal {
        let reply: ClassifyReply = serde_json::from_str(json).unwrap();
        match reply.into_classification(&message()) {
            Classification::Signal(signal) => *signal,
            Classification::NotASignal => panic!("expected a signal"),
        }
    }

    #[test]
    fn complete_entry_maps_all_fields() {
        let signal = signal(
            r#"{"message_type":"new_signal_complete","symbol":"XAUUSD","order_type":"buy",
                "entry_price":2650,"stop_loss":2640,"take_profits":[2660,2670],"confidence":0.93}"#,
        );
        assert_eq!(signal.message_type, MessageType::NewSignalComplete);
        assert_eq!(signal.message_id, MessageId::new(501));
        assert_eq!(signal.reply_to, Some(MessageId::new(480)));
        assert_eq!(signal.direction, Some(Direction::Buy));
        assert_eq!(signal.order_kind, OrderKind::Market);
        assert_eq!(signal.take_profits, vec![dec!(2660), dec!(2670)]);
        assert!((signal.confidence - 0.93).abs() < f64::EPSILON);
    }

    #[test]
    fn complete_without_stop_is_downgraded() {
        let signal = signal(
            r#"{"message_type":"new_signal_complete","symbol":"EURUSD","order_type":"sell_limit"}"#,
        );
        assert_eq!(signal.message_type, MessageType::NewSignalIncomplete);
        assert_eq!(signal.direction, Some(Direction::Sell));
        assert_eq!(signal.order_kind, OrderKind::Limit);
    }

    #[test]
    fn modification_uses_new_levels() {
        let signal = signal(
            r#"{"message_type":"modification","new_stop_loss":2645,"new_take_profit":2680}"#,
        );
        assert_eq!(signal.stop_loss, Some(dec!(2645)));
        assert_eq!(signal.take_profits, vec![dec!(2680)]);
    }

    #[test]
    fn not_trading_and_unknown_types_are_not_signals() {
        for raw in [r#"{"message_type":"not_trading"}"#, r#"{"message_type":"chit_chat"}"#, "{}"] {
            let reply: ClassifyReply = serde_json::from_str(raw).unwrap();
            assert_eq!(
                reply.into_classification(&message()),
                Classification::NotASignal
            );
        }
    }

    #[test]
    fn compound_actions_become_steps() {
        let signal = signal(
            r#"{"message_type":"compound_action","symbol":"XAUUSD","order_type":"buy",
                "actions":[
                  {"action_type":"modification","new_stop_loss":2645},
                  {"action_type":"new_signal","order_type":"buy_limit","entry_price":2630,"take_profits":[2660]}
                ]}"#,
        );
        assert_eq!(signal.message_type, MessageType::CompoundAction);
        assert_eq!(signal.steps.len(), 2);
        assert_eq!(signal.steps[0].message_type, MessageType::Modification);
        assert_eq!(signal.steps[1].message_type, MessageType::NewSignalComplete);
        assert_eq!(signal.steps[1].order_kind, OrderKind::Limit);
        assert_eq!(signal.steps[1].symbol.as_deref(), Some("XAUUSD"));
    }

    #[test]
    fn partial_close_carries_percentage() {
        let signal = signal(r#"{"message_type":"partial_close","close_percentage":70}"#);
        assert_eq!(signal.message_type, MessageType::PartialClose);
        assert_eq!(signal.close_percentage, Some(70));
    }

    #[test]
    fn missing_confidence_defaults_to_half() {
        let signal = signal(r#"{"message_type":"close_signal"}"#);
        assert_eq!(signal.message_type, MessageType::CloseSignal);
        assert!((signal.confidence - DEFAULT_CONFIDENCE).abs() < f64::EPSILON);
    }
}
