//! Handler for the `status` command.
//!
//! Reads the state file directly, so it works whether or not an instance is
//! running. A running instance saves after every transition.

use std::path::Path;

use serde_json::json;
use tabled::{Table, Tabled};

use crate::adapter::inbound::cli::output;
use crate::adapter::outbound::json_store::JsonStateFile;
use crate::domain::position::TrackedPosition;
use crate::domain::state::BotState;
use crate::error::Result;
use crate::infrastructure::config::settings::Config;
use crate::infrastructure::lock::{lock_path, LockOwner};
use crate::port::outbound::store::StateRepository;

#[derive(Tabled)]
struct PositionRow {
    #[tabled(rename = "Message")]
    message: String,
    #[tabled(rename = "Channel")]
    channel: String,
    #[tabled(rename = "Leg")]
    role: String,
    #[tabled(rename = "Symbol")]
    symbol: String,
    #[tabled(rename = "Side")]
    direction: String,
    #[tabled(rename = "Ticket")]
    ticket: String,
    #[tabled(rename = "SL")]
    stop_loss: String,
    #[tabled(rename = "TP")]
    take_profit: String,
    #[tabled(rename = "Status")]
    status: String,
}

fn dash<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

impl From<&TrackedPosition> for PositionRow {
    fn from(row: &TrackedPosition) -> Self {
        Self {
            message: row.message_id.to_string(),
            channel: row.channel_id.to_string(),
            role: row.role.to_string(),
            symbol: row.symbol.clone(),
            direction: row.direction.to_string(),
            ticket: dash(row.ticket),
            stop_loss: dash(row.stop_loss),
            take_profit: dash(row.take_profit),
            status: row.status.to_string(),
        }
    }
}

fn read_lock(state_path: &Path) -> Option<LockOwner> {
    let content = std::fs::read_to_string(lock_path(state_path)).ok()?;
    serde_json::from_str(&content).ok()
}

fn position_json(row: &TrackedPosition) -> serde_json::Value {
    json!({
        "message_id": row.message_id.get(),
        "channel": row.channel_id.as_str(),
        "role": row.role,
        "symbol": row.symbol,
        "direction": row.direction,
        "ticket": row.ticket,
        "entry_price": row.entry_price,
        "stop_loss": row.stop_loss,
        "take_profit": row.take_profit,
        "status": row.status,
        "opened_at": row.opened_at,
        "targets_hit": row.targets_hit,
    })
}

/// Execute the status command.
///
/// # Errors
///
/// Fails when the configuration or the state file cannot be read.
pub fn execute(config_path: &Path) -> Result<()> {
    let config = Config::load(config_path)?;
    let state_path = &config.state.path;
    let state = JsonStateFile::new(state_path.clone())
        .load()?
        .unwrap_or_default();
    let lock = read_lock(state_path);

    if output::is_json() {
        let rows: Vec<_> = state.rows().map(position_json).collect();
        output::json_output(json!({
            "command": "status",
            "state": state_path.display().to_string(),
            "lock": lock,
            "positions": rows,
            "cursors": state.cursors,
            "discarded": state.discarded.len(),
            "retired": state.retired.len(),
            "horizons": state.horizons,
        }));
        return Ok(());
    }
    if output::is_quiet() {
        return Ok(());
    }

    output::header(env!("CARGO_PKG_VERSION"));
    output::field("State", state_path.display());
    match &lock {
        Some(owner) => output::field(
            "Instance",
            format!("pid {} since {}", owner.pid, owner.started_at.to_rfc3339()),
        ),
        None => output::field("Instance", "not running"),
    }
    display_state(&state);
    Ok(())
}

fn display_state(state: &BotState) {
    for (channel, cursor) in &state.cursors {
        output::field(&format!("#{channel}"), format!("last message {cursor}"));
    }

    let live: Vec<PositionRow> = state
        .rows()
        .filter(|row| !row.is_closed())
        .map(PositionRow::from)
        .collect();
    output::section("Positions");
    if live.is_empty() {
        output::note("No open or pending positions");
        return;
    }
    output::block(&Table::new(live).to_string());
}
