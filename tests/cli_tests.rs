//! Binary-level tests for the offline commands.

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

use signal_relay::adapter::outbound::json_store::JsonStateFile;
use signal_relay::domain::id::MessageId;
use signal_relay::domain::position::Role;
use signal_relay::domain::state::BotState;
use signal_relay::infrastructure::lock::lock_path;
use signal_relay::port::outbound::store::StateRepository;
use signal_relay::testkit::domain::{channel, open_leg};

/// Pid far above any real `pid_max`.
const DEAD_PID: u32 = 2_147_483_000;

struct Workspace {
    dir: TempDir,
    config: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("config.toml");
        let state = dir.path().join("state.json");
        fs::write(
            &config,
            format!("[chat]\nchannels = [\"gold\"]\n\n[state]\npath = '{}'\n", state.display()),
        )
        .unwrap();
        Self { dir, config }
    }

    fn state_path(&self) -> PathBuf {
        self.dir.path().join("state.json")
    }

    fn save_state(&self, state: &BotState) {
        JsonStateFile::new(self.state_path()).save(state).unwrap();
    }

    fn load_state(&self) -> BotState {
        JsonStateFile::new(self.state_path())
            .load()
            .unwrap()
            .unwrap_or_default()
    }

    fn write_lock(&self, pid: u32) {
        fs::write(
            lock_path(&self.state_path()),
            format!("{{\"pid\":{pid},\"started_at\":\"2026-01-01T00:00:00Z\"}}"),
        )
        .unwrap();
    }

    fn cmd(&self, args: &[&str]) -> Command {
        let mut cmd = Command::cargo_bin("signal-relay").unwrap();
        cmd.args(args).arg("--config").arg(&self.config);
        cmd
    }
}

fn tracked_state() -> BotState {
    let mut state = BotState::default();
    state.upsert(open_leg(501, Role::Scalp, 11));
    state.upsert(open_leg(501, Role::Runner, 12));
    state.advance_cursor(&channel(), MessageId::new(501));
    state
}

fn exists(path: &Path) -> bool {
    path.try_exists().unwrap()
}

#[test]
fn help_lists_commands() {
    Command::cargo_bin("signal-relay")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("unlock"));
}

#[test]
fn status_json_on_fresh_install() {
    let ws = Workspace::new();

    let output = ws.cmd(&["status", "--json"]).output().unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["command"], "status");
    assert!(value["positions"].as_array().unwrap().is_empty());
    assert!(value["lock"].is_null());
}

#[test]
fn status_lists_tracked_legs() {
    let ws = Workspace::new();
    ws.save_state(&tracked_state());

    ws.cmd(&["status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("XAUUSD"))
        .stdout(predicate::str::contains("scalp"))
        .stdout(predicate::str::contains("runner"))
        .stdout(predicate::str::contains("not running"));
}

#[test]
fn status_reports_running_instance() {
    let ws = Workspace::new();
    ws.write_lock(std::process::id());

    let output = ws.cmd(&["status", "--json"]).output().unwrap();
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["lock"]["pid"], std::process::id());
}

#[test]
fn clear_requires_confirmation() {
    let ws = Workspace::new();
    ws.save_state(&tracked_state());

    ws.cmd(&["clear"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("--yes"));
    assert_eq!(ws.load_state(), tracked_state());
}

#[test]
fn clear_with_confirmation_empties_state() {
    let ws = Workspace::new();
    ws.save_state(&tracked_state());

    ws.cmd(&["clear", "--yes"]).assert().success();

    assert_eq!(ws.load_state(), BotState::default());
    assert!(!exists(&lock_path(&ws.state_path())));
}

#[test]
fn clear_refuses_while_an_instance_runs() {
    let ws = Workspace::new();
    ws.save_state(&tracked_state());
    ws.write_lock(std::process::id());

    ws.cmd(&["clear", "--yes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("another instance"));
    assert_eq!(ws.load_state(), tracked_state());
}

#[test]
fn unlock_removes_stale_lock() {
    let ws = Workspace::new();
    ws.write_lock(DEAD_PID);

    ws.cmd(&["unlock"])
        .assert()
        .success()
        .stdout(predicate::str::contains(DEAD_PID.to_string()))
        .stdout(predicate::str::contains("⚠ Check the broker"));
    assert!(!exists(&lock_path(&ws.state_path())));
}

#[test]
fn unlock_refuses_live_owner() {
    let ws = Workspace::new();
    ws.write_lock(std::process::id());

    ws.cmd(&["unlock"]).assert().failure().code(1);
    assert!(exists(&lock_path(&ws.state_path())));
}

#[test]
fn unlock_without_lock_is_a_no_op() {
    let ws = Workspace::new();

    ws.cmd(&["unlock"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No lock"));
}

#[test]
fn run_refuses_stale_lock() {
    let ws = Workspace::new();
    ws.write_lock(DEAD_PID);

    ws.cmd(&["run", "--paper"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("signal-relay unlock"));
}

#[test]
fn invalid_config_exits_nonzero() {
    let ws = Workspace::new();
    fs::write(&ws.config, "[trading]\nmin_confidence = 2.0\n").unwrap();

    ws.cmd(&["status"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("min_confidence"));
}
